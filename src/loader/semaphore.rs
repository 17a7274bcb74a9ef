//! Fetch Semaphore
//!
//! Bounds the number of fetches outstanding at once. The configured limit
//! is read on every acquisition; a change rebuilds the semaphore for new
//! fetches while already issued permits stay valid on the old one.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug)]
pub struct FetchSemaphore {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl FetchSemaphore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Returns the semaphore for `configured` permits, rebuilding it if
    /// the configured limit changed since it was last built.
    ///
    /// A limit of zero is treated as one so fetches can still progress.
    pub fn for_capacity(&mut self, configured: usize) -> Arc<Semaphore> {
        let configured = configured.max(1);
        if configured != self.capacity {
            debug!(
                from = self.capacity,
                to = configured,
                "rebuilding fetch semaphore"
            );
            *self = Self::new(configured);
        }
        Arc::clone(&self.semaphore)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuilds_only_on_change() {
        let mut semaphore = FetchSemaphore::new(2);
        let first = semaphore.for_capacity(2);
        let same = semaphore.for_capacity(2);
        assert!(Arc::ptr_eq(&first, &same));

        let rebuilt = semaphore.for_capacity(4);
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(semaphore.capacity(), 4);
        assert_eq!(rebuilt.available_permits(), 4);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut semaphore = FetchSemaphore::new(0);
        assert_eq!(semaphore.capacity(), 1);
        assert_eq!(semaphore.for_capacity(0).available_permits(), 1);
    }

    #[tokio::test]
    async fn test_old_permits_survive_rebuild() {
        let mut semaphore = FetchSemaphore::new(1);
        let old = semaphore.for_capacity(1);
        let _permit = old.clone().acquire_owned().await.unwrap();

        let new = semaphore.for_capacity(3);
        assert_eq!(old.available_permits(), 0);
        assert_eq!(new.available_permits(), 3);
    }

    #[test]
    fn test_acquire_waits_for_release() {
        use tokio_test::{assert_pending, assert_ready_ok, task};

        let mut semaphore = FetchSemaphore::new(1);
        let permits = semaphore.for_capacity(1);
        let held = permits.clone().try_acquire_owned().unwrap();

        let mut waiting = task::spawn(permits.clone().acquire_owned());
        assert_pending!(waiting.poll());

        drop(held);
        assert!(waiting.is_woken());
        let _permit = assert_ready_ok!(waiting.poll());
    }
}
