//! Circular Load Detection
//!
//! Wait-for graph between in-progress loads. An edge `a -> b` means the
//! load of `a` is currently awaiting the load of `b`. Awaiting a pending
//! load that already (transitively) awaits the waiter would never finish,
//! so such waits are skipped instead.

use std::collections::{HashMap, HashSet, VecDeque};

/// Edges are counted: one waiter may await the same target through
/// several specifiers at once.
#[derive(Debug, Default)]
pub struct WaitGraph {
    edges: HashMap<String, HashMap<String, usize>>,
}

impl WaitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, waiter: &str, target: &str) {
        *self
            .edges
            .entry(waiter.to_string())
            .or_default()
            .entry(target.to_string())
            .or_insert(0) += 1;
    }

    pub fn remove(&mut self, waiter: &str, target: &str) {
        let Some(targets) = self.edges.get_mut(waiter) else {
            return;
        };
        if let Some(count) = targets.get_mut(target) {
            *count -= 1;
            if *count == 0 {
                targets.remove(target);
            }
        }
        if targets.is_empty() {
            self.edges.remove(waiter);
        }
    }

    /// True if `waiter` awaiting `target` would close a cycle.
    pub fn would_deadlock(&self, waiter: &str, target: &str) -> bool {
        if waiter == target {
            return true;
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([target]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(next) = self.edges.get(current) else {
                continue;
            };
            for id in next.keys() {
                if id == waiter {
                    return true;
                }
                queue.push_back(id.as_str());
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
