//! Style Injection
//!
//! The registry decides whether a stylesheet needs injecting or removing;
//! a [`StyleInjector`] performs the actual document change.

use parking_lot::Mutex;
use tracing::debug;

use crate::registry::SharedRegistry;

/// Document-side style operations.
pub trait StyleInjector: Send + Sync {
    fn inject_module_css(&self, id: &str, css: &str);
    fn remove_module_css(&self, id: &str);
    fn clear_modules(&self);
}

/// Injects a module's CSS unless it is already tracked as injected.
///
/// A repeat injection changes nothing, so the reference count stays at the
/// one taken by the first injection. Styles the registry evicts to make
/// room are removed from the document.
pub fn inject_styles(registry: &SharedRegistry, injector: &dyn StyleInjector, id: &str, css: &str) {
    let evicted = {
        let mut registry = registry.lock();
        if registry.has_injected_style(id) {
            return;
        }
        registry.mark_style_injected(id)
    };

    injector.inject_module_css(id, css);
    for evicted_id in evicted {
        debug!(style_id = %evicted_id, "removing evicted stylesheet");
        injector.remove_module_css(&evicted_id);
    }
}

/// Removes CSS and tracking for each module, whatever its reference count.
pub fn remove_styles_for_modules<S: AsRef<str>>(
    registry: &SharedRegistry,
    injector: &dyn StyleInjector,
    ids: &[S],
) {
    for id in ids {
        let id = id.as_ref();
        injector.remove_module_css(id);
        registry.lock().unmark_style_injected(id);
    }
}

/// Removes every module stylesheet and forgets all tracking.
pub fn clear_injected_styles(registry: &SharedRegistry, injector: &dyn StyleInjector) {
    injector.clear_modules();
    registry.lock().clear_injected_styles();
}

// == Recording Injector ==
/// Keeps injected stylesheets in memory, in injection order.
#[derive(Debug, Default)]
pub struct RecordingStyleInjector {
    styles: Mutex<Vec<(String, String)>>,
}

impl RecordingStyleInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(id, css)` pairs currently injected, oldest first.
    pub fn injected(&self) -> Vec<(String, String)> {
        self.styles.lock().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.styles.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.styles.lock().iter().any(|(existing, _)| existing == id)
    }
}

impl StyleInjector for RecordingStyleInjector {
    fn inject_module_css(&self, id: &str, css: &str) {
        let mut styles = self.styles.lock();
        styles.retain(|(existing, _)| existing != id);
        styles.push((id.to_string(), css.to_string()));
    }

    fn remove_module_css(&self, id: &str) {
        self.styles.lock().retain(|(existing, _)| existing != id);
    }

    fn clear_modules(&self) {
        self.styles.lock().clear();
    }
}
