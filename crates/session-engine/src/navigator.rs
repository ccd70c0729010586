//! Browser location capability.

use parking_lot::Mutex;

/// Reads and changes the current location.
pub trait Navigator: Send + Sync {
    /// Current absolute URL.
    fn current_url(&self) -> String;

    /// Replace the visible URL without navigating (history replacement).
    fn replace_url(&self, url: &str);

    /// Full-page navigation to `url`.
    fn assign(&self, url: &str);
}

/// In-memory navigator that records every change.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    current: Mutex<String>,
    replacements: Mutex<Vec<String>>,
    assignments: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(url.into()),
            ..Default::default()
        }
    }

    /// Simulate the browser landing on `url`.
    pub fn set_current_url(&self, url: impl Into<String>) {
        *self.current.lock() = url.into();
    }

    /// URLs passed to `replace_url`, oldest first.
    pub fn replacements(&self) -> Vec<String> {
        self.replacements.lock().clone()
    }

    /// URLs passed to `assign`, oldest first.
    pub fn assignments(&self) -> Vec<String> {
        self.assignments.lock().clone()
    }

    /// Last navigation target, if any.
    pub fn last_assignment(&self) -> Option<String> {
        self.assignments.lock().last().cloned()
    }
}

impl Navigator for MemoryNavigator {
    fn current_url(&self) -> String {
        self.current.lock().clone()
    }

    fn replace_url(&self, url: &str) {
        *self.current.lock() = url.to_string();
        self.replacements.lock().push(url.to_string());
    }

    fn assign(&self, url: &str) {
        *self.current.lock() = url.to_string();
        self.assignments.lock().push(url.to_string());
    }
}
