//! Navigation host: the routing surface the kiosk core observes and drives.
//!
//! The core never owns the routing table. It reads the current location and issues
//! "go to path" / "go back" commands; whatever renders screens reacts to the result.

use tracing::debug;

/// Imperative navigation primitives exposed by the host.
pub trait NavigationHost: Send {
    /// Current location path (e.g. `/electricity/bill-payment`).
    fn current_path(&self) -> String;
    /// Push a new location.
    fn navigate(&mut self, path: &str);
    /// Return to the previous history entry.
    fn back(&mut self);
}

/// In-process history stack used by the terminal kiosk and tests.
#[derive(Debug, Clone)]
pub struct MemoryNavigator {
    entries: Vec<String>,
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl MemoryNavigator {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: vec![initial.to_string()],
        }
    }

    /// Number of history entries, including the current one.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}

impl NavigationHost for MemoryNavigator {
    fn current_path(&self) -> String {
        self.entries.last().cloned().unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&mut self, path: &str) {
        debug!(from = %self.current_path(), to = %path, "navigate");
        self.entries.push(path.to_string());
    }

    fn back(&mut self) {
        // The first entry is never popped; "back" at the root stays put.
        if self.entries.len() > 1 {
            self.entries.pop();
        }
        debug!(to = %self.current_path(), "history back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_pops_until_first_entry() {
        let mut nav = MemoryNavigator::default();
        nav.navigate("/login");
        nav.navigate("/dashboard");
        nav.back();
        assert_eq!(nav.current_path(), "/login");
        nav.back();
        nav.back();
        assert_eq!(nav.current_path(), "/");
        assert_eq!(nav.depth(), 1);
    }
}
