//! Re-entry guard for named resources
//!
//! Tracks which names are currently in use so a second caller can be turned
//! away instead of running the same resource concurrently. Claims are released
//! when the returned guard drops, including on early return or panic.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of names currently claimed
#[derive(Debug, Default, Clone)]
pub struct InFlightSet {
    names: Arc<Mutex<HashSet<String>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`, or `None` if someone already holds it.
    pub fn try_claim(&self, name: &str) -> Option<InFlightGuard> {
        let mut names = self.names.lock();
        if !names.insert(name.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            names: Arc::clone(&self.names),
            name: name.to_string(),
        })
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its claim on drop
#[derive(Debug)]
pub struct InFlightGuard {
    names: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl InFlightGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.names.lock().remove(&self.name);
    }
}
