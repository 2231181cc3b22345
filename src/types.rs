//! Core types shared across the scheduler and resource managers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// AgentID: Identifier of the agent that issued a request
pub type AgentID = String;

/// RoundID: Conversation round within an agent's memory lease
pub type RoundID = u64;

/// BlockID: Index of a memory block inside a pool
pub type BlockID = usize;

/// Resource kind; selects the queue, worker, and manager for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Inference,
    Memory,
    Storage,
    Tool,
}

impl RequestKind {
    /// Every kind, in worker start order.
    pub const ALL: [RequestKind; 4] = [
        RequestKind::Inference,
        RequestKind::Memory,
        RequestKind::Storage,
        RequestKind::Tool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Inference => "inference",
            RequestKind::Memory => "memory",
            RequestKind::Storage => "storage",
            RequestKind::Tool => "tool",
        }
    }

    /// Dense index used for per-kind arrays.
    pub(crate) fn index(&self) -> usize {
        match self {
            RequestKind::Inference => 0,
            RequestKind::Memory => 1,
            RequestKind::Storage => 2,
            RequestKind::Tool => 3,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque request identity, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestID(u64);

impl RequestID {
    pub(crate) fn next() -> Self {
        RequestID(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", hex::encode(self.0.to_be_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_and_increasing() {
        let a = RequestID::next();
        let b = RequestID::next();
        assert!(b > a);
    }

    #[test]
    fn test_request_id_display_is_hex() {
        let id = RequestID(255);
        assert_eq!(id.to_string(), "req-00000000000000ff");
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&RequestKind::Storage).unwrap();
        assert_eq!(json, "\"storage\"");
        let kind: RequestKind = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(kind, RequestKind::Tool);
    }

    #[test]
    fn test_kind_indices_are_dense() {
        let mut seen = [false; 4];
        for kind in RequestKind::ALL {
            seen[kind.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
