//! Kind-specific request payloads and manager responses.

use crate::memory::{Address, AllocationRecord, PoolStatus};
use crate::types::{RequestKind, RoundID};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Memory operation against the agent's block lease
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MemoryOp {
    Alloc { size: usize },
    Write { round_id: RoundID, content: Vec<u8> },
    Read { round_id: RoundID },
    Release { round_id: RoundID },
    Clear,
    Status,
}

/// Storage action against the resource store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StorageOp {
    Write { key: String, value: Value },
    Read { key: String },
    Update { key: String, value: Value },
    Delete { key: String },
}

/// Tool invocation by registered capability name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

/// Model inference query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceQuery {
    pub prompt: String,
    #[serde(default)]
    pub params: Value,
}

/// Request payload, one variant per resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Payload {
    Inference(InferenceQuery),
    Memory(MemoryOp),
    Storage(StorageOp),
    Tool(ToolCall),
}

impl Payload {
    /// Kind implied by the payload variant
    pub fn kind(&self) -> RequestKind {
        match self {
            Payload::Inference(_) => RequestKind::Inference,
            Payload::Memory(_) => RequestKind::Memory,
            Payload::Storage(_) => RequestKind::Storage,
            Payload::Tool(_) => RequestKind::Tool,
        }
    }
}

/// Result of a successfully handled request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Ack,
    Address(Address),
    Record(AllocationRecord),
    Bytes(Vec<u8>),
    Value(Value),
    MemoryStatus(PoolStatus),
}
