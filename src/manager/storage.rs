//! Storage manager over the resource store.

use super::{mismatched, ResourceManager};
use crate::error::SyscallError;
use crate::request::{Payload, Request, Response, StorageOp};
use crate::store::{EvictionKind, ResourceStore};
use crate::types::RequestKind;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Serves storage requests against a capacity-bounded key/value store
pub struct StorageManager {
    store: ResourceStore<String, Value>,
}

impl StorageManager {
    pub fn new(store: ResourceStore<String, Value>) -> Self {
        Self { store }
    }

    pub fn with_policy(capacity: usize, eviction: EvictionKind) -> Self {
        Self::new(ResourceStore::new(capacity, eviction.policy()))
    }

    pub fn store(&self) -> &ResourceStore<String, Value> {
        &self.store
    }

    fn apply(&self, op: &StorageOp) -> Result<Response, SyscallError> {
        match op {
            StorageOp::Write { key, value } => {
                self.store.write(key.clone(), value.clone())?;
                Ok(Response::Ack)
            }
            StorageOp::Update { key, value } => {
                self.store.update(key.clone(), value.clone())?;
                Ok(Response::Ack)
            }
            StorageOp::Read { key } => self.store.read(key).map(Response::Value),
            StorageOp::Delete { key } => self.store.delete(key).map(Response::Value),
        }
    }
}

#[async_trait]
impl ResourceManager for StorageManager {
    fn kind(&self) -> RequestKind {
        RequestKind::Storage
    }

    async fn handle(&self, request: &Request) -> Result<Response, SyscallError> {
        match &request.payload {
            Payload::Storage(op) => {
                debug!(agent_id = %request.agent_id, op = ?op, "Applying storage op");
                self.apply(op)
            }
            _ => Err(mismatched(self.kind(), request)),
        }
    }
}
