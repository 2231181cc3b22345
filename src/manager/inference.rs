//! Inference manager over an injected model backend.

use super::{mismatched, ResourceManager};
use crate::error::SyscallError;
use crate::request::{InferenceQuery, Payload, Request, Response};
use crate::types::RequestKind;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Model backend contract
///
/// Failures should be reported as [`SyscallError::Backend`].
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, agent_id: &str, query: &InferenceQuery) -> Result<Value, SyscallError>;
}

/// Backend that answers with the prompt it was given
#[derive(Debug, Clone, Default)]
pub struct EchoBackend;

#[async_trait]
impl InferenceBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn process(&self, agent_id: &str, query: &InferenceQuery) -> Result<Value, SyscallError> {
        Ok(json!({
            "agent_id": agent_id,
            "response": query.prompt,
        }))
    }
}

pub struct InferenceManager {
    backend: Arc<dyn InferenceBackend>,
}

impl InferenceManager {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

impl Default for InferenceManager {
    fn default() -> Self {
        Self::new(Arc::new(EchoBackend))
    }
}

#[async_trait]
impl ResourceManager for InferenceManager {
    fn kind(&self) -> RequestKind {
        RequestKind::Inference
    }

    async fn handle(&self, request: &Request) -> Result<Response, SyscallError> {
        let query = match &request.payload {
            Payload::Inference(query) => query,
            _ => return Err(mismatched(self.kind(), request)),
        };
        debug!(
            agent_id = %request.agent_id,
            backend = self.backend.name(),
            prompt_len = query.prompt.len(),
            "Dispatching inference"
        );
        self.backend
            .process(&request.agent_id, query)
            .await
            .map(Response::Value)
    }
}
