//! Tool manager: registry lookup with per-tool re-entry protection.

use super::{mismatched, ResourceManager};
use crate::concurrency::InFlightSet;
use crate::error::SyscallError;
use crate::request::{Payload, Request, Response, ToolCall};
use crate::tool::ToolRegistry;
use crate::types::RequestKind;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Runs registered tools, one invocation per tool name at a time
pub struct ToolManager {
    registry: ToolRegistry,
    in_flight: InFlightSet,
}

impl ToolManager {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            in_flight: InFlightSet::new(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Whether `name` is currently running
    pub fn is_busy(&self, name: &str) -> bool {
        self.in_flight.is_claimed(name)
    }

    pub async fn call(&self, agent_id: &str, call: &ToolCall) -> Result<Response, SyscallError> {
        let _guard = self.in_flight.try_claim(&call.name).ok_or_else(|| {
            warn!(agent_id, tool = %call.name, "Tool already running");
            SyscallError::ToolBusy(call.name.clone())
        })?;

        let tool = self.registry.get(&call.name)?;
        debug!(agent_id, tool = %call.name, "Running tool");
        tool.run(call.params.clone()).await.map(Response::Value)
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new(ToolRegistry::with_builtins())
    }
}

#[async_trait]
impl ResourceManager for ToolManager {
    fn kind(&self) -> RequestKind {
        RequestKind::Tool
    }

    async fn handle(&self, request: &Request) -> Result<Response, SyscallError> {
        match &request.payload {
            Payload::Tool(call) => self.call(&request.agent_id, call).await,
            _ => Err(mismatched(self.kind(), request)),
        }
    }
}
