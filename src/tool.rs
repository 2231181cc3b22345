//! Tools invocable through tool-kind requests.

pub mod registry;

use crate::error::SyscallError;
use async_trait::async_trait;
use serde_json::{json, Value};

pub use registry::{ToolFactory, ToolRegistry};

/// A named capability with a single entry point
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, params: Value) -> Result<Value, SyscallError>;
}

/// Echoes its parameters back; registered as `echo` by
/// [`ToolRegistry::with_builtins`].
#[derive(Debug, Clone, Default)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(&self, params: Value) -> Result<Value, SyscallError> {
        Ok(json!({ "tool": self.name(), "params": params }))
    }
}
