//! Tool registry: capability name to factory, populated at startup.

use super::{EchoTool, Tool};
use crate::error::SyscallError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a tool instance on first use
pub type ToolFactory = Box<dyn Fn() -> Result<Arc<dyn Tool>, SyscallError> + Send + Sync>;

/// Registry of tool factories with an instance cache
///
/// Instances are built lazily on first lookup and reused afterwards until
/// [`ToolRegistry::reload`] or [`ToolRegistry::clear_cache`] drops them.
#[derive(Default)]
pub struct ToolRegistry {
    factories: HashMap<String, ToolFactory>,
    instances: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `echo` tool
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("echo", || Ok(Arc::new(EchoTool) as Arc<dyn Tool>));
        registry
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Tool>, SyscallError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.instances.write().remove(&name);
        self.factories.insert(name, Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered capability names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the cached instance for `name`, building it if needed.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, SyscallError> {
        if let Some(tool) = self.instances.read().get(name) {
            return Ok(Arc::clone(tool));
        }

        let factory = self.factories.get(name).ok_or_else(|| {
            SyscallError::UnsupportedOperation(format!("unknown tool: {}", name))
        })?;
        let tool = factory()?;

        // Another caller may have built it meanwhile; keep the first instance
        let mut instances = self.instances.write();
        let tool = instances
            .entry(name.to_string())
            .or_insert_with(|| tool)
            .clone();
        debug!(tool = name, "Loaded tool instance");
        Ok(tool)
    }

    /// Drop the cached instance for `name` and build a fresh one.
    pub fn reload(&self, name: &str) -> Result<Arc<dyn Tool>, SyscallError> {
        info!(tool = name, "Reloading tool");
        self.instances.write().remove(name);
        self.get(name)
    }

    pub fn clear_cache(&self) {
        info!("Clearing tool instance cache");
        self.instances.write().clear();
    }

    /// Names with a live cached instance, sorted
    pub fn loaded_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("loaded", &self.loaded_tools())
            .finish()
    }
}
