//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::SyscoreConfig;
use crate::error::SyscallError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the user config file (if any) and environment.
    pub fn load() -> Result<SyscoreConfig, SyscallError> {
        Self::validated(MergeService::load()?)
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<SyscoreConfig, SyscallError> {
        Self::validated(MergeService::load_from_file(path)?)
    }

    /// Load from `path` when given, otherwise from the standard locations.
    pub fn load_optional(path: Option<&Path>) -> Result<SyscoreConfig, SyscallError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    /// Create default configuration.
    pub fn default() -> SyscoreConfig {
        SyscoreConfig::default()
    }

    fn validated(config: SyscoreConfig) -> Result<SyscoreConfig, SyscallError> {
        config.validate()?;
        Ok(config)
    }
}
