//! MergeService: orchestrates sources, applies merge policy, deserializes to SyscoreConfig.

use crate::config::sources::{environment, file};
use crate::config::SyscoreConfig;
use config::ConfigError;
use std::path::Path;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from standard sources.
    /// Precedence: defaults (lowest) -> user config file -> environment (highest).
    pub fn load() -> Result<SyscoreConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = file::add_user_file(builder)?;
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<SyscoreConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = file::add_to_builder(builder, path)?;
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}
