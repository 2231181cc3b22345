//! Built-in defaults, the lowest-precedence layer of every load.

use crate::config::SyscoreConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with [`SyscoreConfig::default`], so later sources only
/// need to name the keys they change.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = SyscoreConfig::default();
    let builder = Config::builder()
        .set_default("scheduler.poll_interval_ms", defaults.scheduler.poll_interval_ms)?
        .set_default(
            "scheduler.queue_capacity",
            defaults.scheduler.queue_capacity as u64,
        )?
        .set_default("memory.block_size", defaults.memory.block_size as u64)?
        .set_default("memory.block_count", defaults.memory.block_count as u64)?
        .set_default(
            "memory.compression_level",
            defaults.memory.compression_level as u64,
        )?
        .set_default("store.capacity", defaults.store.capacity as u64)?
        .set_default("store.eviction", "lru")?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("logging.format", defaults.logging.format)?
        .set_default("logging.output", defaults.logging.output)?;
    Ok(builder)
}
