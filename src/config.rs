//! Configuration
//!
//! [`SyscoreConfig`] is assembled by [`ConfigLoader`] from built-in defaults,
//! an optional TOML file, and `SYSCORE_` environment variables, in that order
//! of increasing precedence.

pub mod facade;
pub mod merge;
pub mod sources;

use crate::error::SyscallError;
use crate::logging::LoggingConfig;
use crate::memory::compressor::DEFAULT_COMPRESSION_LEVEL;
use crate::store::EvictionKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use facade::ConfigLoader;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyscoreConfig {
    pub scheduler: SchedulerConfig,
    pub memory: MemoryConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Idle wake-up interval for workers, in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum pending requests per kind
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            queue_capacity: 1024,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub block_size: usize,
    pub block_count: usize,
    /// zlib level, 0 to 9
    pub compression_level: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            block_size: 1024,
            block_count: 16,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub capacity: usize,
    pub eviction: EvictionKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            eviction: EvictionKind::Lru,
        }
    }
}

impl SyscoreConfig {
    /// Reject values the scheduler and managers cannot run with.
    pub fn validate(&self) -> Result<(), SyscallError> {
        let positive = [
            ("scheduler.poll_interval_ms", self.scheduler.poll_interval_ms as usize),
            ("scheduler.queue_capacity", self.scheduler.queue_capacity),
            ("memory.block_size", self.memory.block_size),
            ("memory.block_count", self.memory.block_count),
            ("store.capacity", self.store.capacity),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(SyscallError::ConfigError(format!(
                    "{} must be greater than zero",
                    key
                )));
            }
        }
        if self.memory.compression_level > 9 {
            return Err(SyscallError::ConfigError(format!(
                "memory.compression_level must be between 0 and 9, got {}",
                self.memory.compression_level
            )));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, SyscallError> {
        toml::to_string_pretty(self).map_err(|e| SyscallError::ConfigError(e.to_string()))
    }
}
