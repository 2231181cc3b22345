//! Configuration loading from TOML files with environment overlay.

use std::io::Write;
use syscore::config::{ConfigLoader, SyscoreConfig};
use syscore::store::EvictionKind;
use syscore::{Scheduler, SyscallError};
use tempfile::NamedTempFile;

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_file_then_environment_precedence() {
    let file = toml_file(
        r#"
        [scheduler]
        poll_interval_ms = 25

        [memory]
        block_count = 8

        [store]
        capacity = 3
        eviction = "fifo"
        "#,
    );

    std::env::set_var("SYSCORE_MEMORY__BLOCK_COUNT", "4");
    let loaded = ConfigLoader::load_from_file(file.path());
    std::env::remove_var("SYSCORE_MEMORY__BLOCK_COUNT");
    let config = loaded.unwrap();

    assert_eq!(config.scheduler.poll_interval_ms, 25);
    assert_eq!(config.memory.block_count, 4);
    assert_eq!(config.store.capacity, 3);
    assert_eq!(config.store.eviction, EvictionKind::Fifo);
    // Untouched keys keep their defaults
    assert_eq!(config.scheduler.queue_capacity, 1024);
    assert_eq!(config.memory.block_size, 1024);

    let scheduler = Scheduler::from_config(&config).unwrap();
    assert!(!scheduler.is_running());
}

#[test]
fn test_zero_capacity_file_rejected() {
    let file = toml_file(
        r#"
        [store]
        capacity = 0
        "#,
    );
    assert!(matches!(
        ConfigLoader::load_from_file(file.path()),
        Err(SyscallError::ConfigError(_))
    ));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        ConfigLoader::load_from_file(&missing),
        Err(SyscallError::ConfigError(_))
    ));
}

#[test]
fn test_invalid_config_rejected_by_scheduler() {
    let mut config = SyscoreConfig::default();
    config.scheduler.queue_capacity = 0;
    assert!(matches!(
        Scheduler::from_config(&config),
        Err(SyscallError::ConfigError(_))
    ));
}
