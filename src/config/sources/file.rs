//! TOML file sources: an explicit path, or the per-user config file.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};

/// Per-user config file (`~/.config/syscore/config.toml` on Linux)
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "syscore", "syscore")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add a required TOML file.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(true)))
}

/// Add the per-user config file if it exists.
pub fn add_user_file(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = match user_config_path() {
        Some(path) => builder.add_source(File::from(path).format(FileFormat::Toml).required(false)),
        None => builder,
    };
    Ok(builder)
}
