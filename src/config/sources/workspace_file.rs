//! Workspace config file source: .remount/config.toml and .remount/{env}.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};

/// Directory holding a workspace's configuration files.
pub fn workspace_config_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".remount")
}

/// Add workspace config files to builder.
/// Precedence: .remount/config.toml (base) then .remount/{REMOUNT_ENV}.toml (env-specific).
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let config_dir = workspace_config_dir(workspace_root);
    let env_name = std::env::var("REMOUNT_ENV").unwrap_or_else(|_| "development".to_string());

    let mut builder = builder;

    let base_config_path = config_dir.join("config.toml");
    if base_config_path.exists() {
        builder = builder.add_source(File::from(base_config_path).format(FileFormat::Toml));
    }

    let env_config_path = config_dir.join(format!("{}.toml", env_name));
    if env_config_path.exists() {
        builder = builder.add_source(File::from(env_config_path).format(FileFormat::Toml));
    }

    Ok(builder)
}
