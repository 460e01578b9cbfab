//! Config loader facade: assembles sources in merge order and deserializes the result.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::RemountConfig;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Loads [`RemountConfig`] from defaults, files and the environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Lowest precedence first: built-in defaults, global file, workspace files, then
    /// `REMOUNT__SECTION__KEY` environment variables.
    pub fn load(workspace_root: &Path) -> Result<RemountConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let config = Self::finish(builder)?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from one explicit file, skipping the global and workspace files.
    /// Defaults and environment overrides still apply.
    pub fn load_from_file(path: &Path) -> Result<RemountConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).format(FileFormat::Toml).required(true));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<RemountConfig, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix("REMOUNT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
