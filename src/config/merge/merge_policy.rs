//! Merge rules: built-in defaults sit underneath every file and environment source.

use crate::tree::DEFAULT_MAX_CONCURRENCY;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("store.backend", "sled")?
        .set_default(
            "store.path",
            crate::config::default_store_path().to_string_lossy().into_owned(),
        )?
        .set_default("snapshot.max_concurrency", DEFAULT_MAX_CONCURRENCY as u64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
