//! CLI route: single route table and run context. Dispatches to the tree operations and
//! hands results to the output module.

use crate::cli::output::{format_address, format_listing, CommandOutput};
use crate::cli::parse::{Commands, OutputFormat};
use crate::config::{ConfigLoader, RemountConfig, StoreBackend};
use crate::error::{ApiError, FsError};
use crate::store::{self, MemoryObjectStore, ObjectStore, SledObjectStore};
use crate::tree::{self, Snapshotter};
use crate::types::ContentAddress;
use crate::vfs::{ops, FileSystem, LocalFs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument};

/// Effective configuration: an explicit file if given, else the workspace layers.
pub fn load_config(workspace_root: &Path, config_path: Option<&Path>) -> Result<RemountConfig, ApiError> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(workspace_root)?,
    };
    Ok(config)
}

/// One `DEST=LOCAL` pair of `patch --put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutSpec {
    pub dest: PathBuf,
    pub local: PathBuf,
}

/// Runtime context for CLI execution: workspace, effective config, object store and runtime.
pub struct RunContext {
    workspace_root: PathBuf,
    config: RemountConfig,
    store: Arc<dyn ObjectStore>,
    sled: Option<Arc<SledObjectStore>>,
    runtime: Runtime,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = load_config(&workspace_root, config_path.as_deref())?;
        Self::with_config(workspace_root, config)
    }

    /// Create run context from an already loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: RemountConfig) -> Result<Self, ApiError> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;

        let (store, sled): (Arc<dyn ObjectStore>, Option<Arc<SledObjectStore>>) = match config.store.backend {
            StoreBackend::Memory => (Arc::new(MemoryObjectStore::new()) as Arc<dyn ObjectStore>, None),
            StoreBackend::Sled => {
                let path = config.store.resolve_path(&workspace_root);
                std::fs::create_dir_all(&path).map_err(crate::error::StorageError::IoError)?;
                let sled = Arc::new(SledObjectStore::new(&path)?);
                debug!(store_path = %path.display(), "Opened sled object store");
                (sled.clone() as Arc<dyn ObjectStore>, Some(sled))
            }
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to start async runtime: {}", e)))?;

        Ok(Self {
            workspace_root,
            config,
            store,
            sled,
            runtime,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &RemountConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    fn snapshotter(&self) -> Snapshotter {
        Snapshotter::from_config(self.store.clone(), &self.config.snapshot)
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        let output = self.runtime.block_on(self.execute_inner(command))?;
        if let Some(sled) = &self.sled {
            sled.flush()?;
        }
        Ok(output)
    }

    async fn execute_inner(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Snapshot { dir } => self.handle_snapshot(dir).await,
            Commands::Clone { address, dest } => {
                self.handle_clone(parse_address(address)?, dest).await
            }
            Commands::Ls {
                address,
                path,
                format,
            } => self.handle_ls(parse_address(address)?, path, *format).await,
            Commands::Cat { address, path } => self.handle_cat(parse_address(address)?, path).await,
            Commands::Meld { lower, upper } => {
                let address = self
                    .snapshotter()
                    .meld(parse_address(lower)?, parse_address(upper)?)
                    .await?;
                Ok(format_address(&address))
            }
            Commands::Patch {
                address,
                puts,
                mkdirs,
                removes,
            } => {
                let puts = puts
                    .iter()
                    .map(|spec| parse_put(spec))
                    .collect::<Result<Vec<_>, _>>()?;
                self.handle_patch(parse_address(address)?, puts, mkdirs.clone(), removes.clone())
                    .await
            }
            Commands::Assemble { entries } => {
                let entries = entries
                    .iter()
                    .map(|spec| parse_entry(spec))
                    .collect::<Result<Vec<_>, _>>()?;
                let address = self.snapshotter().assemble(entries).await?;
                Ok(format_address(&address))
            }
            Commands::Config => self
                .config
                .to_toml()
                .map(CommandOutput::Text)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
        }
    }

    #[instrument(skip(self))]
    async fn handle_snapshot(&self, dir: &Path) -> Result<CommandOutput, ApiError> {
        let source: Arc<dyn FileSystem> = Arc::new(LocalFs::read_only(dir)?);
        let address = self.snapshotter().snapshot(source, Path::new("")).await?;
        info!(address = %address, "Snapshot sealed");
        Ok(format_address(&address))
    }

    #[instrument(skip(self))]
    async fn handle_clone(&self, address: ContentAddress, dest: &Path) -> Result<CommandOutput, ApiError> {
        tokio::fs::create_dir_all(dest).await.map_err(FsError::from)?;
        let target: Arc<dyn FileSystem> = Arc::new(LocalFs::new(dest)?);
        tree::clone_address(self.store.clone(), address, target, Path::new("")).await?;
        Ok(CommandOutput::Text(format!(
            "Cloned {} into {}",
            address.short(),
            dest.display()
        )))
    }

    async fn handle_ls(
        &self,
        address: ContentAddress,
        path: &str,
        format: OutputFormat,
    ) -> Result<CommandOutput, ApiError> {
        let view = store::resolve(self.store.clone(), address).await?;
        let entries = view.read_dir(Path::new(path)).await?;
        format_listing(&entries, format)
    }

    async fn handle_cat(&self, address: ContentAddress, path: &str) -> Result<CommandOutput, ApiError> {
        let view = store::resolve(self.store.clone(), address).await?;
        let bytes = ops::read_file(view.as_ref(), Path::new(path)).await?;
        Ok(CommandOutput::Bytes(bytes))
    }

    /// Directories first, then copies, then removals.
    #[instrument(skip_all, fields(base = %address.short()))]
    async fn handle_patch(
        &self,
        address: ContentAddress,
        puts: Vec<PutSpec>,
        mkdirs: Vec<String>,
        removes: Vec<String>,
    ) -> Result<CommandOutput, ApiError> {
        let max_concurrency = self.config.snapshot.max_concurrency;
        let patched = self
            .snapshotter()
            .patch(address, move |fs| async move {
                for dir in &mkdirs {
                    fs.mkdir_all(Path::new(dir)).await?;
                }
                for put in &puts {
                    put_local(fs.clone(), put, max_concurrency).await?;
                }
                for path in &removes {
                    fs.remove_all(Path::new(path)).await?;
                }
                Ok(())
            })
            .await?;
        Ok(format_address(&patched))
    }
}

/// Copy a local file or directory tree into `fs` at `put.dest`, creating parents.
async fn put_local(fs: Arc<dyn FileSystem>, put: &PutSpec, max_concurrency: usize) -> Result<(), FsError> {
    if let Some(parent) = put.dest.parent() {
        fs.mkdir_all(parent).await?;
    }
    let metadata = tokio::fs::metadata(&put.local).await?;
    if metadata.is_dir() {
        let source: Arc<dyn FileSystem> = Arc::new(LocalFs::read_only(&put.local)?);
        tree::Cloner::new(max_concurrency)
            .clone_tree(source, fs, Path::new(""), &put.dest)
            .await?;
    } else {
        let data = tokio::fs::read(&put.local).await?;
        ops::write_file(fs.as_ref(), &put.dest, &data).await?;
    }
    Ok(())
}

fn parse_address(text: &str) -> Result<ContentAddress, ApiError> {
    text.trim().parse()
}

/// Parse `DEST=LOCAL`.
pub fn parse_put(spec: &str) -> Result<PutSpec, ApiError> {
    match spec.split_once('=') {
        Some((dest, local)) if !dest.is_empty() && !local.is_empty() => Ok(PutSpec {
            dest: PathBuf::from(dest),
            local: PathBuf::from(local),
        }),
        _ => Err(ApiError::InvalidArgument(format!(
            "expected DEST=LOCAL, got {:?}",
            spec
        ))),
    }
}

/// Parse `NAME=ADDRESS`.
pub fn parse_entry(spec: &str) -> Result<(String, ContentAddress), ApiError> {
    match spec.split_once('=') {
        Some((name, address)) if !name.is_empty() => Ok((name.to_string(), parse_address(address)?)),
        _ => Err(ApiError::InvalidArgument(format!(
            "expected NAME=ADDRESS, got {:?}",
            spec
        ))),
    }
}
