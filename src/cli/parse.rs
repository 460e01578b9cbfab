//! CLI parse: clap types for remount. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Remount CLI - seal, inspect and recombine content-addressed filesystem trees
#[derive(Parser)]
#[command(name = "remount")]
#[command(about = "Composable virtual filesystems with content-addressed snapshots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (relative store paths and workspace config resolve here)
    #[arg(long, default_value = ".", global = true)]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seal a local directory tree and print its address
    Snapshot {
        /// Directory to seal
        dir: PathBuf,
    },
    /// Materialise a sealed tree on local disk
    Clone {
        /// Address of the tree
        address: String,
        /// Destination directory (created if missing)
        dest: PathBuf,
    },
    /// List a directory inside a sealed tree
    Ls {
        /// Address of the tree
        address: String,
        /// Directory within the tree
        #[arg(default_value = "/")]
        path: String,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Write a file from a sealed tree to stdout
    Cat {
        /// Address of the tree
        address: String,
        /// File within the tree
        path: String,
    },
    /// Overlay one sealed tree on another and print the merged address
    Meld {
        /// Tree whose entries lose conflicts
        lower: String,
        /// Tree whose entries win conflicts
        upper: String,
    },
    /// Derive a new tree by editing a sealed one
    Patch {
        /// Address of the base tree
        address: String,
        /// Copy a local file or directory into the tree: DEST=LOCAL
        #[arg(long = "put", value_name = "DEST=LOCAL")]
        puts: Vec<String>,
        /// Create a directory (and missing parents)
        #[arg(long = "mkdir", value_name = "PATH")]
        mkdirs: Vec<String>,
        /// Remove a path written earlier in this patch (entries of the base tree are kept)
        #[arg(long = "rm", value_name = "PATH")]
        removes: Vec<String>,
    },
    /// Seal a directory whose entries are existing trees
    Assemble {
        /// Entries as NAME=ADDRESS
        #[arg(required = true, value_name = "NAME=ADDRESS")]
        entries: Vec<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}
