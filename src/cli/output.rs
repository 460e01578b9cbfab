//! CLI output: rendering command results and mapping errors to the CLI surface.

use crate::cli::parse::OutputFormat;
use crate::error::{ApiError, FsError};
use crate::types::ContentAddress;
use crate::vfs::{DirEntry, EntryType};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;

/// What a command hands back to the binary for printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Printed followed by a newline.
    Text(String),
    /// Written to stdout untouched.
    Bytes(Vec<u8>),
}

impl From<String> for CommandOutput {
    fn from(text: String) -> Self {
        CommandOutput::Text(text)
    }
}

/// Map domain errors to a one-line message for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Fs(FsError::NotFound(detail)) => format!("not found: {}", detail),
        other => other.to_string(),
    }
}

pub fn format_address(address: &ContentAddress) -> CommandOutput {
    CommandOutput::Text(address.to_hex())
}

fn kind_label(kind: EntryType) -> &'static str {
    match kind {
        EntryType::File => "file",
        EntryType::Directory => "dir",
        EntryType::Symlink => "symlink",
    }
}

/// Render a directory listing as a table or as a JSON array.
pub fn format_listing(entries: &[DirEntry], format: OutputFormat) -> Result<CommandOutput, ApiError> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = entries
                .iter()
                .map(|entry| {
                    json!({
                        "name": entry.name,
                        "type": kind_label(entry.entry_type),
                        "size": entry.size,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&rows)
                .map(CommandOutput::Text)
                .map_err(|e| ApiError::InvalidArgument(format!("Failed to render JSON: {}", e)))
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                return Ok(CommandOutput::Text("(empty directory)".to_string()));
            }
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Name", "Type", "Size"]);
            for entry in entries {
                let size = if entry.is_dir() {
                    "-".to_string()
                } else {
                    entry.size.to_string()
                };
                table.add_row(vec![entry.name.as_str(), kind_label(entry.entry_type), size.as_str()]);
            }
            Ok(CommandOutput::Text(table.to_string()))
        }
    }
}
