//! CLI domain: parse, route and output only.
//! No domain orchestration; a single route table dispatches to the tree operations.

mod output;
mod parse;
mod route;

pub use output::{format_listing, map_error, CommandOutput};
pub use parse::{Cli, Commands, OutputFormat};
pub use route::{load_config, parse_entry, parse_put, PutSpec, RunContext};
