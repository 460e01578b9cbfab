//! Remount CLI Binary
//!
//! Command-line interface for sealing, inspecting and recombining filesystem trees.

use anyhow::Context;
use clap::Parser;
use remount::cli::{load_config, map_error, Cli, CommandOutput, RunContext};
use remount::logging::{init_logging, LoggingConfig};
use std::io::Write;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.workspace, cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    let logging_config = build_logging_config(&cli, config.logging.clone());
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let context = match RunContext::with_config(cli.workspace.clone(), config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error initializing workspace: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            if let Err(e) = print_output(output) {
                eprintln!("{:#}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

fn print_output(output: CommandOutput) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    match output {
        CommandOutput::Text(text) => writeln!(lock, "{}", text).context("writing to stdout")?,
        CommandOutput::Bytes(bytes) => lock.write_all(&bytes).context("writing to stdout")?,
    }
    lock.flush().context("flushing stdout")?;
    Ok(())
}

/// Logging section of the loaded config with CLI flags on top.
fn build_logging_config(cli: &Cli, mut config: LoggingConfig) -> LoggingConfig {
    if cli.quiet {
        config.enabled = false;
        return config;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    } else if config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }
    config
}
