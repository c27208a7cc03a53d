// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # tbrun
//!
//! Runs testbench simulations built on `testbench-core`.
//!
//! ## Commands
//!
//! - `tbrun run [--test NAME] [--type-override A=B] [--inst-override A=B@PATH]` - Run a test
//! - `tbrun factory [--debug TYPE --path PATH] [--scope overrides|user|all]` - Inspect the factory
//! - `tbrun config show|validate|generate` - Configuration management
//!
//! The bundled loopback testbench (`loopback_test`) is registered for every
//! command.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use testbench_cli::commands::{self, ConfigCommand, FactoryArgs, RunArgs};

/// tbrun - testbench runner
#[derive(Parser)]
#[command(name = "tbrun")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "TB_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TB_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a test through the factory and run every phase
    #[command(name = "run")]
    Run(RunArgs),

    /// Print the factory configuration or explain a resolution
    #[command(name = "factory")]
    Factory(FactoryArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Run(args)) => commands::run::execute(args, cli.config).await,
        Some(Commands::Factory(args)) => commands::factory::execute(args, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
