// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use testbench_core::domain::config::SimulationConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write the default configuration as a starting point
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./testbench.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = SimulationConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. TB_CONFIG_PATH: {}",
            std::env::var("TB_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./testbench.yaml");
        println!("  4. ~/.testbench/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    let phases = &config.spec.phases;
    println!("{}", "Phases:".bold());
    match phases.timeout {
        Some(timeout) => println!("  Run timeout: {:?}", timeout),
        None => println!("  Run timeout: {}", "(unbounded)".dimmed()),
    }
    println!("  Ready-to-end iterations: {}", phases.max_ready_to_end_iterations);
    println!("  Settle rounds: {}", phases.settle_rounds);
    println!("  Trace: {}", phases.trace);
    println!();

    let factory = &config.spec.factory;
    println!("{}", "Factory overrides:".bold());
    if factory.type_overrides.is_empty() && factory.inst_overrides.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for ovr in &factory.type_overrides {
        let mode = if ovr.replace { "replace" } else { "keep first" };
        println!("  type  {} -> {} ({})", ovr.original, ovr.override_type, mode);
    }
    for ovr in &factory.inst_overrides {
        println!("  inst  {} -> {} at {}", ovr.original, ovr.override_type, ovr.path);
    }
    println!();

    let reporting = &config.spec.reporting;
    println!("{}", "Reporting:".bold());
    println!("  Default verbosity: {:?}", reporting.default_verbosity);
    for setting in &reporting.verbosity {
        println!(
            "  {} [{}] -> {:?}",
            setting.component,
            setting.phase.as_deref().unwrap_or("all phases"),
            setting.verbosity
        );
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = SimulationConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    let sample = SimulationConfig::default().to_yaml_string()?;

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("testbench.yaml");

        generate(output.clone()).await.unwrap();
        validate(Some(output)).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_reports_bad_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("bad.yaml");
        std::fs::write(&output, "apiVersion: v0\nkind: SimulationConfig\nmetadata:\n  name: x\n").unwrap();

        assert!(validate(Some(output)).await.is_err());
    }
}
