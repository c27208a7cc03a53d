// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `tbrun run`: create a test through the factory and run every phase

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use testbench_core::application::simulation::Simulation;
use testbench_core::domain::config::SimulationConfig;
use testbench_core::domain::report::Severity;
use tracing::{debug, info};

use super::overrides::{merge_into, InstOverrideSpec, TypeOverrideSpec};
use crate::demo;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Registered type name of the test to run
    #[arg(long, default_value = demo::DEFAULT_TEST)]
    pub test: String,

    /// Type override, ORIGINAL=OVERRIDE (repeatable)
    #[arg(long = "type-override", value_name = "ORIGINAL=OVERRIDE")]
    pub type_overrides: Vec<TypeOverrideSpec>,

    /// Instance override, ORIGINAL=OVERRIDE@PATH (repeatable)
    #[arg(long = "inst-override", value_name = "ORIGINAL=OVERRIDE@PATH")]
    pub inst_overrides: Vec<InstOverrideSpec>,

    /// Bound on the run phase, in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Report every phase state transition
    #[arg(long)]
    pub trace: bool,

    /// Print the factory configuration once the test is created
    #[arg(long)]
    pub print_factory: bool,

    /// Print every report as a JSON line after the run
    #[arg(long)]
    pub json: bool,
}

/// Fold the command-line flags into the loaded configuration.
pub fn apply_args(config: &mut SimulationConfig, args: &RunArgs) {
    merge_into(&mut config.spec.factory, &args.type_overrides, &args.inst_overrides);
    if args.trace {
        config.spec.phases.trace = true;
    }
    if args.print_factory {
        config.spec.factory.print = true;
    }
    if let Some(ms) = args.timeout_ms {
        config.spec.phases.timeout = Some(Duration::from_millis(ms));
    }
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = SimulationConfig::load_or_default(config_path).context("Failed to load configuration")?;
    apply_args(&mut config, &args);
    config.validate().context("Configuration validation failed")?;

    let (sim, bus) = Simulation::with_report_bus(config);
    demo::register(&sim);
    let mut reports = bus.subscribe();

    println!(
        "{}",
        format!("Running test '{}' (simulation {})", args.test, sim.id()).bold()
    );
    let outcome = sim.run_test(&args.test).await;

    if args.json {
        for event in reports.drain() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    let counts = bus.counts();
    debug!(components = sim.component_count(), "Simulation finished");
    println!();
    println!("{}", "Report summary:".bold());
    println!("{}", counts.summary());
    println!();

    match outcome {
        Ok(_) if counts.failures() == 0 => {
            info!(test = %args.test, "Test passed");
            println!("{}", "✓ TEST PASSED".green());
            Ok(())
        }
        Ok(_) => {
            println!("{}", "✗ TEST FAILED".red());
            bail!(
                "Test '{}' reported {} error(s) and {} fatal(s)",
                args.test,
                counts.severity(Severity::Error),
                counts.severity(Severity::Fatal)
            )
        }
        Err(e) => {
            println!("{}", "✗ TEST ABORTED".red());
            Err(anyhow::Error::new(e).context(format!("Test '{}' aborted", args.test)))
        }
    }
}
