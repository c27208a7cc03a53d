// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `tbrun factory`: inspect registered types and overrides

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use testbench_core::application::factory_print::PrintScope;
use testbench_core::application::simulation::Simulation;
use testbench_core::domain::config::SimulationConfig;

use super::overrides::{merge_into, InstOverrideSpec, TypeOverrideSpec};
use crate::demo;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ScopeArg {
    /// Override tables only
    Overrides,
    /// Overrides and user types
    User,
    /// Overrides and every registered type
    All,
}

impl From<ScopeArg> for PrintScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Overrides => PrintScope::Overrides,
            ScopeArg::User => PrintScope::User,
            ScopeArg::All => PrintScope::All,
        }
    }
}

#[derive(Args, Debug)]
pub struct FactoryArgs {
    /// Explain how a request for TYPE at --path would resolve
    #[arg(long, value_name = "TYPE")]
    pub debug: Option<String>,

    /// Full instance path used with --debug
    #[arg(long, value_name = "PATH", default_value = "tb_test_top.env.driver")]
    pub path: String,

    /// What to list when not debugging a request
    #[arg(long, value_enum, default_value = "user")]
    pub scope: ScopeArg,

    /// Type override, ORIGINAL=OVERRIDE (repeatable)
    #[arg(long = "type-override", value_name = "ORIGINAL=OVERRIDE")]
    pub type_overrides: Vec<TypeOverrideSpec>,

    /// Instance override, ORIGINAL=OVERRIDE@PATH (repeatable)
    #[arg(long = "inst-override", value_name = "ORIGINAL=OVERRIDE@PATH")]
    pub inst_overrides: Vec<InstOverrideSpec>,
}

/// Build the factory exactly as `tbrun run` would and describe it.
pub fn describe(args: &FactoryArgs, mut config: SimulationConfig) -> Result<String> {
    merge_into(&mut config.spec.factory, &args.type_overrides, &args.inst_overrides);

    let (sim, _bus) = Simulation::with_report_bus(config);
    demo::register(&sim);
    sim.apply_config_overrides();

    let Some(requested) = &args.debug else {
        return Ok(sim.with_factory(|factory| factory.render(args.scope.into())));
    };

    let (parent, name) = args.path.rsplit_once('.').unwrap_or(("", args.path.as_str()));
    sim.with_factory(|factory| factory.debug_create_by_name(requested, parent, name))
        .with_context(|| format!("The factory does not recognize '{}'", requested))
}

pub async fn execute(args: FactoryArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = SimulationConfig::load_or_default(config_path).context("Failed to load configuration")?;
    let text = describe(&args, config)?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(debug: Option<&str>) -> FactoryArgs {
        FactoryArgs {
            debug: debug.map(str::to_string),
            path: "tb_test_top.env.driver".to_string(),
            scope: ScopeArg::All,
            type_overrides: vec!["loopback_driver=loopback_error_driver".parse().unwrap()],
            inst_overrides: Vec::new(),
        }
    }

    #[test]
    fn test_listing_includes_demo_types_and_overrides() {
        let text = describe(&args(None), SimulationConfig::default()).unwrap();
        assert!(text.contains("loopback_error_driver"));
        assert!(text.contains("loopback_packet"));
        assert!(text.contains("Type Overrides:"));
    }

    #[test]
    fn test_debug_shows_resolved_type() {
        let text = describe(&args(Some("loopback_driver")), SimulationConfig::default()).unwrap();
        assert!(text.contains("tb_test_top.env.driver"));
        assert!(text.contains("loopback_error_driver"));
    }

    #[test]
    fn test_debug_of_unknown_type_fails() {
        assert!(describe(&args(Some("ghost")), SimulationConfig::default()).is_err());
    }
}
