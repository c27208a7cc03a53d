// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Simulation Configuration Types
//
// Defines the configuration schema for a testbench run:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Phase engine limits (run-phase timeout, ready-to-end iterations)
// - Factory overrides applied before the test is created
// - Report verbosity per component and phase

use crate::domain::report::Verbosity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "testbench/v1";
pub const KIND: &str = "SimulationConfig";

/// Top-level simulation configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// API version (must be "testbench/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "SimulationConfig")
    pub kind: String,

    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: SimulationSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationSpec {
    #[serde(default)]
    pub phases: PhaseSettings,

    #[serde(default)]
    pub factory: FactorySettings,

    #[serde(default)]
    pub reporting: ReportingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSettings {
    /// Upper bound on the `run` phase; unbounded when absent.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Rounds of `READY_TO_END` before a phase is forced to end.
    #[serde(default = "default_max_ready_to_end_iterations")]
    pub max_ready_to_end_iterations: u32,

    /// Scheduler yields after starting a phase's concurrent contexts.
    #[serde(default = "default_settle_rounds")]
    pub settle_rounds: u32,

    /// Log every phase state transition.
    #[serde(default)]
    pub trace: bool,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            max_ready_to_end_iterations: default_max_ready_to_end_iterations(),
            settle_rounds: default_settle_rounds(),
            trace: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorySettings {
    #[serde(default)]
    pub type_overrides: Vec<TypeOverrideSetting>,

    #[serde(default)]
    pub inst_overrides: Vec<InstOverrideSetting>,

    /// Print the factory configuration once the test is created.
    #[serde(default)]
    pub print: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeOverrideSetting {
    pub original: String,
    #[serde(rename = "override")]
    pub override_type: String,
    #[serde(default = "default_true")]
    pub replace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstOverrideSetting {
    pub original: String,
    #[serde(rename = "override")]
    pub override_type: String,
    /// Full instance path glob, relative to the top of the hierarchy.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingSettings {
    #[serde(default)]
    pub default_verbosity: Verbosity,

    #[serde(default)]
    pub verbosity: Vec<VerbositySetting>,

    /// Capacity of the report broadcast channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            default_verbosity: Verbosity::default(),
            verbosity: Vec::new(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Verbosity applied to matching components when a phase starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerbositySetting {
    /// Component full-name glob.
    pub component: String,
    /// Phase name; every phase when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub verbosity: Verbosity,
}

impl VerbositySetting {
    pub fn applies_to(&self, full_name: &str, phase: &str) -> bool {
        self.phase.as_deref().map_or(true, |p| p == phase) && crate::domain::glob::is_match(&self.component, full_name)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_ready_to_end_iterations() -> u32 {
    20
}

fn default_settle_rounds() -> u32 {
    4
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ConfigMetadata {
                name: "testbench".to_string(),
                version: None,
                labels: None,
            },
            spec: SimulationSpec::default(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. TB_CONFIG_PATH environment variable
    /// 2. ./testbench.yaml (working directory)
    /// 3. ~/.testbench/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TB_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./testbench.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".testbench").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::debug!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TB_PHASE_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(timeout) => {
                    tracing::info!("Environment override: TB_PHASE_TIMEOUT={}", val);
                    self.spec.phases.timeout = Some(timeout);
                }
                Err(e) => {
                    tracing::warn!("Invalid value for TB_PHASE_TIMEOUT: '{}' ({}). Ignoring.", val, e);
                }
            }
        }

        if let Ok(val) = std::env::var("TB_MAX_READY_TO_END") {
            match val.parse::<u32>() {
                Ok(n) => {
                    tracing::info!("Environment override: TB_MAX_READY_TO_END={}", n);
                    self.spec.phases.max_ready_to_end_iterations = n;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for TB_MAX_READY_TO_END: '{}'. Expected an integer. Ignoring.", val);
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let phases = &self.spec.phases;
        if phases.max_ready_to_end_iterations == 0 {
            anyhow::bail!("spec.phases.max_ready_to_end_iterations must be at least 1");
        }
        if phases.timeout == Some(Duration::ZERO) {
            anyhow::bail!("spec.phases.timeout must be greater than zero");
        }

        for ovr in &self.spec.factory.type_overrides {
            if ovr.original.is_empty() || ovr.override_type.is_empty() {
                anyhow::bail!("Type override entries need both 'original' and 'override'");
            }
            if ovr.original == ovr.override_type {
                anyhow::bail!("Type override of '{}' onto itself", ovr.original);
            }
        }

        for ovr in &self.spec.factory.inst_overrides {
            if ovr.original.is_empty() || ovr.override_type.is_empty() {
                anyhow::bail!("Instance override entries need both 'original' and 'override'");
            }
            if ovr.path.is_empty() {
                anyhow::bail!("Instance override of '{}' has an empty path", ovr.original);
            }
        }

        if self.spec.reporting.channel_capacity == 0 {
            anyhow::bail!("spec.reporting.channel_capacity must be at least 1");
        }

        Ok(())
    }
}
