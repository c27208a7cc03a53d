// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command-line factory override specs
//!
//! - type override: `ORIGINAL=OVERRIDE`
//! - instance override: `ORIGINAL=OVERRIDE@PATH`

use std::str::FromStr;
use testbench_core::domain::config::{FactorySettings, InstOverrideSetting, TypeOverrideSetting};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OverrideSpecError {
    #[error("Override '{0}' must have the form ORIGINAL=OVERRIDE")]
    MissingEquals(String),

    #[error("Override '{0}' names an empty type")]
    EmptyType(String),

    #[error("Instance override '{0}' must have the form ORIGINAL=OVERRIDE@PATH")]
    MissingPath(String),
}

fn split_pair(spec: &str) -> Result<(String, String), OverrideSpecError> {
    let (original, override_type) = spec
        .split_once('=')
        .ok_or_else(|| OverrideSpecError::MissingEquals(spec.to_string()))?;
    let (original, override_type) = (original.trim(), override_type.trim());
    if original.is_empty() || override_type.is_empty() {
        return Err(OverrideSpecError::EmptyType(spec.to_string()));
    }
    Ok((original.to_string(), override_type.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeOverrideSpec {
    pub original: String,
    pub override_type: String,
}

impl FromStr for TypeOverrideSpec {
    type Err = OverrideSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (original, override_type) = split_pair(s)?;
        Ok(Self {
            original,
            override_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstOverrideSpec {
    pub original: String,
    pub override_type: String,
    pub path: String,
}

impl FromStr for InstOverrideSpec {
    type Err = OverrideSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pair, path) = s
            .rsplit_once('@')
            .ok_or_else(|| OverrideSpecError::MissingPath(s.to_string()))?;
        if path.trim().is_empty() {
            return Err(OverrideSpecError::MissingPath(s.to_string()));
        }
        let (original, override_type) = split_pair(pair)?;
        Ok(Self {
            original,
            override_type,
            path: path.trim().to_string(),
        })
    }
}

/// Append command-line overrides after the ones the config file lists, so
/// they are applied last.
pub fn merge_into(settings: &mut FactorySettings, types: &[TypeOverrideSpec], insts: &[InstOverrideSpec]) {
    settings.type_overrides.extend(types.iter().map(|t| TypeOverrideSetting {
        original: t.original.clone(),
        override_type: t.override_type.clone(),
        replace: true,
    }));
    settings.inst_overrides.extend(insts.iter().map(|i| InstOverrideSetting {
        original: i.original.clone(),
        override_type: i.override_type.clone(),
        path: i.path.clone(),
    }));
}
