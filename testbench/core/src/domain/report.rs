// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reporting collaborator contract.
//!
//! Every diagnostic raised by the factory, the component tree and the phase
//! engine is emitted through a [`Reporter`] under a stable category id so
//! tooling can filter by class of failure. The core never formats or routes
//! messages beyond building the message text.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Severity/id vocabulary and the sink trait

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a report, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

/// Verbosity threshold for informational reports. Lower is more important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    None = 0,
    Low = 100,
    Medium = 200,
    High = 300,
    Full = 400,
    Debug = 500,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Medium
    }
}

/// Stable category ids.
pub mod ids {
    /// Type name already claimed, or type already registered.
    pub const TPRGED: &str = "TPRGED";
    /// Type override kept because `replace` was not requested.
    pub const TPREGD: &str = "TPREGD";
    /// Existing type override replaced.
    pub const TPREGR: &str = "TPREGR";
    /// Original and override are the same type.
    pub const TYPDUP: &str = "TYPDUP";
    /// Override target type is not registered.
    pub const TYPNTF: &str = "TYPNTF";
    /// Identical instance override already on file.
    pub const DUPOVRD: &str = "DUPOVRD";
    /// Override resolution found a cycle.
    pub const OVRDLOOP: &str = "OVRDLOOP";
    /// Creation requested for an unregistered type name.
    pub const BDTYP: &str = "BDTYP";
    /// Resolved type cannot produce the requested kind (object vs component).
    pub const CRTKIND: &str = "CRTKIND";
    /// Lookup of an unknown type name.
    pub const UNKNOWN_TYPE_NAME: &str = "UnknownTypeName";
    /// Child name already used by a different component.
    pub const BDCLD: &str = "BDCLD";
    /// Component already a child under another name.
    pub const BDCHLD: &str = "BDCHLD";
    /// Illegal component name.
    pub const INVCHR: &str = "INVCHR";
    /// Factory override tables and debug output.
    pub const FACTORY: &str = "Factory";
    /// Second concurrent context for a live (component, phase) pair.
    pub const PH_DUPSPAWN: &str = "PH_DUPSPAWN";
    /// Kill of an already finished concurrent context.
    pub const PH_KILLDONE: &str = "PH_KILLDONE";
    /// Duplicate schedule offered to a domain.
    pub const PH_DUPSCHED: &str = "PH_DUPSCHED";
    /// Run phase hit the configured timeout.
    pub const PH_TIMEOUT: &str = "PH_TIMEOUT";
    /// Ready-to-end iteration cap reached.
    pub const PH_READY_TO_END: &str = "PH_READY_TO_END";
    /// Phase state transitions, when tracing is enabled.
    pub const PH_TRACE: &str = "PH/TRC";
    /// More objections dropped than raised.
    pub const OBJTN_ZERO: &str = "OBJTN_ZERO";
    /// Test could not be created.
    pub const INVTST: &str = "INVTST";
}

/// One emitted diagnostic, as broadcast to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEvent {
    pub severity: Severity,
    pub id: String,
    pub message: String,
    /// Hierarchical name of the reporting component, empty for the core.
    pub context: String,
    pub reported_at: DateTime<Utc>,
}

/// Category-id + severity sink.
pub trait Reporter: Send + Sync {
    fn report(&self, severity: Severity, id: &str, message: &str, context: &str);

    fn info(&self, id: &str, message: &str) {
        self.report(Severity::Info, id, message, "");
    }

    fn warning(&self, id: &str, message: &str) {
        self.report(Severity::Warning, id, message, "");
    }

    fn error(&self, id: &str, message: &str) {
        self.report(Severity::Error, id, message, "");
    }

    fn fatal(&self, id: &str, message: &str) {
        self.report(Severity::Fatal, id, message, "");
    }
}
