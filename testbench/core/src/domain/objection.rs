// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Objection collaborator contract.
//!
//! An objection is a counted hold on a phase: while any count is raised the
//! phase will not leave `EXECUTING`. Components raise and drop objections
//! through their [`crate::application::simulation::PhaseContext`].

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectionError {
    #[error("'{source_name}' attempted to drop {requested} objection(s) from '{objection}' but only {raised} are raised")]
    DropBelowZero {
        objection: String,
        source_name: String,
        requested: usize,
        raised: usize,
    },
}

#[async_trait]
pub trait Objection: Send + Sync {
    fn name(&self) -> &str;

    fn raise_objection(&self, source: &str, count: usize);

    /// Drops `count`. Dropping more than is raised clamps the total at zero and
    /// returns an error.
    fn drop_objection(&self, source: &str, count: usize) -> Result<(), ObjectionError>;

    fn total(&self) -> usize;

    /// Resolves when the total is zero.
    async fn wait_for_all_dropped(&self);

    fn clear(&self);
}

/// Builds the objection for a newly created phase, given the phase name.
pub type ObjectionFactory = Arc<dyn Fn(&str) -> Arc<dyn Objection> + Send + Sync>;
