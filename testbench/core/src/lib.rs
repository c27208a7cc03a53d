// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Testbench runtime core
//!
//! Polymorphic creation through a factory with type and instance overrides,
//! and a domain-partitioned phase engine that drives a component hierarchy
//! through its lifecycle.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Factory, component tree and phase engine

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::{EngineError, Factory, PhaseContext, PrintScope, Simulation};
pub use domain::*;
