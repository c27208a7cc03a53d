// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Types and contracts shared by the factory and the phase engine.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure model, no scheduling or I/O

pub mod component_tree;
pub mod config;
pub mod factory_override;
pub mod glob;
pub mod object;
pub mod objection;
pub mod phase;
pub mod report;
pub mod schedule;
pub mod wrapper;
