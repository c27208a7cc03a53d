// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Default implementations of the reporting and objection collaborators.

pub mod objection;
pub mod report_bus;
