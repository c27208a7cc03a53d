// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for tbrun

pub mod config;
pub mod factory;
pub mod overrides;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::factory::FactoryArgs;
pub use self::run::RunArgs;
