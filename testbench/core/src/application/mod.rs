// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod factory;
pub mod factory_print;
pub mod phase_engine;
pub mod phase_executor;
pub mod process_context;
pub mod simulation;

// Re-export services for convenience
pub use factory::Factory;
pub use factory_print::PrintScope;
pub use phase_engine::{EngineError, PhaseEngine};
pub use simulation::{CreateError, PhaseContext, Simulation, TEST_TOP_NAME};
