// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Loopback demo testbench
//!
//! A driver pushes packets into a loopback link; a monitor on the far end
//! compares what arrives against a scoreboard filled by the driver.
//!
//! # Hierarchy
//!
//! ```text
//! tb_test_top          loopback_test
//! └── env              loopback_env      (owns link + scoreboard)
//!     ├── driver       loopback_driver   (main: send packets)
//!     └── monitor      loopback_monitor  (run: receive + compare)
//! ```
//!
//! Overriding `loopback_driver` with `loopback_error_driver` corrupts every
//! third packet, which the `check` phase turns into errors.

pub mod agents;
pub mod env;
pub mod packet;

use testbench_core::application::simulation::Simulation;
use testbench_core::domain::wrapper::ObjectRegistry;

pub use agents::{ErrorInjectingDriver, LoopbackDriver, LoopbackMonitor};
pub use env::{LoopbackEnv, LoopbackTest, Scoreboard};
pub use packet::Packet;

/// Name of the test `tbrun run` creates by default.
pub const DEFAULT_TEST: &str = "loopback_test";

/// Report id used by the demo components.
pub const REPORT_ID: &str = "LOOPBACK";

/// Register every demo type with the simulation's factory.
pub fn register(sim: &Simulation) {
    sim.register_component::<LoopbackTest>();
    sim.register_component::<LoopbackEnv>();
    sim.register_component::<LoopbackDriver>();
    sim.register_component::<ErrorInjectingDriver>();
    sim.register_component::<LoopbackMonitor>();
    sim.register(ObjectRegistry::<Packet>::get());
}
