// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Creatable contracts for objects and components.
//!
//! Concrete types expose a name-taking constructor and a static type name; the
//! factory never calls them directly but always goes through the registered
//! wrapper (see [`crate::domain::wrapper`]).
//!
//! Components additionally receive the lifecycle callbacks of every standard
//! phase. Function-phase callbacks are plain methods; process-phase bodies are
//! async and run in their own cancellable context.

use crate::application::simulation::PhaseContext;
use async_trait::async_trait;
use std::any::Any;

/// Plain data object created through the factory.
pub trait Object: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Type name under which the concrete type is registered.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

/// Creation contract for objects.
pub trait ObjectCreatable: Object + Sized {
    const TYPE_NAME: &'static str;

    fn new(name: &str) -> Self;
}

/// Creation contract for components.
pub trait ComponentCreatable: Component + Sized {
    const TYPE_NAME: &'static str;

    fn new(name: &str) -> Self;
}

/// A node of the testbench hierarchy.
///
/// Every callback has an empty default so components only implement the
/// phases they take part in. Hierarchy data (name, parent, children, domain)
/// lives in the component tree, not in the implementing type.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    // Common domain, function phases
    fn build_phase(&self, _phase: &PhaseContext) {}
    fn connect_phase(&self, _phase: &PhaseContext) {}
    fn end_of_elaboration_phase(&self, _phase: &PhaseContext) {}
    fn start_of_simulation_phase(&self, _phase: &PhaseContext) {}

    /// Long-running body. Runs in parallel with the runtime schedule.
    async fn run_phase(&self, _phase: PhaseContext) {}

    // Runtime schedule, process phases
    async fn pre_reset_phase(&self, _phase: PhaseContext) {}
    async fn reset_phase(&self, _phase: PhaseContext) {}
    async fn post_reset_phase(&self, _phase: PhaseContext) {}
    async fn pre_configure_phase(&self, _phase: PhaseContext) {}
    async fn configure_phase(&self, _phase: PhaseContext) {}
    async fn post_configure_phase(&self, _phase: PhaseContext) {}
    async fn pre_main_phase(&self, _phase: PhaseContext) {}
    async fn main_phase(&self, _phase: PhaseContext) {}
    async fn post_main_phase(&self, _phase: PhaseContext) {}
    async fn pre_shutdown_phase(&self, _phase: PhaseContext) {}
    async fn shutdown_phase(&self, _phase: PhaseContext) {}
    async fn post_shutdown_phase(&self, _phase: PhaseContext) {}

    fn extract_phase(&self, _phase: &PhaseContext) {}
    fn check_phase(&self, _phase: &PhaseContext) {}
    fn report_phase(&self, _phase: &PhaseContext) {}
    fn final_phase(&self, _phase: &PhaseContext) {}

    fn phase_started(&self, _phase: &PhaseContext) {}
    fn phase_ready_to_end(&self, _phase: &PhaseContext) {}
    fn phase_ended(&self, _phase: &PhaseContext) {}

    /// Schedule-construction hook, invoked when the component is assigned to
    /// a domain. The returned definition is only built if the domain does not
    /// already own a schedule of the same name.
    fn define_domain(&self) -> crate::domain::schedule::ScheduleDefinition {
        crate::domain::schedule::ScheduleDefinition::runtime()
    }

    /// Stimulus-originating role, if this component has one.
    fn as_sequencer(&self) -> Option<&dyn Sequencer> {
        None
    }
}

/// Stimulus-originating role of a component.
#[async_trait]
pub trait Sequencer: Send + Sync {
    /// Starts whatever stimulus is pending for `phase`. Awaited inside the
    /// component's own process-phase context, before the phase body.
    async fn start_phase_sequence(&self, phase: &PhaseContext);

    /// Invoked synchronously when `phase` ends.
    fn stop_phase_sequence(&self, _phase: &PhaseContext) {}
}
