// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Phase Domain Model
//!
//! A phase is a node of a domain's phase graph. It carries its execution
//! strategy (function or process), its traversal order, its lifecycle state
//! and the bookkeeping the engine needs to know when it may end.
//!
//! # State Machine
//!
//! ```text
//! DORMANT → SCHEDULED → STARTED → EXECUTING → READY_TO_END → ENDED → CLEANUP → DONE
//!                                     ↑______________|
//!                                   (objection re-raised)
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Phase identity, state and the standard phase set

use crate::application::simulation::PhaseContext;
use crate::domain::objection::Objection;
use crate::domain::object::Component;
use crate::domain::schedule::DomainId;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhaseId(pub(crate) usize);

impl PhaseId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    /// Executes synchronously, once per component.
    Function,
    /// Executes as one concurrent context per component.
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traversal {
    /// Node first, then its children as they exist after the node ran.
    TopDown,
    /// Children first, then the node.
    BottomUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    Dormant,
    Scheduled,
    Started,
    Executing,
    ReadyToEnd,
    Ended,
    Cleanup,
    Done,
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseState::Dormant => "DORMANT",
            PhaseState::Scheduled => "SCHEDULED",
            PhaseState::Started => "STARTED",
            PhaseState::Executing => "EXECUTING",
            PhaseState::ReadyToEnd => "READY_TO_END",
            PhaseState::Ended => "ENDED",
            PhaseState::Cleanup => "CLEANUP",
            PhaseState::Done => "DONE",
        };
        f.write_str(s)
    }
}

impl PhaseState {
    /// States at which component callbacks are delivered.
    pub fn is_traversed(&self) -> bool {
        matches!(
            self,
            PhaseState::Started | PhaseState::Executing | PhaseState::ReadyToEnd | PhaseState::Ended
        )
    }
}

/// Execution body of a phase. A component can replace the body of a single
/// phase for itself with its own implementation.
#[async_trait]
pub trait PhaseImp: Send + Sync {
    /// Body of a function phase.
    fn exec_func(&self, _component: &Arc<dyn Component>, _phase: &PhaseContext) {}

    /// Body of a process phase. Runs inside the component's concurrent
    /// context and may be cancelled at any await point.
    async fn exec_task(&self, _component: Arc<dyn Component>, _phase: PhaseContext) {}
}

/// The predefined phases of the common domain and of the runtime schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardPhase {
    Build,
    Connect,
    EndOfElaboration,
    StartOfSimulation,
    Run,
    Extract,
    Check,
    Report,
    Final,
    PreReset,
    Reset,
    PostReset,
    PreConfigure,
    Configure,
    PostConfigure,
    PreMain,
    Main,
    PostMain,
    PreShutdown,
    Shutdown,
    PostShutdown,
}

impl StandardPhase {
    /// Common domain, in execution order.
    pub const COMMON: [StandardPhase; 9] = [
        StandardPhase::Build,
        StandardPhase::Connect,
        StandardPhase::EndOfElaboration,
        StandardPhase::StartOfSimulation,
        StandardPhase::Run,
        StandardPhase::Extract,
        StandardPhase::Check,
        StandardPhase::Report,
        StandardPhase::Final,
    ];

    /// Runtime schedule, in execution order.
    pub const RUNTIME: [StandardPhase; 12] = [
        StandardPhase::PreReset,
        StandardPhase::Reset,
        StandardPhase::PostReset,
        StandardPhase::PreConfigure,
        StandardPhase::Configure,
        StandardPhase::PostConfigure,
        StandardPhase::PreMain,
        StandardPhase::Main,
        StandardPhase::PostMain,
        StandardPhase::PreShutdown,
        StandardPhase::Shutdown,
        StandardPhase::PostShutdown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StandardPhase::Build => "build",
            StandardPhase::Connect => "connect",
            StandardPhase::EndOfElaboration => "end_of_elaboration",
            StandardPhase::StartOfSimulation => "start_of_simulation",
            StandardPhase::Run => "run",
            StandardPhase::Extract => "extract",
            StandardPhase::Check => "check",
            StandardPhase::Report => "report",
            StandardPhase::Final => "final",
            StandardPhase::PreReset => "pre_reset",
            StandardPhase::Reset => "reset",
            StandardPhase::PostReset => "post_reset",
            StandardPhase::PreConfigure => "pre_configure",
            StandardPhase::Configure => "configure",
            StandardPhase::PostConfigure => "post_configure",
            StandardPhase::PreMain => "pre_main",
            StandardPhase::Main => "main",
            StandardPhase::PostMain => "post_main",
            StandardPhase::PreShutdown => "pre_shutdown",
            StandardPhase::Shutdown => "shutdown",
            StandardPhase::PostShutdown => "post_shutdown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::COMMON
            .iter()
            .chain(Self::RUNTIME.iter())
            .copied()
            .find(|p| p.name() == name)
    }

    pub fn kind(&self) -> PhaseKind {
        match self {
            StandardPhase::Build
            | StandardPhase::Connect
            | StandardPhase::EndOfElaboration
            | StandardPhase::StartOfSimulation
            | StandardPhase::Extract
            | StandardPhase::Check
            | StandardPhase::Report
            | StandardPhase::Final => PhaseKind::Function,
            _ => PhaseKind::Process,
        }
    }

    pub fn traversal(&self) -> Traversal {
        match self {
            StandardPhase::Build => Traversal::TopDown,
            _ => Traversal::BottomUp,
        }
    }
}

#[async_trait]
impl PhaseImp for StandardPhase {
    fn exec_func(&self, component: &Arc<dyn Component>, phase: &PhaseContext) {
        match self {
            StandardPhase::Build => component.build_phase(phase),
            StandardPhase::Connect => component.connect_phase(phase),
            StandardPhase::EndOfElaboration => component.end_of_elaboration_phase(phase),
            StandardPhase::StartOfSimulation => component.start_of_simulation_phase(phase),
            StandardPhase::Extract => component.extract_phase(phase),
            StandardPhase::Check => component.check_phase(phase),
            StandardPhase::Report => component.report_phase(phase),
            StandardPhase::Final => component.final_phase(phase),
            _ => {}
        }
    }

    async fn exec_task(&self, component: Arc<dyn Component>, phase: PhaseContext) {
        match self {
            StandardPhase::Run => component.run_phase(phase).await,
            StandardPhase::PreReset => component.pre_reset_phase(phase).await,
            StandardPhase::Reset => component.reset_phase(phase).await,
            StandardPhase::PostReset => component.post_reset_phase(phase).await,
            StandardPhase::PreConfigure => component.pre_configure_phase(phase).await,
            StandardPhase::Configure => component.configure_phase(phase).await,
            StandardPhase::PostConfigure => component.post_configure_phase(phase).await,
            StandardPhase::PreMain => component.pre_main_phase(phase).await,
            StandardPhase::Main => component.main_phase(phase).await,
            StandardPhase::PostMain => component.post_main_phase(phase).await,
            StandardPhase::PreShutdown => component.pre_shutdown_phase(phase).await,
            StandardPhase::Shutdown => component.shutdown_phase(phase).await,
            StandardPhase::PostShutdown => component.post_shutdown_phase(phase).await,
            _ => {}
        }
    }
}

/// A phase instance within one domain.
pub struct PhaseNode {
    pub id: PhaseId,
    pub name: String,
    pub kind: PhaseKind,
    pub traversal: Traversal,
    pub domain: DomainId,
    pub domain_name: String,
    /// Name of the schedule that created the node.
    pub schedule: String,
    imp: Arc<dyn PhaseImp>,
    state: Mutex<PhaseState>,
    outstanding: AtomicUsize,
    killed: AtomicUsize,
    idle: Notify,
    state_changed: Notify,
    objection: Arc<dyn Objection>,
}

impl fmt::Debug for PhaseNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("domain", &self.domain_name)
            .field("state", &self.state())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl PhaseNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PhaseId,
        name: impl Into<String>,
        kind: PhaseKind,
        traversal: Traversal,
        domain: DomainId,
        domain_name: impl Into<String>,
        schedule: impl Into<String>,
        imp: Arc<dyn PhaseImp>,
        objection: Arc<dyn Objection>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            traversal,
            domain,
            domain_name: domain_name.into(),
            schedule: schedule.into(),
            imp,
            state: Mutex::new(PhaseState::Dormant),
            outstanding: AtomicUsize::new(0),
            killed: AtomicUsize::new(0),
            idle: Notify::new(),
            state_changed: Notify::new(),
            objection,
        }
    }

    pub fn state(&self) -> PhaseState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: PhaseState) -> PhaseState {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        self.state_changed.notify_waiters();
        previous
    }

    /// Resolves once the phase has reached `state` or any later state.
    pub async fn wait_for_state(&self, state: PhaseState) {
        loop {
            let notified = self.state_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state() >= state {
                return;
            }
            notified.await;
        }
    }

    pub fn imp(&self) -> Arc<dyn PhaseImp> {
        self.imp.clone()
    }

    pub fn objection(&self) -> &Arc<dyn Objection> {
        &self.objection
    }

    pub fn is_process(&self) -> bool {
        self.kind == PhaseKind::Process
    }

    /// Concurrent contexts spawned for this phase that have not yet returned.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Contexts force-terminated at `ENDED`.
    pub fn killed(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn context_spawned(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    pub fn context_finished(&self) {
        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        if previous <= 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn context_killed(&self) {
        self.killed.fetch_add(1, Ordering::SeqCst);
    }

    /// Resolves once no concurrent context of this phase is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Reset per-run bookkeeping for a phase that is scheduled again.
    pub fn reset(&self) {
        self.set_state(PhaseState::Dormant);
        self.killed.store(0, Ordering::SeqCst);
        self.objection.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_phase_properties() {
        assert_eq!(StandardPhase::Build.traversal(), Traversal::TopDown);
        assert_eq!(StandardPhase::Connect.traversal(), Traversal::BottomUp);
        assert_eq!(StandardPhase::Run.kind(), PhaseKind::Process);
        assert_eq!(StandardPhase::Main.kind(), PhaseKind::Process);
        assert_eq!(StandardPhase::Report.kind(), PhaseKind::Function);
        assert_eq!(StandardPhase::from_name("post_shutdown"), Some(StandardPhase::PostShutdown));
        assert_eq!(StandardPhase::from_name("bogus"), None);
    }

    #[test]
    fn test_state_order_and_display() {
        assert!(PhaseState::Dormant < PhaseState::Started);
        assert!(PhaseState::Ended < PhaseState::Done);
        assert_eq!(PhaseState::ReadyToEnd.to_string(), "READY_TO_END");
        assert!(PhaseState::Ended.is_traversed());
        assert!(!PhaseState::Cleanup.is_traversed());
    }
}
