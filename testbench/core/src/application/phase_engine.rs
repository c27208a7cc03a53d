// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Phase Engine Application Service
//!
//! Drives every phase of every domain to `DONE`, honouring the precedence
//! edges of the phase graph.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Schedule ready phases and walk each through its states
//! - **Dependencies:** Domain (PhaseGraph, PhaseNode), Application (PhaseExecutor)
//!
//! # Engine Loop
//!
//! ```text
//! loop {
//!     schedule every DORMANT phase whose predecessors are all DONE
//!     if nothing is running {
//!         all DONE  -> finished
//!         otherwise -> deadlock
//!     }
//!     await the next running phase (or an abort)
//! }
//! ```
//!
//! # Per-Phase Sequence
//!
//! ```text
//! STARTED        traverse, settle
//! EXECUTING      traverse, settle, wait for objections of the phase and
//!                its siblings (process phases)
//! READY_TO_END   traverse, settle; re-raised objection -> back to EXECUTING
//! ENDED          traverse (live contexts are killed)
//! CLEANUP        wait until no context is outstanding
//! DONE
//! ```

use crate::application::phase_executor::PhaseExecutor;
use crate::application::simulation::Simulation;
use crate::domain::phase::{PhaseNode, PhaseState, StandardPhase};
use crate::domain::report::ids;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Fatal [{id}]: {message}")]
    Fatal { id: String, message: String },

    #[error("Phase '{phase}' timed out after {timeout:?}")]
    Timeout { phase: String, timeout: Duration },

    #[error("Phase graph deadlocked with {0} phase(s) unable to start")]
    Deadlock(usize),

    #[error("Test '{0}' could not be created")]
    TestNotCreated(String),
}

pub struct PhaseEngine {
    sim: Simulation,
}

impl PhaseEngine {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }

    /// Run every phase to completion. On error, every live process context
    /// is cancelled before returning.
    pub async fn run(&self) -> Result<(), EngineError> {
        let result = self.run_graph().await;
        if result.is_err() {
            let killed = self.sim.contexts().kill_all();
            if killed > 0 {
                warn!(killed, "Cancelled live process contexts after aborted run");
            }
        }
        result
    }

    async fn run_graph(&self) -> Result<(), EngineError> {
        let abort = self.sim.abort_token();
        for phase in self.sim.with_graph(|graph| graph.phases().to_vec()) {
            phase.reset();
        }

        let mut running: FuturesUnordered<BoxFuture<'_, Result<(), EngineError>>> = FuturesUnordered::new();

        loop {
            for phase in self.ready_phases() {
                phase.set_state(PhaseState::Scheduled);
                self.trace(&phase, "Scheduled phase");
                running.push(self.execute_phase(phase).boxed());
            }

            if running.is_empty() {
                let pending = self.sim.with_graph(|graph| {
                    graph
                        .phases()
                        .iter()
                        .filter(|p| p.state() != PhaseState::Done)
                        .count()
                });
                if pending > 0 {
                    return Err(EngineError::Deadlock(pending));
                }
                info!(simulation_id = %self.sim.id(), "All phases complete");
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = abort.cancelled() => {
                    return Err(self.sim.take_abort_reason().unwrap_or(EngineError::Fatal {
                        id: "ABORT".to_string(),
                        message: "Simulation aborted".to_string(),
                    }));
                }
                finished = running.next() => {
                    if let Some(Err(e)) = finished {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Dormant phases whose predecessors are all done, evaluated against the
    /// live graph.
    fn ready_phases(&self) -> Vec<Arc<PhaseNode>> {
        self.sim.with_graph(|graph| {
            graph
                .phases()
                .iter()
                .filter(|p| p.state() == PhaseState::Dormant)
                .filter(|p| {
                    graph
                        .preds(p.id)
                        .into_iter()
                        .filter_map(|id| graph.phase(id))
                        .all(|pred| pred.state() == PhaseState::Done)
                })
                .cloned()
                .collect()
        })
    }

    async fn execute_phase(&self, phase: Arc<PhaseNode>) -> Result<(), EngineError> {
        let executor = PhaseExecutor::new(&self.sim, &phase);

        self.transition(&phase, PhaseState::Started);
        executor.traverse(PhaseState::Started)?;
        self.settle().await;

        self.transition(&phase, PhaseState::Executing);
        executor.traverse(PhaseState::Executing)?;
        self.settle().await;

        if phase.is_process() {
            self.wait_for_objections(&phase).await?;
        }

        let max_iterations = self.sim.config().spec.phases.max_ready_to_end_iterations;
        let mut iterations = 0;
        loop {
            self.transition(&phase, PhaseState::ReadyToEnd);
            executor.traverse(PhaseState::ReadyToEnd)?;
            self.settle().await;

            if !phase.is_process() || phase.objection().total() == 0 {
                break;
            }

            iterations += 1;
            if iterations >= max_iterations {
                self.sim.reporter().warning(
                    ids::PH_READY_TO_END,
                    &format!(
                        "Phase '{}' reached {} ready-to-end iterations with objections still raised; ending it",
                        phase.name, max_iterations
                    ),
                );
                break;
            }

            self.transition(&phase, PhaseState::Executing);
            self.wait_for_objections(&phase).await?;
        }

        self.transition(&phase, PhaseState::Ended);
        executor.traverse(PhaseState::Ended)?;

        self.transition(&phase, PhaseState::Cleanup);
        phase.wait_idle().await;

        self.transition(&phase, PhaseState::Done);
        Ok(())
    }

    /// Wait until the phase and its siblings (phases sharing a successor)
    /// have no raised objection. The common `run` phase is bounded by the
    /// configured timeout.
    async fn wait_for_objections(&self, phase: &Arc<PhaseNode>) -> Result<(), EngineError> {
        let timeout = if self.is_run_phase(phase) {
            self.sim.config().spec.phases.timeout
        } else {
            None
        };

        let Some(limit) = timeout else {
            self.wait_for_self_and_siblings(phase).await;
            return Ok(());
        };

        match tokio::time::timeout(limit, self.wait_for_self_and_siblings(phase)).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let message = format!(
                    "Default timeout of {:?} hit while waiting for '{}' objections to drop",
                    limit, phase.name
                );
                self.sim.reporter().fatal(ids::PH_TIMEOUT, &message);
                Err(EngineError::Timeout {
                    phase: phase.name.clone(),
                    timeout: limit,
                })
            }
        }
    }

    async fn wait_for_self_and_siblings(&self, phase: &Arc<PhaseNode>) {
        let siblings = self.siblings(phase);
        loop {
            let mut waited = false;
            if phase.objection().total() > 0 {
                phase.objection().wait_for_all_dropped().await;
                waited = true;
            }
            for sibling in &siblings {
                sibling.wait_for_state(PhaseState::Executing).await;
                if sibling.objection().total() > 0 {
                    sibling.objection().wait_for_all_dropped().await;
                    waited = true;
                }
            }
            // Someone may have re-raised while we waited on another phase
            if !waited {
                return;
            }
        }
    }

    /// Other process phases that share a successor with `phase`.
    fn siblings(&self, phase: &PhaseNode) -> Vec<Arc<PhaseNode>> {
        self.sim.with_graph(|graph| {
            let mut ids: Vec<_> = graph
                .succs(phase.id)
                .into_iter()
                .flat_map(|succ| graph.preds(succ))
                .filter(|id| *id != phase.id)
                .collect();
            ids.sort();
            ids.dedup();
            ids.into_iter()
                .filter_map(|id| graph.phase(id))
                .filter(|p| p.is_process())
                .collect()
        })
    }

    fn is_run_phase(&self, phase: &PhaseNode) -> bool {
        phase.domain == self.sim.common_domain() && phase.name == StandardPhase::Run.name()
    }

    /// Give freshly spawned contexts a chance to run before the next step.
    async fn settle(&self) {
        for _ in 0..self.sim.config().spec.phases.settle_rounds {
            tokio::task::yield_now().await;
        }
    }

    fn transition(&self, phase: &PhaseNode, state: PhaseState) {
        let previous = phase.set_state(state);
        debug!(domain = %phase.domain_name, phase = %phase.name, from = %previous, to = %state, "Phase transition");
        if self.sim.config().spec.phases.trace {
            self.sim.reporter().info(
                ids::PH_TRACE,
                &format!("Phase '{}.{}' {} -> {}", phase.domain_name, phase.name, previous, state),
            );
        }
    }

    fn trace(&self, phase: &PhaseNode, what: &str) {
        if self.sim.config().spec.phases.trace {
            self.sim
                .reporter()
                .info(ids::PH_TRACE, &format!("{} '{}.{}'", what, phase.domain_name, phase.name));
        }
    }
}
