// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Phase Executor
//!
//! Walks the component tree for one (phase, state) pair and dispatches the
//! matching callback on every component that belongs to the phase's domain.
//!
//! # Dispatch Table
//!
//! | State | Function phase | Process phase |
//! |-------|----------------|---------------|
//! | `STARTED` | `phase_started` | `phase_started` |
//! | `EXECUTING` | body, synchronously | body, in a spawned context |
//! | `READY_TO_END` | `phase_ready_to_end` | `phase_ready_to_end` |
//! | `ENDED` | `phase_ended` | `phase_ended`, then the context is killed |

use crate::application::phase_engine::EngineError;
use crate::application::process_context::{KillOutcome, SpawnError};
use crate::application::simulation::{PhaseContext, Simulation};
use crate::domain::component_tree::ComponentId;
use crate::domain::object::Component;
use crate::domain::phase::{PhaseImp, PhaseKind, PhaseNode, PhaseState, Traversal};
use crate::domain::report::ids;
use crate::domain::schedule::DomainId;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, trace};

/// What the executor needs from a node, copied out of the tree.
struct Target {
    component: Arc<dyn Component>,
    domain: DomainId,
    imp_override: Option<Arc<dyn PhaseImp>>,
}

pub struct PhaseExecutor<'a> {
    sim: &'a Simulation,
    phase: &'a Arc<PhaseNode>,
    common: DomainId,
}

impl<'a> PhaseExecutor<'a> {
    pub fn new(sim: &'a Simulation, phase: &'a Arc<PhaseNode>) -> Self {
        Self {
            sim,
            phase,
            common: sim.common_domain(),
        }
    }

    /// Traverse the whole hierarchy for `state`.
    pub fn traverse(&self, state: PhaseState) -> Result<(), EngineError> {
        self.visit(ComponentId::ROOT, state)
    }

    fn visit(&self, id: ComponentId, state: PhaseState) -> Result<(), EngineError> {
        match self.phase.traversal {
            Traversal::TopDown => {
                self.dispatch(id, state)?;
                // Children added by the node's own dispatch are visited too
                for child in self.sim.children(id) {
                    self.visit(child, state)?;
                }
            }
            Traversal::BottomUp => {
                for child in self.sim.children(id) {
                    self.visit(child, state)?;
                }
                self.dispatch(id, state)?;
            }
        }
        Ok(())
    }

    fn target(&self, id: ComponentId) -> Option<Target> {
        self.sim.with_tree(|tree| {
            tree.get(id).map(|node| Target {
                component: node.component.clone(),
                domain: node.domain,
                imp_override: node.phase_imps.get(&self.phase.name).cloned(),
            })
        })
    }

    fn dispatch(&self, id: ComponentId, state: PhaseState) -> Result<(), EngineError> {
        let Some(target) = self.target(id) else {
            return Ok(());
        };
        if target.domain != self.phase.domain && self.phase.domain != self.common {
            return Ok(());
        }

        let ctx = PhaseContext::new(self.sim.clone(), self.phase.clone(), id);
        match state {
            PhaseState::Started => {
                self.enter_phase(id);
                target.component.phase_started(&ctx);
            }
            PhaseState::Executing => {
                let imp = target.imp_override.unwrap_or_else(|| self.phase.imp());
                match self.phase.kind {
                    PhaseKind::Function => imp.exec_func(&target.component, &ctx),
                    PhaseKind::Process => self.spawn(id, target.component, imp, ctx)?,
                }
            }
            PhaseState::ReadyToEnd => target.component.phase_ready_to_end(&ctx),
            PhaseState::Ended => {
                if let Some(sequencer) = target.component.as_sequencer() {
                    sequencer.stop_phase_sequence(&ctx);
                }
                target.component.phase_ended(&ctx);
                if self.phase.is_process() {
                    self.kill(id);
                }
                self.sim.with_tree_mut(|tree| {
                    if let Some(node) = tree.get_mut(id) {
                        node.current_phase = None;
                    }
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// Record the current phase and apply matching verbosity settings.
    fn enter_phase(&self, id: ComponentId) {
        let settings = &self.sim.config().spec.reporting.verbosity;
        self.sim.with_tree_mut(|tree| {
            let Some(node) = tree.get_mut(id) else { return };
            node.current_phase = Some(self.phase.id);
            for setting in settings {
                if setting.applies_to(&node.full_name, &self.phase.name) {
                    node.verbosity = setting.verbosity;
                }
            }
        });
    }

    fn spawn(
        &self,
        id: ComponentId,
        component: Arc<dyn Component>,
        imp: Arc<dyn PhaseImp>,
        ctx: PhaseContext,
    ) -> Result<(), EngineError> {
        let body = async move {
            if let Some(sequencer) = component.as_sequencer() {
                sequencer.start_phase_sequence(&ctx).await;
            }
            imp.exec_task(component.clone(), ctx).await;
        }
        .boxed();

        match self.sim.contexts().spawn(id, self.phase, body) {
            Ok(()) => {
                trace!(component = %self.sim.full_name(id), phase = %self.phase.name, "Spawned process context");
                Ok(())
            }
            Err(SpawnError::AlreadyRunning) => {
                let message = format!(
                    "Component '{}' already has a live context for phase '{}'",
                    self.sim.full_name(id),
                    self.phase.name
                );
                self.sim.reporter().fatal(ids::PH_DUPSPAWN, &message);
                Err(EngineError::Fatal {
                    id: ids::PH_DUPSPAWN.to_string(),
                    message,
                })
            }
        }
    }

    fn kill(&self, id: ComponentId) {
        match self.sim.contexts().kill(id, self.phase) {
            KillOutcome::Killed => {
                debug!(component = %self.sim.full_name(id), phase = %self.phase.name, "Killed process context");
            }
            KillOutcome::AlreadyFinished => {
                debug!(
                    id = ids::PH_KILLDONE,
                    component = %self.sim.full_name(id),
                    phase = %self.phase.name,
                    "Process context already finished"
                );
            }
            KillOutcome::NotFound => {}
        }
    }
}
