// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Concurrent contexts of process phases.
//!
//! Each (component, phase) pair runs at most one live context: a spawned
//! task racing the phase body against its cancellation token. The phase's
//! outstanding count is decremented by an RAII guard, so completion,
//! cancellation and panics all settle the count.

use crate::domain::component_tree::ComponentId;
use crate::domain::phase::{PhaseId, PhaseNode};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub type ContextKey = (ComponentId, PhaseId);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("a concurrent context for this component and phase is still running")]
    AlreadyRunning,
}

/// What [`ProcessContexts::kill`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The context was live and has been cancelled.
    Killed,
    /// The context had already returned.
    AlreadyFinished,
    /// No context was ever spawned for the pair.
    NotFound,
}

/// Settles the phase's outstanding count when the task ends, however it ends.
struct OutstandingGuard {
    phase: Arc<PhaseNode>,
    finished: Arc<AtomicBool>,
}

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::SeqCst);
        self.phase.context_finished();
    }
}

pub struct ProcessHandle {
    token: CancellationToken,
    finished: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl ProcessHandle {
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Live context handles, keyed by (component, phase).
#[derive(Default)]
pub struct ProcessContexts {
    handles: Mutex<HashMap<ContextKey, ProcessHandle>>,
}

impl ProcessContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `body` as the context of `component` for `phase`.
    pub fn spawn(
        &self,
        component: ComponentId,
        phase: &Arc<PhaseNode>,
        body: BoxFuture<'static, ()>,
    ) -> Result<(), SpawnError> {
        let key = (component, phase.id);
        let mut handles = self.handles.lock();
        if handles.get(&key).is_some_and(|h| !h.is_finished()) {
            return Err(SpawnError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        phase.context_spawned();
        let guard = OutstandingGuard {
            phase: phase.clone(),
            finished: finished.clone(),
        };

        let cancel = token.clone();
        let phase_name = phase.name.clone();
        let join = tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!(component = component.index(), phase = %phase_name, "Process context cancelled");
                }
                _ = body => {
                    trace!(component = component.index(), phase = %phase_name, "Process context returned");
                }
            }
        });

        handles.insert(key, ProcessHandle { token, finished, join });
        Ok(())
    }

    /// Force-terminate the context of `component` for `phase`, if live.
    pub fn kill(&self, component: ComponentId, phase: &PhaseNode) -> KillOutcome {
        let Some(handle) = self.handles.lock().remove(&(component, phase.id)) else {
            return KillOutcome::NotFound;
        };
        if handle.is_finished() {
            return KillOutcome::AlreadyFinished;
        }
        handle.token.cancel();
        phase.context_killed();
        KillOutcome::Killed
    }

    /// Cancel every live context. Used when a run is aborted.
    pub fn kill_all(&self) -> usize {
        let handles: Vec<ProcessHandle> = self.handles.lock().drain().map(|(_, h)| h).collect();
        let mut killed = 0;
        for handle in handles {
            if !handle.is_finished() {
                handle.token.cancel();
                handle.join.abort();
                killed += 1;
            }
        }
        killed
    }

    pub fn is_live(&self, component: ComponentId, phase: PhaseId) -> bool {
        self.handles
            .lock()
            .get(&(component, phase))
            .is_some_and(|h| !h.is_finished())
    }

    pub fn live_count(&self) -> usize {
        self.handles.lock().values().filter(|h| !h.is_finished()).count()
    }
}
