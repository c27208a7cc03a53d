// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use testbench_core::application::simulation::PhaseContext;
use testbench_core::domain::object::{Component, ComponentCreatable, Object};
use testbench_core::domain::report::Verbosity;

use super::agents::{LoopbackDriver, LoopbackMonitor};
use super::packet::Packet;
use super::REPORT_ID;

/// Expected packets in send order, checked against what the monitor sees.
#[derive(Default)]
pub struct Scoreboard {
    expected: Mutex<VecDeque<Packet>>,
    matched: AtomicUsize,
    mismatches: Mutex<Vec<String>>,
    drained: Notify,
}

impl Scoreboard {
    pub fn expect(&self, packet: Packet) {
        self.expected.lock().push_back(packet);
    }

    /// Compare an observed packet with the oldest expected one. Returns
    /// whether they matched.
    pub fn observe(&self, packet: &Packet) -> bool {
        let (expected, now_empty) = {
            let mut queue = self.expected.lock();
            let expected = queue.pop_front();
            (expected, queue.is_empty())
        };

        let matched = match expected {
            Some(expected) if expected == *packet => {
                self.matched.fetch_add(1, Ordering::SeqCst);
                true
            }
            Some(expected) => {
                self.mismatches.lock().push(format!(
                    "{}: expected {:02x?}, observed {:02x?}",
                    expected.name(),
                    expected.payload,
                    packet.payload
                ));
                false
            }
            None => {
                self.mismatches
                    .lock()
                    .push(format!("unexpected packet {:02x?}", packet.payload));
                false
            }
        };

        if now_empty {
            self.drained.notify_waiters();
        }
        matched
    }

    pub fn pending(&self) -> usize {
        self.expected.lock().len()
    }

    pub fn matched(&self) -> usize {
        self.matched.load(Ordering::SeqCst)
    }

    pub fn mismatches(&self) -> Vec<String> {
        self.mismatches.lock().clone()
    }

    /// Resolves once every expected packet has been observed.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Owns the loopback link and the scoreboard shared by its agents.
pub struct LoopbackEnv {
    tx: mpsc::UnboundedSender<Packet>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Packet>>>,
    scoreboard: Arc<Scoreboard>,
}

impl LoopbackEnv {
    pub fn sender(&self) -> mpsc::UnboundedSender<Packet> {
        self.tx.clone()
    }

    /// The receiving end; handed out once.
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<Packet>> {
        self.rx.lock().take()
    }

    pub fn scoreboard(&self) -> Arc<Scoreboard> {
        self.scoreboard.clone()
    }
}

/// Run `f` against the `LoopbackEnv` that is the parent of the phase's component.
pub(crate) fn with_parent_env<R>(phase: &PhaseContext, f: impl FnOnce(&LoopbackEnv) -> R) -> Option<R> {
    let sim = phase.simulation();
    let parent = sim.parent(phase.component_id())?;
    let component = sim.component(parent)?;
    component.as_any().downcast_ref::<LoopbackEnv>().map(f)
}

impl Component for LoopbackEnv {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn build_phase(&self, phase: &PhaseContext) {
        for (type_name, name) in [
            (LoopbackDriver::TYPE_NAME, "driver"),
            (LoopbackMonitor::TYPE_NAME, "monitor"),
        ] {
            if let Err(e) = phase.create_component(type_name, name) {
                phase.fatal(REPORT_ID, &format!("Failed to build {}: {}", name, e));
                return;
            }
        }
    }

    fn check_phase(&self, phase: &PhaseContext) {
        for mismatch in self.scoreboard.mismatches() {
            phase.error(REPORT_ID, &mismatch);
        }
        let pending = self.scoreboard.pending();
        if pending > 0 {
            phase.error(REPORT_ID, &format!("{} packet(s) were sent but never observed", pending));
        }
    }

    fn report_phase(&self, phase: &PhaseContext) {
        phase.info(
            REPORT_ID,
            &format!(
                "{} packet(s) matched, {} mismatched",
                self.scoreboard.matched(),
                self.scoreboard.mismatches().len()
            ),
            Verbosity::Low,
        );
    }
}

impl ComponentCreatable for LoopbackEnv {
    const TYPE_NAME: &'static str = "loopback_env";

    fn new(_name: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            scoreboard: Arc::new(Scoreboard::default()),
        }
    }
}

/// Top-level test: builds one loopback environment.
pub struct LoopbackTest;

impl Component for LoopbackTest {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn build_phase(&self, phase: &PhaseContext) {
        if let Err(e) = phase.create_component(LoopbackEnv::TYPE_NAME, "env") {
            phase.fatal(REPORT_ID, &format!("Failed to build env: {}", e));
        }
    }

    fn end_of_elaboration_phase(&self, phase: &PhaseContext) {
        phase.info(
            REPORT_ID,
            &format!("Hierarchy built with {} component(s)", phase.simulation().component_count()),
            Verbosity::Medium,
        );
    }
}

impl ComponentCreatable for LoopbackTest {
    const TYPE_NAME: &'static str = "loopback_test";

    fn new(_name: &str) -> Self {
        LoopbackTest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testbench_core::domain::object::ObjectCreatable;

    #[tokio::test]
    async fn test_scoreboard_matches_in_order() {
        let scoreboard = Scoreboard::default();
        let first = Packet::new("pkt0");
        let second = Packet::new("pkt1");
        scoreboard.expect(first.clone());
        scoreboard.expect(second.clone());

        assert!(scoreboard.observe(&first));
        assert!(!scoreboard.observe(&second.corrupted()));
        scoreboard.wait_drained().await;

        assert_eq!(scoreboard.matched(), 1);
        assert_eq!(scoreboard.mismatches().len(), 1);
        assert!(scoreboard.mismatches()[0].starts_with("pkt1"));
    }

    #[test]
    fn test_unexpected_packet_is_a_mismatch() {
        let scoreboard = Scoreboard::default();
        assert!(!scoreboard.observe(&Packet::new("stray")));
        assert_eq!(scoreboard.pending(), 0);
        assert!(scoreboard.mismatches()[0].starts_with("unexpected"));
    }
}
