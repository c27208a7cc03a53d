// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use testbench_core::application::simulation::PhaseContext;
use testbench_core::domain::object::{Component, ComponentCreatable, ObjectCreatable};
use testbench_core::domain::report::Verbosity;

use super::env::{with_parent_env, Scoreboard};
use super::packet::Packet;
use super::REPORT_ID;

/// Packets each driver sends during `main`.
pub const PACKETS: usize = 8;

/// How long a driver waits for the monitor to catch up before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone)]
struct DriverLink {
    tx: mpsc::UnboundedSender<Packet>,
    scoreboard: Arc<Scoreboard>,
}

/// Shared body of the clean and the error-injecting driver.
struct DriverCore {
    link: Mutex<Option<DriverLink>>,
    /// Corrupt every n-th packet on the wire.
    corrupt_every: Option<usize>,
}

impl DriverCore {
    fn new(corrupt_every: Option<usize>) -> Self {
        Self {
            link: Mutex::new(None),
            corrupt_every,
        }
    }

    fn connect(&self, phase: &PhaseContext) {
        let link = with_parent_env(phase, |env| DriverLink {
            tx: env.sender(),
            scoreboard: env.scoreboard(),
        });
        match link {
            Some(link) => *self.link.lock() = Some(link),
            None => phase.error(REPORT_ID, "Driver is not placed under a loopback env"),
        }
    }

    async fn drive(&self, phase: &PhaseContext) {
        let link = self.link.lock().clone();
        let Some(link) = link else {
            phase.error(REPORT_ID, "Driver was never connected");
            return;
        };

        phase.raise_objection(1);
        for i in 0..PACKETS {
            let name = format!("pkt{}", i);
            let Some(packet) = self.create_packet(phase, &name) else {
                phase.error(REPORT_ID, &format!("Factory did not produce a packet for '{}'", name));
                continue;
            };
            link.scoreboard.expect(packet.clone());

            let on_wire = match self.corrupt_every {
                Some(n) if (i + 1) % n == 0 => packet.corrupted(),
                _ => packet,
            };
            if link.tx.send(on_wire).is_err() {
                phase.error(REPORT_ID, "Loopback link closed while driving");
                break;
            }
            phase.info(REPORT_ID, &format!("Sent {}", name), Verbosity::High);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        if tokio::time::timeout(DRAIN_TIMEOUT, link.scoreboard.wait_drained())
            .await
            .is_err()
        {
            phase.warning(
                REPORT_ID,
                &format!("{} packet(s) still in flight after {:?}", link.scoreboard.pending(), DRAIN_TIMEOUT),
            );
        }
        phase.drop_objection(1);
    }

    fn create_packet(&self, phase: &PhaseContext, name: &str) -> Option<Packet> {
        let object = phase.create_object(Packet::TYPE_NAME, name)?;
        object.as_any().downcast_ref::<Packet>().cloned()
    }
}

/// Drives every packet unchanged.
pub struct LoopbackDriver {
    core: DriverCore,
}

#[async_trait]
impl Component for LoopbackDriver {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn connect_phase(&self, phase: &PhaseContext) {
        self.core.connect(phase);
    }

    async fn main_phase(&self, phase: PhaseContext) {
        self.core.drive(&phase).await;
    }
}

impl ComponentCreatable for LoopbackDriver {
    const TYPE_NAME: &'static str = "loopback_driver";

    fn new(_name: &str) -> Self {
        Self {
            core: DriverCore::new(None),
        }
    }
}

/// Override for `loopback_driver` that corrupts every third packet.
pub struct ErrorInjectingDriver {
    core: DriverCore,
}

#[async_trait]
impl Component for ErrorInjectingDriver {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn connect_phase(&self, phase: &PhaseContext) {
        self.core.connect(phase);
    }

    async fn main_phase(&self, phase: PhaseContext) {
        phase.info(REPORT_ID, "Injecting errors on every third packet", Verbosity::Low);
        self.core.drive(&phase).await;
    }
}

impl ComponentCreatable for ErrorInjectingDriver {
    const TYPE_NAME: &'static str = "loopback_error_driver";

    fn new(_name: &str) -> Self {
        Self {
            core: DriverCore::new(Some(3)),
        }
    }
}

struct MonitorLink {
    rx: mpsc::UnboundedReceiver<Packet>,
    scoreboard: Arc<Scoreboard>,
}

/// Observes the far end of the link for the whole `run` phase.
pub struct LoopbackMonitor {
    link: Mutex<Option<MonitorLink>>,
}

#[async_trait]
impl Component for LoopbackMonitor {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn connect_phase(&self, phase: &PhaseContext) {
        let link = with_parent_env(phase, |env| {
            env.take_receiver().map(|rx| MonitorLink {
                rx,
                scoreboard: env.scoreboard(),
            })
        });
        match link {
            Some(Some(link)) => *self.link.lock() = Some(link),
            Some(None) => phase.error(REPORT_ID, "Loopback receiver already claimed by another monitor"),
            None => phase.error(REPORT_ID, "Monitor is not placed under a loopback env"),
        }
    }

    async fn run_phase(&self, phase: PhaseContext) {
        let link = self.link.lock().take();
        let Some(mut link) = link else {
            return;
        };
        // Ends when the phase is over and this context is killed
        while let Some(packet) = link.rx.recv().await {
            let verdict = if link.scoreboard.observe(&packet) {
                "matched"
            } else {
                "MISMATCHED"
            };
            phase.info(
                REPORT_ID,
                &format!("Observed {:02x?}: {}", packet.payload, verdict),
                Verbosity::High,
            );
        }
    }
}

impl ComponentCreatable for LoopbackMonitor {
    const TYPE_NAME: &'static str = "loopback_monitor";

    fn new(_name: &str) -> Self {
        Self {
            link: Mutex::new(None),
        }
    }
}
