// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Report Bus Implementation - Reporter backed by tracing and a broadcast channel
//
// Every report is logged through `tracing`, counted by severity and id, and
// broadcast to subscribers (CLI, tests, scoreboards).
//
// Reports are in-memory only; a lagging subscriber loses the oldest events.

use crate::domain::report::{ReportEvent, Reporter, Severity};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Report totals, by severity and by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportCounts {
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_id: BTreeMap<String, usize>,
}

impl ReportCounts {
    pub fn severity(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn id(&self, id: &str) -> usize {
        self.by_id.get(id).copied().unwrap_or(0)
    }

    /// Errors and fatals reported so far.
    pub fn failures(&self) -> usize {
        self.severity(Severity::Error) + self.severity(Severity::Fatal)
    }

    /// End-of-test summary text.
    pub fn summary(&self) -> String {
        let mut out = String::from("\n--- Report Summary ---\n\n** Report counts by severity\n");
        for severity in [Severity::Info, Severity::Warning, Severity::Error, Severity::Fatal] {
            let _ = writeln!(out, "{} : {}", severity, self.severity(severity));
        }
        if !self.by_id.is_empty() {
            out.push_str("** Report counts by id\n");
            for (id, count) in &self.by_id {
                let _ = writeln!(out, "[{}] {}", id, count);
            }
        }
        out
    }
}

/// Reporter that logs, counts and broadcasts every report.
#[derive(Clone)]
pub struct ReportBus {
    sender: Arc<broadcast::Sender<ReportEvent>>,
    counts: Arc<Mutex<ReportCounts>>,
}

impl ReportBus {
    /// Create a report bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
            counts: Arc::new(Mutex::new(ReportCounts::default())),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1024)
    }

    pub fn subscribe(&self) -> ReportReceiver {
        ReportReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn counts(&self) -> ReportCounts {
        self.counts.lock().clone()
    }

    pub fn reset_counts(&self) {
        *self.counts.lock() = ReportCounts::default();
    }
}

impl Default for ReportBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl Reporter for ReportBus {
    fn report(&self, severity: Severity, id: &str, message: &str, context: &str) {
        match severity {
            Severity::Info => info!(id = %id, context = %context, "{}", message),
            Severity::Warning => warn!(id = %id, context = %context, "{}", message),
            Severity::Error | Severity::Fatal => error!(id = %id, context = %context, severity = %severity, "{}", message),
        }

        {
            let mut counts = self.counts.lock();
            *counts.by_severity.entry(severity).or_insert(0) += 1;
            *counts.by_id.entry(id.to_string()).or_insert(0) += 1;
        }

        let event = ReportEvent {
            severity,
            id: id.to_string(),
            message: message.to_string(),
            context: context.to_string(),
            reported_at: Utc::now(),
        };
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to report");
        }
    }
}

/// Receiver for broadcast reports
pub struct ReportReceiver {
    receiver: broadcast::Receiver<ReportEvent>,
}

impl ReportReceiver {
    /// Receive the next report (waits until one is available)
    pub async fn recv(&mut self) -> Result<ReportEvent, ReportBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => ReportBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Report receiver lagged by {} events", n);
                ReportBusError::Lagged(n)
            }
        })
    }

    /// Try to receive a report without waiting
    pub fn try_recv(&mut self) -> Result<ReportEvent, ReportBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => ReportBusError::Empty,
            broadcast::error::TryRecvError::Closed => ReportBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Report receiver lagged by {} events", n);
                ReportBusError::Lagged(n)
            }
        })
    }

    /// Drain every report currently buffered.
    pub fn drain(&mut self) -> Vec<ReportEvent> {
        let mut out = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => out.push(event),
                Err(ReportBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportBusError {
    #[error("Report bus is closed")]
    Closed,

    #[error("No reports available")]
    Empty,

    #[error("Receiver lagged by {0} reports (reports were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::ids;

    #[tokio::test]
    async fn test_report_publish_subscribe() {
        let bus = ReportBus::new(10);
        let mut receiver = bus.subscribe();

        bus.warning(ids::TPRGED, "already registered");

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.severity, Severity::Warning);
        assert_eq!(event.id, ids::TPRGED);
        assert_eq!(event.message, "already registered");
    }

    #[test]
    fn test_counts_by_severity_and_id() {
        let bus = ReportBus::new(4);
        bus.warning(ids::BDTYP, "a");
        bus.warning(ids::BDTYP, "b");
        bus.error(ids::OVRDLOOP, "c");

        let counts = bus.counts();
        assert_eq!(counts.severity(Severity::Warning), 2);
        assert_eq!(counts.id(ids::BDTYP), 2);
        assert_eq!(counts.failures(), 1);
        assert!(counts.summary().contains("[OVRDLOOP] 1"));

        bus.reset_counts();
        assert_eq!(bus.counts(), ReportCounts::default());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = ReportBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.info(ids::FACTORY, "table");

        assert_eq!(first.drain().len(), 1);
        assert_eq!(second.recv().await.unwrap().id, ids::FACTORY);
    }
}
