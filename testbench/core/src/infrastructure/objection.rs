// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Counting objection backed by a `tokio::sync::watch` channel.
//!
//! The total is published on every change so any number of waiters can
//! observe it reaching zero without polling.

use crate::domain::objection::{Objection, ObjectionError, ObjectionFactory};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

pub struct PhaseObjection {
    name: String,
    total: watch::Sender<usize>,
    /// Raised count per source.
    sources: Mutex<HashMap<String, usize>>,
}

impl PhaseObjection {
    pub fn new(name: impl Into<String>) -> Self {
        let (total, _) = watch::channel(0);
        Self {
            name: name.into(),
            total,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Factory wiring one objection per phase.
    pub fn factory() -> ObjectionFactory {
        Arc::new(|phase: &str| Arc::new(PhaseObjection::new(phase)) as Arc<dyn Objection>)
    }

    /// Count raised by one source.
    pub fn source_count(&self, source: &str) -> usize {
        self.sources.lock().get(source).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Objection for PhaseObjection {
    fn name(&self) -> &str {
        &self.name
    }

    fn raise_objection(&self, source: &str, count: usize) {
        if count == 0 {
            return;
        }
        *self.sources.lock().entry(source.to_string()).or_insert(0) += count;
        self.total.send_modify(|total| *total += count);
        trace!(objection = %self.name, source = %source, count, total = self.total(), "Objection raised");
    }

    fn drop_objection(&self, source: &str, count: usize) -> Result<(), ObjectionError> {
        let raised = self.total();
        {
            let mut sources = self.sources.lock();
            if let Some(n) = sources.get_mut(source) {
                *n = n.saturating_sub(count);
                if *n == 0 {
                    sources.remove(source);
                }
            }
        }
        self.total.send_modify(|total| *total = total.saturating_sub(count));
        trace!(objection = %self.name, source = %source, count, total = self.total(), "Objection dropped");

        if count > raised {
            return Err(ObjectionError::DropBelowZero {
                objection: self.name.clone(),
                source_name: source.to_string(),
                requested: count,
                raised,
            });
        }
        Ok(())
    }

    fn total(&self) -> usize {
        *self.total.borrow()
    }

    async fn wait_for_all_dropped(&self) {
        let mut rx = self.total.subscribe();
        // The sender lives as long as self, so this only returns on zero
        let _ = rx.wait_for(|total| *total == 0).await;
    }

    fn clear(&self) {
        self.sources.lock().clear();
        self.total.send_replace(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_resolves_when_dropped() {
        let objection = Arc::new(PhaseObjection::new("main"));
        objection.raise_objection("env.agent", 2);
        assert_eq!(objection.total(), 2);
        assert_eq!(objection.source_count("env.agent"), 2);

        let waiter = {
            let objection = objection.clone();
            tokio::spawn(async move { objection.wait_for_all_dropped().await })
        };

        objection.drop_objection("env.agent", 1).unwrap();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        objection.drop_objection("env.agent", 1).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(objection.source_count("env.agent"), 0);
    }

    #[test]
    fn test_drop_below_zero_clamps() {
        let objection = PhaseObjection::new("run");
        objection.raise_objection("a", 1);

        let err = objection.drop_objection("a", 3).unwrap_err();
        assert!(matches!(err, ObjectionError::DropBelowZero { raised: 1, requested: 3, .. }));
        assert_eq!(objection.total(), 0);
    }

    #[test]
    fn test_clear_resets_sources() {
        let objection = PhaseObjection::new("run");
        objection.raise_objection("a", 1);
        objection.clear();
        assert_eq!(objection.total(), 0);
        assert_eq!(objection.source_count("a"), 0);
    }
}
