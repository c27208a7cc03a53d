// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domains, Schedules and the Phase Graph
//!
//! Every phase of every domain is a node of one [`PhaseGraph`]. Edges are
//! precedence constraints: a phase becomes ready once all of its predecessors
//! are `DONE`.
//!
//! ```text
//! common:  build → connect → end_of_elaboration → start_of_simulation → run → extract → check → report → final
//!                                                          │                     ↑
//! tb:                                                      └→ pre_reset → … → post_shutdown
//! ```
//!
//! A domain schedule runs in parallel with the common `run` phase: it gets
//! the predecessors of `run`, and the successors of `run` wait for its last
//! phase.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Domain registry and phase precedence graph

use crate::domain::component_tree::TreeError;
use crate::domain::objection::ObjectionFactory;
use crate::domain::phase::{PhaseId, PhaseImp, PhaseKind, PhaseNode, StandardPhase, Traversal};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

pub const COMMON_DOMAIN: &str = "common";
pub const DEFAULT_DOMAIN: &str = "tb";
pub const COMMON_SCHEDULE: &str = "common";
pub const RUNTIME_SCHEDULE: &str = "tb_sched";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(pub(crate) usize);

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown domain '{0}'")]
    UnknownDomain(String),

    #[error("Domain '{domain}' already runs schedule '{existing}'; cannot add schedule '{offered}'")]
    ScheduleConflict {
        domain: String,
        existing: String,
        offered: String,
    },

    #[error("Phase '{phase}' not found in domain '{domain}'")]
    PhaseNotFound { domain: String, phase: String },

    #[error("Schedule '{0}' defines no phases")]
    EmptySchedule(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// One phase of a schedule definition.
#[derive(Clone)]
pub struct PhaseSpec {
    pub name: String,
    pub kind: PhaseKind,
    pub traversal: Traversal,
    pub imp: Arc<dyn PhaseImp>,
}

impl PhaseSpec {
    pub fn standard(phase: StandardPhase) -> Self {
        Self {
            name: phase.name().to_string(),
            kind: phase.kind(),
            traversal: phase.traversal(),
            imp: Arc::new(phase),
        }
    }

    pub fn custom(name: impl Into<String>, kind: PhaseKind, traversal: Traversal, imp: Arc<dyn PhaseImp>) -> Self {
        Self {
            name: name.into(),
            kind,
            traversal,
            imp,
        }
    }
}

/// Ordered list of phases a domain runs, in parallel with the common `run`.
#[derive(Clone)]
pub struct ScheduleDefinition {
    pub name: String,
    pub phases: Vec<PhaseSpec>,
}

impl ScheduleDefinition {
    pub fn new(name: impl Into<String>, phases: Vec<PhaseSpec>) -> Self {
        Self {
            name: name.into(),
            phases,
        }
    }

    /// The standard runtime schedule, `pre_reset` through `post_shutdown`.
    pub fn runtime() -> Self {
        Self::new(
            RUNTIME_SCHEDULE,
            StandardPhase::RUNTIME.iter().copied().map(PhaseSpec::standard).collect(),
        )
    }

    pub fn common() -> Self {
        Self::new(
            COMMON_SCHEDULE,
            StandardPhase::COMMON.iter().copied().map(PhaseSpec::standard).collect(),
        )
    }

    /// Same phase names and kinds, in the same order.
    pub fn same_shape(&self, other: &ScheduleDefinition) -> bool {
        self.phases.len() == other.phases.len()
            && self
                .phases
                .iter()
                .zip(&other.phases)
                .all(|(a, b)| a.name == b.name && a.kind == b.kind)
    }
}

pub struct Domain {
    pub id: DomainId,
    pub name: String,
    /// Schedule attached to this domain, if any.
    pub schedule: Option<ScheduleDefinition>,
    phases: HashMap<String, PhaseId>,
}

impl Domain {
    pub fn phase(&self, name: &str) -> Option<PhaseId> {
        self.phases.get(name).copied()
    }
}

/// Result of offering a schedule to a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Phases were created and wired into the graph.
    Built,
    /// The domain already runs a schedule of that name; `matches` tells
    /// whether the offered definition has the same shape.
    Existing { matches: bool },
}

pub struct PhaseGraph {
    nodes: Vec<Arc<PhaseNode>>,
    preds: Vec<BTreeSet<PhaseId>>,
    succs: Vec<BTreeSet<PhaseId>>,
    domains: Vec<Domain>,
    domain_names: HashMap<String, DomainId>,
    objections: ObjectionFactory,
}

impl PhaseGraph {
    /// New graph holding the common domain and its linear schedule.
    pub fn new(objections: ObjectionFactory) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            domains: Vec::new(),
            domain_names: HashMap::new(),
            objections,
        };

        let common = graph.add_domain(COMMON_DOMAIN);
        let definition = ScheduleDefinition::common();
        let ids = graph.create_phases(common, &definition);
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]);
        }
        graph.domains[common.0].schedule = Some(definition);
        graph
    }

    /// Look up or create a domain.
    pub fn add_domain(&mut self, name: &str) -> DomainId {
        if let Some(id) = self.domain_names.get(name) {
            return *id;
        }
        let id = DomainId(self.domains.len());
        self.domains.push(Domain {
            id,
            name: name.to_string(),
            schedule: None,
            phases: HashMap::new(),
        });
        self.domain_names.insert(name.to_string(), id);
        id
    }

    /// Attach a schedule to `domain`, wired in parallel with the common `run`.
    pub fn add_schedule(&mut self, domain: DomainId, definition: ScheduleDefinition) -> Result<ScheduleOutcome, DomainError> {
        let target = self
            .domains
            .get(domain.0)
            .ok_or_else(|| DomainError::UnknownDomain(format!("{:?}", domain)))?;

        if let Some(existing) = &target.schedule {
            if existing.name == definition.name {
                return Ok(ScheduleOutcome::Existing {
                    matches: existing.same_shape(&definition),
                });
            }
            return Err(DomainError::ScheduleConflict {
                domain: target.name.clone(),
                existing: existing.name.clone(),
                offered: definition.name,
            });
        }

        if definition.phases.is_empty() {
            return Err(DomainError::EmptySchedule(definition.name));
        }

        self.attach_schedule(domain, definition);
        Ok(ScheduleOutcome::Built)
    }

    /// Add `name` running the standard runtime schedule. A domain that already
    /// has a schedule is returned unchanged.
    pub fn add_runtime_domain(&mut self, name: &str) -> DomainId {
        let domain = self.add_domain(name);
        if self.domains[domain.0].schedule.is_none() {
            self.attach_schedule(domain, ScheduleDefinition::runtime());
        }
        domain
    }

    fn attach_schedule(&mut self, domain: DomainId, definition: ScheduleDefinition) {
        let run = self.run_phase();
        let ids = self.create_phases(domain, &definition);
        for pair in ids.windows(2) {
            self.add_edge(pair[0], pair[1]);
        }

        if let (Some(first), Some(last)) = (ids.first().copied(), ids.last().copied()) {
            let run_preds: Vec<PhaseId> = self.preds[run.0].iter().copied().collect();
            let run_succs: Vec<PhaseId> = self.succs[run.0].iter().copied().collect();
            for pred in run_preds {
                self.add_edge(pred, first);
            }
            for succ in run_succs {
                self.add_edge(last, succ);
            }
        }

        self.domains[domain.0].schedule = Some(definition);
    }

    fn create_phases(&mut self, domain: DomainId, definition: &ScheduleDefinition) -> Vec<PhaseId> {
        let domain_name = self.domains[domain.0].name.clone();
        let mut ids = Vec::with_capacity(definition.phases.len());

        for spec in &definition.phases {
            // A domain holds at most one phase per name
            if let Some(existing) = self.domains[domain.0].phase(&spec.name) {
                ids.push(existing);
                continue;
            }

            let id = PhaseId(self.nodes.len());
            let objection = (self.objections)(&spec.name);
            self.nodes.push(Arc::new(PhaseNode::new(
                id,
                spec.name.clone(),
                spec.kind,
                spec.traversal,
                domain,
                domain_name.clone(),
                definition.name.clone(),
                spec.imp.clone(),
                objection,
            )));
            self.preds.push(BTreeSet::new());
            self.succs.push(BTreeSet::new());
            self.domains[domain.0].phases.insert(spec.name.clone(), id);
            ids.push(id);
        }
        ids
    }

    fn add_edge(&mut self, from: PhaseId, to: PhaseId) {
        if from == to {
            return;
        }
        self.succs[from.0].insert(to);
        self.preds[to.0].insert(from);
    }

    /// Make the phase `phase` of domains `a` and `b` start together and end
    /// together: each inherits the other's predecessors and successors.
    pub fn sync(&mut self, a: DomainId, b: DomainId, phase: &str) -> Result<(), DomainError> {
        let pa = self.require_phase(a, phase)?;
        let pb = self.require_phase(b, phase)?;
        if pa == pb {
            return Ok(());
        }

        let preds: Vec<PhaseId> = self.preds[pa.0].union(&self.preds[pb.0]).copied().collect();
        let succs: Vec<PhaseId> = self.succs[pa.0].union(&self.succs[pb.0]).copied().collect();
        for target in [pa, pb] {
            for pred in &preds {
                self.add_edge(*pred, target);
            }
            for succ in &succs {
                self.add_edge(target, *succ);
            }
        }
        Ok(())
    }

    fn require_phase(&self, domain: DomainId, phase: &str) -> Result<PhaseId, DomainError> {
        let d = self
            .domains
            .get(domain.0)
            .ok_or_else(|| DomainError::UnknownDomain(format!("{:?}", domain)))?;
        d.phase(phase).ok_or_else(|| DomainError::PhaseNotFound {
            domain: d.name.clone(),
            phase: phase.to_string(),
        })
    }

    pub fn common_domain(&self) -> DomainId {
        DomainId(0)
    }

    /// The common `run` phase.
    pub fn run_phase(&self) -> PhaseId {
        self.domains[0].phases[StandardPhase::Run.name()]
    }

    pub fn domain(&self, id: DomainId) -> Option<&Domain> {
        self.domains.get(id.0)
    }

    pub fn domain_by_name(&self, name: &str) -> Option<DomainId> {
        self.domain_names.get(name).copied()
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn find_phase(&self, domain: DomainId, name: &str) -> Option<Arc<PhaseNode>> {
        let id = self.domain(domain)?.phase(name)?;
        self.phase(id)
    }

    pub fn phase(&self, id: PhaseId) -> Option<Arc<PhaseNode>> {
        self.nodes.get(id.0).cloned()
    }

    pub fn phases(&self) -> &[Arc<PhaseNode>] {
        &self.nodes
    }

    pub fn preds(&self, id: PhaseId) -> Vec<PhaseId> {
        self.preds.get(id.0).map(|p| p.iter().copied().collect()).unwrap_or_default()
    }

    pub fn succs(&self, id: PhaseId) -> Vec<PhaseId> {
        self.succs.get(id.0).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
