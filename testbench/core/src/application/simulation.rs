// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Simulation context
//!
//! A [`Simulation`] owns everything a testbench run shares: the factory, the
//! component tree, the phase graph of every domain, the live process
//! contexts, the reporter and the configuration. It is a cheap `Clone`
//! handle; components reach it through the [`PhaseContext`] each callback
//! receives.
//!
//! Locks are held only for the duration of a table operation and never
//! across a component callback or an `.await`.

use crate::application::factory::Factory;
use crate::application::phase_engine::{EngineError, PhaseEngine};
use crate::application::process_context::ProcessContexts;
use crate::domain::component_tree::{ComponentId, ComponentTree, TreeError};
use crate::domain::config::SimulationConfig;
use crate::domain::object::{Component, ComponentCreatable, Object};
use crate::domain::phase::{PhaseImp, PhaseNode, PhaseState};
use crate::domain::report::{ids, Reporter, Severity, Verbosity};
use crate::domain::schedule::{DomainError, DomainId, PhaseGraph, ScheduleOutcome, DEFAULT_DOMAIN};
use crate::domain::wrapper::{ComponentRegistry, ObjectWrapper};
use crate::infrastructure::objection::PhaseObjection;
use crate::infrastructure::report_bus::ReportBus;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Instance name of the test component under the root.
pub const TEST_TOP_NAME: &str = "tb_test_top";

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("The factory could not create a component of type '{0}'")]
    NotCreated(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

struct SimulationInner {
    id: Uuid,
    config: SimulationConfig,
    reporter: Arc<dyn Reporter>,
    factory: Mutex<Factory>,
    tree: RwLock<ComponentTree>,
    graph: RwLock<PhaseGraph>,
    contexts: ProcessContexts,
    default_domain: DomainId,
    abort: CancellationToken,
    fatal: Mutex<Option<EngineError>>,
}

#[derive(Clone)]
pub struct Simulation {
    inner: Arc<SimulationInner>,
}

impl Simulation {
    /// New simulation with the common domain and the default `tb` domain
    /// running the standard runtime schedule.
    pub fn new(config: SimulationConfig, reporter: Arc<dyn Reporter>) -> Self {
        let mut graph = PhaseGraph::new(PhaseObjection::factory());
        let default_domain = graph.add_runtime_domain(DEFAULT_DOMAIN);

        let tree = ComponentTree::new(default_domain, config.spec.reporting.default_verbosity);
        let id = Uuid::new_v4();
        info!(simulation_id = %id, name = %config.metadata.name, "Created simulation");

        Self {
            inner: Arc::new(SimulationInner {
                id,
                reporter: reporter.clone(),
                factory: Mutex::new(Factory::new(reporter)),
                tree: RwLock::new(tree),
                graph: RwLock::new(graph),
                contexts: ProcessContexts::new(),
                default_domain,
                abort: CancellationToken::new(),
                fatal: Mutex::new(None),
                config,
            }),
        }
    }

    /// New simulation reporting through a [`ReportBus`] sized from the config.
    pub fn with_report_bus(config: SimulationConfig) -> (Self, ReportBus) {
        let bus = ReportBus::new(config.spec.reporting.channel_capacity);
        (Self::new(config, Arc::new(bus.clone())), bus)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.inner.config
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.inner.reporter
    }

    pub(crate) fn contexts(&self) -> &ProcessContexts {
        &self.inner.contexts
    }

    // ========================================================================
    // Factory
    // ========================================================================

    /// Run `f` with exclusive access to the factory.
    pub fn with_factory<R>(&self, f: impl FnOnce(&mut Factory) -> R) -> R {
        f(&mut self.inner.factory.lock())
    }

    pub fn register(&self, wrapper: Arc<dyn ObjectWrapper>) {
        self.with_factory(|factory| factory.register(wrapper));
    }

    pub fn register_component<T: ComponentCreatable>(&self) {
        self.register(ComponentRegistry::<T>::get());
    }

    /// Apply the factory overrides listed in the configuration.
    pub fn apply_config_overrides(&self) {
        let settings = &self.inner.config.spec.factory;
        self.with_factory(|factory| {
            for ovr in &settings.type_overrides {
                factory.set_type_override_by_name(&ovr.original, &ovr.override_type, ovr.replace);
            }
            for ovr in &settings.inst_overrides {
                factory.set_inst_override_by_name(&ovr.original, &ovr.override_type, &ovr.path);
            }
        });
    }

    /// Create an object through the factory; `parent_inst_path` only scopes
    /// instance overrides.
    pub fn create_object_by_name(&self, type_name: &str, parent_inst_path: &str, name: &str) -> Option<Box<dyn Object>> {
        self.with_factory(|factory| factory.create_object_by_name(type_name, parent_inst_path, name))
    }

    pub fn create_object_by_type(
        &self,
        requested: &Arc<dyn ObjectWrapper>,
        parent_inst_path: &str,
        name: &str,
    ) -> Option<Box<dyn Object>> {
        self.with_factory(|factory| {
            if !factory.is_type_registered(requested.as_ref()) {
                factory.register(requested.clone());
            }
            factory.create_object_by_type(requested, parent_inst_path, name)
        })
    }

    /// Create a component through the factory and attach it under `parent`.
    pub fn create_component_by_name(
        &self,
        type_name: &str,
        parent: ComponentId,
        name: &str,
    ) -> Result<ComponentId, CreateError> {
        let parent_path = self.full_name(parent);
        let created = self.with_factory(|factory| factory.create_component_by_name(type_name, &parent_path, name, parent));
        let component = created.ok_or_else(|| CreateError::NotCreated(type_name.to_string()))?;
        Ok(self.add_child(parent, name, component)?)
    }

    pub fn create_component_by_type(
        &self,
        requested: &Arc<dyn ObjectWrapper>,
        parent: ComponentId,
        name: &str,
    ) -> Result<ComponentId, CreateError> {
        let parent_path = self.full_name(parent);
        let created = self.with_factory(|factory| {
            if !factory.is_type_registered(requested.as_ref()) {
                factory.register(requested.clone());
            }
            factory.create_component_by_type(requested, &parent_path, name, parent)
        });
        let component = created.ok_or_else(|| CreateError::NotCreated(requested.type_name().to_string()))?;
        Ok(self.add_child(parent, name, component)?)
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Attach an existing component. Rejections are reported and returned.
    pub fn add_child(&self, parent: ComponentId, name: &str, component: Arc<dyn Component>) -> Result<ComponentId, TreeError> {
        let result = self.inner.tree.write().add_child(parent, name, component);
        match &result {
            Ok(id) => debug!(component = %self.full_name(*id), "Attached component"),
            Err(e) => self.inner.reporter.warning(e.report_id(), &e.to_string()),
        }
        result
    }

    pub fn component(&self, id: ComponentId) -> Option<Arc<dyn Component>> {
        self.inner.tree.read().component(id)
    }

    pub fn children(&self, id: ComponentId) -> Vec<ComponentId> {
        self.inner.tree.read().children(id)
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.inner.tree.read().get(id).and_then(|n| n.parent)
    }

    pub fn full_name(&self, id: ComponentId) -> String {
        self.inner.tree.read().full_name(id)
    }

    pub fn find_component(&self, full_name: &str) -> Option<ComponentId> {
        self.inner.tree.read().find(full_name)
    }

    pub fn component_count(&self) -> usize {
        self.inner.tree.read().len()
    }

    pub fn test_top(&self) -> Option<ComponentId> {
        self.find_component(TEST_TOP_NAME)
    }

    pub fn domain_of(&self, id: ComponentId) -> Option<DomainId> {
        self.inner.tree.read().get(id).map(|n| n.domain)
    }

    pub fn verbosity_of(&self, id: ComponentId) -> Verbosity {
        self.inner
            .tree
            .read()
            .get(id)
            .map(|n| n.verbosity)
            .unwrap_or_default()
    }

    pub(crate) fn with_tree<R>(&self, f: impl FnOnce(&ComponentTree) -> R) -> R {
        f(&self.inner.tree.read())
    }

    pub(crate) fn with_tree_mut<R>(&self, f: impl FnOnce(&mut ComponentTree) -> R) -> R {
        f(&mut self.inner.tree.write())
    }

    /// Replace the body of one phase for one component.
    pub fn set_phase_imp(&self, id: ComponentId, phase_name: &str, imp: Arc<dyn PhaseImp>) -> Result<(), TreeError> {
        let mut tree = self.inner.tree.write();
        let node = tree.get_mut(id).ok_or(TreeError::UnknownComponent(id))?;
        node.phase_imps.insert(phase_name.to_string(), imp);
        Ok(())
    }

    // ========================================================================
    // Domains
    // ========================================================================

    pub fn default_domain(&self) -> DomainId {
        self.inner.default_domain
    }

    pub fn common_domain(&self) -> DomainId {
        self.inner.graph.read().common_domain()
    }

    pub fn domain_by_name(&self, name: &str) -> Option<DomainId> {
        self.inner.graph.read().domain_by_name(name)
    }

    /// Move `id` (and its subtree when `hier`) into the domain `domain_name`,
    /// creating the domain and its schedule on first use. The schedule comes
    /// from the component's `define_domain` hook.
    pub fn set_domain(&self, id: ComponentId, domain_name: &str, hier: bool) -> Result<DomainId, DomainError> {
        let component = self.component(id).ok_or(TreeError::UnknownComponent(id))?;
        let definition = component.define_domain();

        let (domain, outcome) = {
            let mut graph = self.inner.graph.write();
            let domain = graph.add_domain(domain_name);
            let outcome = graph.add_schedule(domain, definition.clone())?;
            (domain, outcome)
        };

        if let ScheduleOutcome::Existing { matches } = outcome {
            let offered = if matches { "duplicate" } else { "differing" };
            self.inner.reporter.warning(
                ids::PH_DUPSCHED,
                &format!(
                    "Domain '{}' already runs schedule '{}'; the {} definition offered by '{}' is discarded",
                    domain_name,
                    definition.name,
                    offered,
                    self.full_name(id)
                ),
            );
        }

        self.inner.tree.write().set_domain(id, domain, hier)?;
        debug!(component = %self.full_name(id), domain = %domain_name, hier, "Assigned domain");
        Ok(domain)
    }

    /// Make `phase` of the two named domains start and end together.
    pub fn sync_domains(&self, a: &str, b: &str, phase: &str) -> Result<(), DomainError> {
        let mut graph = self.inner.graph.write();
        let da = graph.domain_by_name(a).ok_or_else(|| DomainError::UnknownDomain(a.to_string()))?;
        let db = graph.domain_by_name(b).ok_or_else(|| DomainError::UnknownDomain(b.to_string()))?;
        graph.sync(da, db, phase)
    }

    pub fn find_phase(&self, domain_name: &str, phase_name: &str) -> Option<Arc<PhaseNode>> {
        let graph = self.inner.graph.read();
        let domain = graph.domain_by_name(domain_name)?;
        graph.find_phase(domain, phase_name)
    }

    pub fn phase_state(&self, domain_name: &str, phase_name: &str) -> Option<PhaseState> {
        self.find_phase(domain_name, phase_name).map(|p| p.state())
    }

    pub(crate) fn with_graph<R>(&self, f: impl FnOnce(&PhaseGraph) -> R) -> R {
        f(&self.inner.graph.read())
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Create the test `type_name` under the root and run every phase.
    pub async fn run_test(&self, type_name: &str) -> Result<ComponentId, EngineError> {
        self.apply_config_overrides();

        let top = match self.create_component_by_name(type_name, ComponentId::ROOT, TEST_TOP_NAME) {
            Ok(top) => top,
            Err(e) => {
                self.inner.reporter.fatal(
                    ids::INVTST,
                    &format!("Requested test '{}' could not be created: {}", type_name, e),
                );
                return Err(EngineError::TestNotCreated(type_name.to_string()));
            }
        };
        info!(simulation_id = %self.id(), test = %type_name, "Running test");

        if self.inner.config.spec.factory.print {
            self.with_factory(|factory| factory.print(Default::default()));
        }

        self.run_phases().await?;
        Ok(top)
    }

    /// Run every phase of every domain to completion.
    pub async fn run_phases(&self) -> Result<(), EngineError> {
        PhaseEngine::new(self.clone()).run().await
    }

    /// Abort the run with `error`. Only the first abort reason is kept.
    pub fn abort(&self, error: EngineError) {
        {
            let mut fatal = self.inner.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(error);
            }
        }
        self.inner.abort.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.abort.is_cancelled()
    }

    pub(crate) fn abort_token(&self) -> CancellationToken {
        self.inner.abort.clone()
    }

    pub(crate) fn take_abort_reason(&self) -> Option<EngineError> {
        self.inner.fatal.lock().take()
    }
}

/// What a component callback receives: the phase being executed, the
/// component it is executed for and the simulation they belong to.
#[derive(Clone)]
pub struct PhaseContext {
    sim: Simulation,
    phase: Arc<PhaseNode>,
    component: ComponentId,
}

impl PhaseContext {
    pub fn new(sim: Simulation, phase: Arc<PhaseNode>, component: ComponentId) -> Self {
        Self { sim, phase, component }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn phase(&self) -> &Arc<PhaseNode> {
        &self.phase
    }

    pub fn phase_name(&self) -> &str {
        &self.phase.name
    }

    pub fn state(&self) -> PhaseState {
        self.phase.state()
    }

    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    pub fn full_name(&self) -> String {
        self.sim.full_name(self.component)
    }

    pub fn raise_objection(&self, count: usize) {
        self.phase.objection().raise_objection(&self.full_name(), count);
    }

    pub fn drop_objection(&self, count: usize) {
        if let Err(e) = self.phase.objection().drop_objection(&self.full_name(), count) {
            self.error(ids::OBJTN_ZERO, &e.to_string());
        }
    }

    /// Create a child of this component by type name.
    pub fn create_component(&self, type_name: &str, name: &str) -> Result<ComponentId, CreateError> {
        self.sim.create_component_by_name(type_name, self.component, name)
    }

    /// Create a child of this component by type.
    pub fn create<T: ComponentCreatable>(&self, name: &str) -> Result<ComponentId, CreateError> {
        self.sim
            .create_component_by_type(&ComponentRegistry::<T>::get(), self.component, name)
    }

    /// Create an object scoped under this component's path.
    pub fn create_object(&self, type_name: &str, name: &str) -> Option<Box<dyn Object>> {
        self.sim.create_object_by_name(type_name, &self.full_name(), name)
    }

    pub fn add_child(&self, name: &str, component: Arc<dyn Component>) -> Result<ComponentId, TreeError> {
        self.sim.add_child(self.component, name, component)
    }

    pub fn verbosity(&self) -> Verbosity {
        self.sim.verbosity_of(self.component)
    }

    /// Informational report, emitted only when `verbosity` is within this
    /// component's current threshold.
    pub fn info(&self, id: &str, message: &str, verbosity: Verbosity) {
        if verbosity <= self.verbosity() {
            self.sim.reporter().report(Severity::Info, id, message, &self.full_name());
        }
    }

    pub fn warning(&self, id: &str, message: &str) {
        self.sim.reporter().report(Severity::Warning, id, message, &self.full_name());
    }

    pub fn error(&self, id: &str, message: &str) {
        self.sim.reporter().report(Severity::Error, id, message, &self.full_name());
    }

    /// Report a fatal condition and abort the run.
    pub fn fatal(&self, id: &str, message: &str) {
        self.sim.reporter().report(Severity::Fatal, id, message, &self.full_name());
        self.sim.abort(EngineError::Fatal {
            id: id.to_string(),
            message: message.to_string(),
        });
    }
}
