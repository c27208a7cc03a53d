// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Phase engine behaviour over small component hierarchies.
//!
//! Components record what they observe into a shared log; assertions are made
//! on the log, on phase bookkeeping and on the reports emitted.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use testbench_core::application::phase_engine::EngineError;
use testbench_core::application::simulation::{PhaseContext, Simulation, TEST_TOP_NAME};
use testbench_core::domain::component_tree::{ComponentId, TreeError};
use testbench_core::domain::config::{SimulationConfig, VerbositySetting};
use testbench_core::domain::object::{Component, ComponentCreatable, Sequencer};
use testbench_core::domain::phase::{PhaseImp, PhaseKind, PhaseState, Traversal};
use testbench_core::domain::report::{ids, ReportEvent, Severity, Verbosity};
use testbench_core::domain::schedule::{DomainError, PhaseSpec, ScheduleDefinition};
use testbench_core::infrastructure::report_bus::ReportBus;

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

fn position(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("'{}' not found in {:?}", entry, log))
}

fn simulation() -> (Simulation, ReportBus) {
    Simulation::with_report_bus(SimulationConfig::default())
}

/// Records `run` and `main` bodies and the end of `run`.
struct Recorder {
    log: Log,
}

#[async_trait]
impl Component for Recorder {
    fn type_name(&self) -> &'static str {
        "recorder"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn run_phase(&self, phase: PhaseContext) {
        self.log.lock().push(format!("run:{}", phase.full_name()));
    }

    async fn main_phase(&self, phase: PhaseContext) {
        self.log
            .lock()
            .push(format!("main:{}:{}", phase.full_name(), phase.phase().domain_name));
    }

    fn phase_ended(&self, phase: &PhaseContext) {
        if phase.phase_name() == "run" {
            self.log.lock().push(format!("ended:{}", phase.full_name()));
        }
    }
}

/// `run` body that never returns on its own.
struct Hanging {
    log: Log,
}

#[async_trait]
impl Component for Hanging {
    fn type_name(&self) -> &'static str {
        "hanging"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn run_phase(&self, phase: PhaseContext) {
        self.log.lock().push(format!("run:{}", phase.full_name()));
        std::future::pending::<()>().await;
        self.log.lock().push("unreachable".to_string());
    }

    fn phase_ended(&self, phase: &PhaseContext) {
        if phase.phase_name() == "run" {
            self.log.lock().push(format!("ended:{}", phase.full_name()));
        }
    }
}

struct Quiet;

impl Component for Quiet {
    fn type_name(&self) -> &'static str {
        "quiet"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tokio::test]
async fn test_immediate_process_bodies_leave_nothing_outstanding() {
    let (sim, bus) = simulation();
    let log = new_log();
    for i in 0..5 {
        sim.add_child(ComponentId::ROOT, &format!("c{}", i), Arc::new(Recorder { log: log.clone() }))
            .unwrap();
    }

    sim.run_phases().await.unwrap();

    let run = sim.find_phase("common", "run").unwrap();
    assert_eq!(run.state(), PhaseState::Done);
    assert_eq!(run.outstanding(), 0);
    assert_eq!(run.killed(), 0);
    assert_eq!(sim.phase_state("tb", "post_shutdown"), Some(PhaseState::Done));
    assert_eq!(sim.phase_state("common", "final"), Some(PhaseState::Done));

    let log = entries(&log);
    assert_eq!(log.iter().filter(|e| e.starts_with("run:")).count(), 5);
    assert_eq!(log.iter().filter(|e| e.starts_with("main:")).count(), 5);
    assert_eq!(bus.counts().failures(), 0);
}

#[tokio::test]
async fn test_pending_context_is_killed_when_phase_ends() {
    let (sim, _bus) = simulation();
    let log = new_log();
    let top = sim
        .add_child(ComponentId::ROOT, "top", Arc::new(Recorder { log: log.clone() }))
        .unwrap();
    let mid = sim.add_child(top, "mid", Arc::new(Recorder { log: log.clone() })).unwrap();
    sim.add_child(mid, "leaf", Arc::new(Hanging { log: log.clone() })).unwrap();

    sim.run_phases().await.unwrap();

    let run = sim.find_phase("common", "run").unwrap();
    assert_eq!(run.killed(), 1);
    assert_eq!(run.outstanding(), 0);

    let log = entries(&log);
    assert!(log.contains(&"run:top.mid.leaf".to_string()));
    assert!(!log.contains(&"unreachable".to_string()));
    for name in ["top", "top.mid", "top.mid.leaf"] {
        assert!(log.contains(&format!("ended:{}", name)), "phase_ended missing for {}", name);
    }
    // Bottom-up traversal of `run` at ENDED
    assert!(position(&log, "ended:top.mid.leaf") < position(&log, "ended:top"));
}

#[tokio::test]
async fn test_child_names_are_unique_per_parent() {
    let (sim, bus) = simulation();
    let first: Arc<dyn Component> = Arc::new(Quiet);
    let id = sim.add_child(ComponentId::ROOT, "env", first.clone()).unwrap();

    assert_eq!(sim.add_child(ComponentId::ROOT, "env", first.clone()).unwrap(), id);

    let err = sim.add_child(ComponentId::ROOT, "env", Arc::new(Quiet)).unwrap_err();
    assert!(matches!(err, TreeError::NameCollision { .. }));

    let err = sim.add_child(ComponentId::ROOT, "other", first).unwrap_err();
    assert!(matches!(err, TreeError::AlreadyChild { .. }));

    let err = sim.add_child(ComponentId::ROOT, "a.b", Arc::new(Quiet)).unwrap_err();
    assert!(matches!(err, TreeError::InvalidName(_)));

    assert_eq!(bus.counts().id(ids::BDCLD), 1);
    assert_eq!(bus.counts().id(ids::BDCHLD), 1);
    assert_eq!(bus.counts().id(ids::INVCHR), 1);
    assert_eq!(sim.children(ComponentId::ROOT), vec![id]);
}

// ============================================================================
// Hierarchy built from a test through the factory
// ============================================================================

const TRACE: &str = "TRACE";

struct TestTop;
struct Env;
struct Agent;

fn trace(phase: &PhaseContext) {
    phase.info(TRACE, &format!("{}:{}", phase.phase_name(), phase.full_name()), Verbosity::Medium);
}

impl Component for TestTop {
    fn type_name(&self) -> &'static str {
        "test_top"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn build_phase(&self, phase: &PhaseContext) {
        trace(phase);
        phase.create::<Env>("env").unwrap();
    }

    fn connect_phase(&self, phase: &PhaseContext) {
        trace(phase);
    }
}

impl ComponentCreatable for TestTop {
    const TYPE_NAME: &'static str = "test_top";
    fn new(_name: &str) -> Self {
        TestTop
    }
}

impl Component for Env {
    fn type_name(&self) -> &'static str {
        "env"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn build_phase(&self, phase: &PhaseContext) {
        trace(phase);
        phase.create_component("agent", "agent").unwrap();
    }

    fn connect_phase(&self, phase: &PhaseContext) {
        trace(phase);
    }
}

impl ComponentCreatable for Env {
    const TYPE_NAME: &'static str = "env";
    fn new(_name: &str) -> Self {
        Env
    }
}

impl Component for Agent {
    fn type_name(&self) -> &'static str {
        "agent"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn build_phase(&self, phase: &PhaseContext) {
        trace(phase);
    }

    fn connect_phase(&self, phase: &PhaseContext) {
        trace(phase);
    }
}

impl ComponentCreatable for Agent {
    const TYPE_NAME: &'static str = "agent";
    fn new(_name: &str) -> Self {
        Agent
    }
}

fn traced(bus_events: Vec<ReportEvent>, phase: &str) -> Vec<String> {
    let prefix = format!("{}:", phase);
    bus_events
        .into_iter()
        .filter(|e| e.id == TRACE)
        .filter_map(|e| e.message.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_build_creates_children_top_down() {
    let (sim, bus) = simulation();
    sim.register_component::<TestTop>();
    sim.register_component::<Agent>();
    let mut reports = bus.subscribe();

    let top = sim.run_test("test_top").await.unwrap();

    assert_eq!(sim.full_name(top), TEST_TOP_NAME);
    assert_eq!(sim.test_top(), Some(top));
    assert!(sim.find_component("tb_test_top.env.agent").is_some());

    let events = reports.drain();
    assert_eq!(
        traced(events.clone(), "build"),
        vec!["tb_test_top", "tb_test_top.env", "tb_test_top.env.agent"]
    );
    assert_eq!(
        traced(events, "connect"),
        vec!["tb_test_top.env.agent", "tb_test_top.env", "tb_test_top"]
    );
}

#[tokio::test]
async fn test_verbosity_settings_apply_when_phase_starts() {
    let mut config = SimulationConfig::default();
    config.spec.reporting.verbosity.push(VerbositySetting {
        component: "*.env".to_string(),
        phase: Some("connect".to_string()),
        verbosity: Verbosity::Low,
    });
    let (sim, bus) = Simulation::with_report_bus(config);
    sim.register_component::<TestTop>();
    sim.register_component::<Agent>();
    let mut reports = bus.subscribe();

    sim.run_test("test_top").await.unwrap();

    let events = reports.drain();
    assert_eq!(traced(events.clone(), "build").len(), 3);
    assert_eq!(
        traced(events, "connect"),
        vec!["tb_test_top.env.agent", "tb_test_top"]
    );
}

#[tokio::test]
async fn test_run_test_with_unknown_type() {
    let (sim, bus) = simulation();

    let err = sim.run_test("no_such_test").await.unwrap_err();

    assert!(matches!(err, EngineError::TestNotCreated(ref name) if name == "no_such_test"));
    assert_eq!(bus.counts().id(ids::INVTST), 1);
    assert_eq!(bus.counts().severity(Severity::Fatal), 1);
    assert_eq!(sim.phase_state("common", "build"), Some(PhaseState::Dormant));
}

// ============================================================================
// Domains and schedules
// ============================================================================

#[tokio::test]
async fn test_runtime_phases_only_reach_their_domain() {
    let (sim, _bus) = simulation();
    let log = new_log();
    sim.add_child(ComponentId::ROOT, "a", Arc::new(Recorder { log: log.clone() }))
        .unwrap();
    let b = sim
        .add_child(ComponentId::ROOT, "b", Arc::new(Recorder { log: log.clone() }))
        .unwrap();

    let alt = sim.set_domain(b, "alt", false).unwrap();
    assert_eq!(sim.domain_of(b), Some(alt));
    assert_ne!(alt, sim.default_domain());

    sim.run_phases().await.unwrap();

    let log = entries(&log);
    assert!(log.contains(&"main:a:tb".to_string()));
    assert!(log.contains(&"main:b:alt".to_string()));
    assert!(!log.contains(&"main:b:tb".to_string()));
    assert!(!log.contains(&"main:a:alt".to_string()));
    // Common phases reach every domain
    assert!(log.contains(&"run:a".to_string()));
    assert!(log.contains(&"run:b".to_string()));
    assert_eq!(sim.phase_state("alt", "main"), Some(PhaseState::Done));
}

#[tokio::test]
async fn test_repeated_schedule_offer_is_discarded_with_warning() {
    let (sim, bus) = simulation();
    let log = new_log();
    let first = sim
        .add_child(ComponentId::ROOT, "first", Arc::new(Recorder { log: log.clone() }))
        .unwrap();
    let second = sim
        .add_child(ComponentId::ROOT, "second", Arc::new(Recorder { log: log.clone() }))
        .unwrap();

    let user = sim.set_domain(first, "user", false).unwrap();
    let main = sim.find_phase("user", "main").unwrap();
    assert_eq!(bus.counts().id(ids::PH_DUPSCHED), 0);

    // Identical definition: the existing schedule is kept
    assert_eq!(sim.set_domain(second, "user", false).unwrap(), user);
    assert_eq!(bus.counts().id(ids::PH_DUPSCHED), 1);
    assert!(Arc::ptr_eq(&main, &sim.find_phase("user", "main").unwrap()));

    sim.run_phases().await.unwrap();

    let log = entries(&log);
    assert!(log.contains(&"main:first:user".to_string()));
    assert!(log.contains(&"main:second:user".to_string()));
}

struct StepImp {
    log: Log,
}

#[async_trait]
impl PhaseImp for StepImp {
    fn exec_func(&self, _component: &Arc<dyn Component>, phase: &PhaseContext) {
        self.log
            .lock()
            .push(format!("{}:{}", phase.phase_name(), phase.full_name()));
    }
}

/// Component whose domain runs a custom schedule of function phases.
struct Calibrated {
    log: Log,
    schedule: &'static str,
    phases: &'static [&'static str],
}

impl Component for Calibrated {
    fn type_name(&self) -> &'static str {
        "calibrated"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn define_domain(&self) -> ScheduleDefinition {
        let phases = self
            .phases
            .iter()
            .map(|name| {
                PhaseSpec::custom(
                    *name,
                    PhaseKind::Function,
                    Traversal::TopDown,
                    Arc::new(StepImp { log: self.log.clone() }),
                )
            })
            .collect();
        ScheduleDefinition::new(self.schedule, phases)
    }
}

#[tokio::test]
async fn test_custom_schedule_runs_in_order() {
    let (sim, bus) = simulation();
    let log = new_log();
    let unit = sim
        .add_child(
            ComponentId::ROOT,
            "dsp",
            Arc::new(Calibrated {
                log: log.clone(),
                schedule: "dsp_sched",
                phases: &["calibrate", "settle"],
            }),
        )
        .unwrap();
    sim.set_domain(unit, "dsp", false).unwrap();

    // Same schedule name, different definition: kept, with a warning
    let other = sim
        .add_child(
            ComponentId::ROOT,
            "dsp2",
            Arc::new(Calibrated {
                log: log.clone(),
                schedule: "dsp_sched",
                phases: &["calibrate"],
            }),
        )
        .unwrap();
    sim.set_domain(other, "dsp", false).unwrap();
    assert_eq!(bus.counts().id(ids::PH_DUPSCHED), 1);

    sim.run_phases().await.unwrap();

    let log = entries(&log);
    assert!(position(&log, "calibrate:dsp") < position(&log, "settle:dsp"));
    assert!(log.contains(&"calibrate:dsp2".to_string()));
    assert_eq!(sim.phase_state("dsp", "settle"), Some(PhaseState::Done));
}

#[tokio::test]
async fn test_conflicting_schedule_is_rejected() {
    let (sim, _bus) = simulation();
    let log = new_log();
    let unit = sim
        .add_child(
            ComponentId::ROOT,
            "dsp",
            Arc::new(Calibrated {
                log,
                schedule: "dsp_sched",
                phases: &["calibrate"],
            }),
        )
        .unwrap();

    // `tb` already runs the standard runtime schedule
    let err = sim.set_domain(unit, "tb", false).unwrap_err();
    assert!(matches!(err, DomainError::ScheduleConflict { .. }));
}

#[tokio::test]
async fn test_crossed_sync_is_reported_as_deadlock() {
    let (sim, _bus) = simulation();
    let log = new_log();
    let a = sim
        .add_child(
            ComponentId::ROOT,
            "a",
            Arc::new(Calibrated {
                log: log.clone(),
                schedule: "forward",
                phases: &["p1", "p2"],
            }),
        )
        .unwrap();
    let b = sim
        .add_child(
            ComponentId::ROOT,
            "b",
            Arc::new(Calibrated {
                log: log.clone(),
                schedule: "backward",
                phases: &["p2", "p1"],
            }),
        )
        .unwrap();
    sim.set_domain(a, "dom_a", false).unwrap();
    sim.set_domain(b, "dom_b", false).unwrap();
    sim.sync_domains("dom_a", "dom_b", "p1").unwrap();
    sim.sync_domains("dom_a", "dom_b", "p2").unwrap();

    let err = sim.run_phases().await.unwrap_err();

    assert!(matches!(err, EngineError::Deadlock(n) if n >= 4));
    assert_eq!(sim.phase_state("dom_a", "p1"), Some(PhaseState::Dormant));
    assert_eq!(sim.phase_state("common", "run"), Some(PhaseState::Done));
    assert!(matches!(
        sim.sync_domains("dom_a", "nowhere", "p1"),
        Err(DomainError::UnknownDomain(_))
    ));
}

// ============================================================================
// Objections
// ============================================================================

/// Holds `main` open with an objection while it works.
struct Stimulus {
    log: Log,
}

#[async_trait]
impl Component for Stimulus {
    fn type_name(&self) -> &'static str {
        "stimulus"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn main_phase(&self, phase: PhaseContext) {
        phase.raise_objection(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.log.lock().push("stimulus done".to_string());
        phase.drop_objection(1);
    }

    fn phase_ended(&self, phase: &PhaseContext) {
        if phase.phase_name() == "main" {
            self.log.lock().push("main ended".to_string());
        }
    }
}

#[tokio::test]
async fn test_objection_keeps_phase_open() {
    let (sim, bus) = simulation();
    let log = new_log();
    sim.add_child(ComponentId::ROOT, "stim", Arc::new(Stimulus { log: log.clone() }))
        .unwrap();

    sim.run_phases().await.unwrap();

    let log = entries(&log);
    assert!(position(&log, "stimulus done") < position(&log, "main ended"));
    let main = sim.find_phase("tb", "main").unwrap();
    assert_eq!(main.killed(), 0);
    assert_eq!(main.objection().total(), 0);
    assert_eq!(bus.counts().id(ids::OBJTN_ZERO), 0);
}

/// Re-raises in `ready_to_end` of `main`, either once or every time.
struct Extender {
    log: Log,
    once: bool,
    extended: AtomicBool,
}

impl Extender {
    fn new(log: Log, once: bool) -> Self {
        Self {
            log,
            once,
            extended: AtomicBool::new(false),
        }
    }
}

impl Component for Extender {
    fn type_name(&self) -> &'static str {
        "extender"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn phase_ready_to_end(&self, phase: &PhaseContext) {
        if phase.phase_name() != "main" {
            return;
        }
        self.log.lock().push("ready_to_end".to_string());
        if self.once && self.extended.swap(true, Ordering::SeqCst) {
            return;
        }
        phase.raise_objection(1);
        let phase = phase.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            phase.drop_objection(1);
        });
    }
}

#[tokio::test]
async fn test_ready_to_end_reraise_extends_phase() {
    let (sim, bus) = simulation();
    let log = new_log();
    sim.add_child(ComponentId::ROOT, "ext", Arc::new(Extender::new(log.clone(), true)))
        .unwrap();

    sim.run_phases().await.unwrap();

    assert_eq!(entries(&log).len(), 2);
    assert_eq!(bus.counts().id(ids::PH_READY_TO_END), 0);
    assert_eq!(sim.phase_state("tb", "post_main"), Some(PhaseState::Done));
}

#[tokio::test]
async fn test_ready_to_end_iterations_are_bounded() {
    let mut config = SimulationConfig::default();
    config.spec.phases.max_ready_to_end_iterations = 3;
    let (sim, bus) = Simulation::with_report_bus(config);
    let log = new_log();
    sim.add_child(ComponentId::ROOT, "ext", Arc::new(Extender::new(log.clone(), false)))
        .unwrap();

    sim.run_phases().await.unwrap();

    assert_eq!(entries(&log).len(), 3);
    assert_eq!(bus.counts().id(ids::PH_READY_TO_END), 1);
}

/// Objects to `run` and never lets go.
struct Stuck;

#[async_trait]
impl Component for Stuck {
    fn type_name(&self) -> &'static str {
        "stuck"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn run_phase(&self, phase: PhaseContext) {
        phase.raise_objection(1);
        std::future::pending::<()>().await;
    }
}

#[tokio::test]
async fn test_run_phase_timeout_is_fatal() {
    let mut config = SimulationConfig::default();
    config.spec.phases.timeout = Some(Duration::from_millis(50));
    let (sim, bus) = Simulation::with_report_bus(config);
    sim.add_child(ComponentId::ROOT, "stuck", Arc::new(Stuck)).unwrap();

    let err = sim.run_phases().await.unwrap_err();

    match err {
        EngineError::Timeout { phase, timeout } => {
            assert_eq!(phase, "run");
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(bus.counts().id(ids::PH_TIMEOUT), 1);
    assert_eq!(sim.phase_state("common", "extract"), Some(PhaseState::Dormant));
}

/// Reports a fatal error from inside `main`.
struct Failing;

#[async_trait]
impl Component for Failing {
    fn type_name(&self) -> &'static str {
        "failing"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn main_phase(&self, phase: PhaseContext) {
        phase.raise_objection(1);
        phase.fatal("DUT_DEAD", "no response from device");
        std::future::pending::<()>().await;
    }
}

#[tokio::test]
async fn test_fatal_report_aborts_run() {
    let (sim, bus) = simulation();
    sim.add_child(ComponentId::ROOT, "failing", Arc::new(Failing)).unwrap();

    let err = sim.run_phases().await.unwrap_err();

    assert!(matches!(err, EngineError::Fatal { ref id, .. } if id == "DUT_DEAD"));
    assert!(sim.is_aborted());
    assert_eq!(bus.counts().severity(Severity::Fatal), 1);
}

// ============================================================================
// Sequencers and phase implementations
// ============================================================================

struct SequencedDriver {
    log: Log,
}

#[async_trait]
impl Component for SequencedDriver {
    fn type_name(&self) -> &'static str {
        "sequenced_driver"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn main_phase(&self, _phase: PhaseContext) {
        self.log.lock().push("body:main".to_string());
    }

    fn as_sequencer(&self) -> Option<&dyn Sequencer> {
        Some(self)
    }
}

#[async_trait]
impl Sequencer for SequencedDriver {
    async fn start_phase_sequence(&self, phase: &PhaseContext) {
        if phase.phase_name() == "main" {
            self.log.lock().push("start:main".to_string());
        }
    }

    fn stop_phase_sequence(&self, phase: &PhaseContext) {
        if phase.phase_name() == "main" {
            self.log.lock().push("stop:main".to_string());
        }
    }
}

#[tokio::test]
async fn test_sequencer_starts_before_phase_body() {
    let (sim, _bus) = simulation();
    let log = new_log();
    sim.add_child(ComponentId::ROOT, "seqr", Arc::new(SequencedDriver { log: log.clone() }))
        .unwrap();

    sim.run_phases().await.unwrap();

    let log = entries(&log);
    assert_eq!(log, vec!["start:main", "body:main", "stop:main"]);
}

struct MainOverride {
    log: Log,
}

#[async_trait]
impl PhaseImp for MainOverride {
    async fn exec_task(&self, _component: Arc<dyn Component>, phase: PhaseContext) {
        self.log.lock().push(format!("override:{}", phase.full_name()));
    }
}

#[tokio::test]
async fn test_phase_imp_replaces_component_body() {
    let (sim, _bus) = simulation();
    let log = new_log();
    let a = sim
        .add_child(ComponentId::ROOT, "a", Arc::new(Recorder { log: log.clone() }))
        .unwrap();
    sim.add_child(ComponentId::ROOT, "b", Arc::new(Recorder { log: log.clone() }))
        .unwrap();
    sim.set_phase_imp(a, "main", Arc::new(MainOverride { log: log.clone() }))
        .unwrap();

    sim.run_phases().await.unwrap();

    let log = entries(&log);
    assert!(log.contains(&"override:a".to_string()));
    assert!(!log.contains(&"main:a:tb".to_string()));
    assert!(log.contains(&"main:b:tb".to_string()));
}
