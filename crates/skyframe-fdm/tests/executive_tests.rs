//! Integration tests for the executive's frame loop and run-time controls.
//!
//! Everything here runs against a bare executive (built-in models only, no
//! aircraft loaded), so the tests exercise scheduling, clock handling,
//! command input, trimming entry points and shared namespaces without
//! depending on any aircraft data.

use std::cell::RefCell;
use std::rc::Rc;

use skyframe_fdm::prelude::*;

fn silent() -> ExecConfig {
    ExecConfig {
        debug: Some(DebugLevel::SILENT),
        ..ExecConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Test model
// ---------------------------------------------------------------------------

/// Appends its tag to a shared log every time it computes.
struct Recorder {
    base: ModelBase,
    tag: &'static str,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Recorder {
    fn boxed(tag: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Box<dyn Model> {
        Box::new(Self {
            base: ModelBase::new(tag, DebugLevel::SILENT),
            tag,
            log: Rc::clone(log),
        })
    }
}

impl Model for Recorder {
    skyframe_fdm::model_accessors!();

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        self.log.borrow_mut().push(self.tag);
        Step::Computed
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[test]
fn scheduled_models_run_in_insertion_order_at_their_rate() {
    let mut exec = Executive::new(silent()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let a = exec.schedule(Recorder::boxed("a", &log), 1);
    let b = exec.schedule(Recorder::boxed("b", &log), 2);
    assert_eq!(b, a + 1);

    for _ in 0..4 {
        assert!(exec.run());
    }
    assert_eq!(*log.borrow(), vec!["a", "b", "a", "a", "b", "a"]);

    let names = exec.scheduled_names();
    assert_eq!(names.first(), Some(&"atmosphere"));
    assert_eq!(&names[names.len() - 3..], &["input", "a", "b"]);
}

#[test]
fn holding_skips_physics_but_counts_frames() {
    let mut exec = Executive::new(silent()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    exec.schedule(Recorder::boxed("r", &log), 1);

    exec.run();
    exec.hold();
    exec.run();
    exec.run();
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(exec.frame(), 3);
    assert_eq!(exec.sim_time(), exec.delta_t());

    exec.resume();
    exec.run();
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn disabled_model_is_skipped() {
    let mut exec = Executive::new(silent()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    exec.schedule(Recorder::boxed("r", &log), 1);
    exec.run();
    exec.model::<Recorder>().unwrap().base().set_enabled(false);
    exec.run();
    exec.run();
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(exec.frame(), 3);
}

// ---------------------------------------------------------------------------
// Clock and termination
// ---------------------------------------------------------------------------

#[test]
fn sim_time_advances_by_dt_per_frame() {
    let mut exec = Executive::new(ExecConfig {
        dt: 0.01,
        ..silent()
    })
    .unwrap();
    for _ in 0..10 {
        exec.run();
    }
    assert!((exec.sim_time() - 0.1).abs() < 1e-12);
    assert_eq!(exec.get_property_value("simulation/dt"), Some(0.01));
    assert!((exec.get_property_value("simulation/sim-time-sec").unwrap() - 0.1).abs() < 1e-12);
}

#[test]
fn suspending_integration_freezes_time() {
    let mut exec = Executive::new(silent()).unwrap();
    exec.suspend_integration();
    exec.suspend_integration();
    exec.run();
    assert_eq!(exec.sim_time(), 0.0);
    assert_eq!(exec.delta_t(), 0.0);
    exec.resume_integration();
    assert!(!exec.integration_suspended());
    assert_eq!(exec.delta_t(), 1.0 / 120.0);
}

#[test]
fn terminate_property_stops_the_loop() {
    let mut exec = Executive::new(silent()).unwrap();
    assert!(exec.run());
    exec.set_property_value("simulation/terminate", 1.0).unwrap();
    assert!(exec.terminated());
    assert!(!exec.run());
    assert!(!exec.run());
    assert_eq!(exec.frame(), 3);
}

// ---------------------------------------------------------------------------
// Initial conditions and reset
// ---------------------------------------------------------------------------

#[test]
fn run_ic_restores_the_initial_state_without_advancing_time() {
    let mut exec = Executive::new(silent()).unwrap();
    exec.set_property_value("ic/h-sl-ft", 500.0).unwrap();
    exec.set_property_value("ic/u-fps", 100.0).unwrap();
    for _ in 0..20 {
        exec.run();
    }
    assert!(exec.sim_time() > 0.0);

    assert!(exec.run_ic());
    assert_eq!(exec.sim_time(), 0.0);
    assert!(!exec.integration_suspended());
    assert_eq!(exec.get_property_value("position/h-sl-ft"), Some(500.0));
    assert_eq!(exec.get_property_value("velocities/u-fps"), Some(100.0));
}

#[test]
fn run_ic_resumes_even_when_previously_suspended() {
    let mut exec = Executive::new(silent()).unwrap();
    exec.suspend_integration();
    exec.run_ic();
    assert!(!exec.integration_suspended());
    assert_eq!(exec.delta_t(), 1.0 / 120.0);
}

#[test]
fn reset_reinitializes_and_rewinds_the_clock() {
    let mut exec = Executive::new(silent()).unwrap();
    for _ in 0..5 {
        exec.run();
    }
    assert!(exec.reset_to_initial_conditions().unwrap());
    assert_eq!(exec.sim_time(), 0.0);
    assert_eq!(exec.frame(), 6);
}

// ---------------------------------------------------------------------------
// Command input
// ---------------------------------------------------------------------------

#[test]
fn input_hold_iterate_and_quit() {
    let mut exec = Executive::new(silent()).unwrap();
    let input = exec.input_queue().unwrap();

    input.send("hold");
    exec.run();
    assert!(exec.holding());
    let held_at = exec.sim_time();
    exec.run();
    assert_eq!(exec.sim_time(), held_at);

    input.send("iterate 3");
    exec.run();
    assert!(!exec.holding());
    assert_eq!(exec.sim_time(), held_at);
    for _ in 0..3 {
        exec.run();
    }
    assert!(exec.holding());
    let after = exec.sim_time();
    assert!((after - held_at - 3.0 * exec.delta_t()).abs() < 1e-12);
    exec.run();
    assert_eq!(exec.sim_time(), after);

    input.send("quit");
    assert!(!exec.run());
    assert!(exec.terminated());
    let replies = input.take_replies();
    assert_eq!(replies, vec!["holding", "iterating 3 frames", "terminating"]);
}

#[test]
fn input_set_and_get_reach_the_namespace() {
    let mut exec = Executive::new(silent()).unwrap();
    let input = exec.input_queue().unwrap();
    input.send("set atmosphere/delta-T 10");
    input.send("get atmosphere/delta-T");
    input.send("set simulation/sim-time-sec 5");
    exec.run();
    let replies = input.take_replies();
    assert_eq!(replies[0], "set atmosphere/delta-T = 10");
    assert_eq!(replies[1], "atmosphere/delta-T = 10");
    assert!(replies[2].ends_with("is read-only"));
    assert_eq!(exec.get_property_value("atmosphere/delta-T"), Some(10.0));
}

// ---------------------------------------------------------------------------
// Trim entry points
// ---------------------------------------------------------------------------

#[test]
fn illegal_trim_mode_is_rejected() {
    let mut exec = Executive::new(silent()).unwrap();
    assert_eq!(exec.do_trim(7).unwrap_err(), TrimError::InvalidMode { mode: 7 });
    assert_eq!(exec.do_trim(-1).unwrap_err(), TrimError::InvalidMode { mode: -1 });
}

#[test]
fn trim_preserves_sim_time_and_integration_state() {
    let mut exec = Executive::new(silent()).unwrap();
    for _ in 0..12 {
        exec.run();
    }
    let t = exec.sim_time();
    let frame = exec.frame();
    let report = exec.do_trim(TrimMode::None.code()).unwrap();
    assert!(report.converged);
    assert!(report.axes.is_empty());
    assert_eq!(exec.sim_time(), t);
    assert_eq!(exec.frame(), frame);
    assert!(!exec.integration_suspended());
    assert_eq!(exec.get_trim().mode(), TrimMode::None);
}

#[test]
fn trim_requested_through_the_namespace() {
    let mut exec = Executive::new(silent()).unwrap();
    exec.set_property_value("simulation/do_simple_trim", 6.0).unwrap();
    assert!(exec.get_trim().last_report().is_some());
    assert_eq!(exec.error_count(), 0);

    exec.set_property_value("simulation/do_simple_trim", 9.0).unwrap();
    assert_eq!(exec.error_count(), 1);
}

// ---------------------------------------------------------------------------
// Atmosphere replacement
// ---------------------------------------------------------------------------

struct UncalibratedAtmosphere;

impl AtmosphereProfile for UncalibratedAtmosphere {
    fn name(&self) -> &str {
        "uncalibrated"
    }

    fn sample(&self, h_ft: f64, delta_t_r: f64) -> skyframe_fdm::models::atmosphere::AtmosphereSample {
        StandardAtmosphere.sample(h_ft, delta_t_r)
    }

    fn init(&mut self) -> Result<(), String> {
        Err("no calibration table".into())
    }
}

#[test]
fn atmosphere_swap_keeps_schedule_slot() {
    let mut exec = Executive::new(silent()).unwrap();
    let before: Vec<String> = exec.scheduled_names().iter().map(|s| s.to_string()).collect();
    let standard_t = exec.get_property_value("atmosphere/T-R").unwrap();

    exec.use_atmosphere(Box::new(MarsAtmosphere)).unwrap();
    exec.run();
    let after: Vec<String> = exec.scheduled_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(before, after);
    let mars_t = exec.get_property_value("atmosphere/T-R").unwrap();
    assert!(mars_t < standard_t);
    assert_eq!(exec.error_count(), 0);
}

#[test]
fn failed_atmosphere_init_is_counted_but_installed() {
    let mut exec = Executive::new(silent()).unwrap();
    exec.use_atmosphere(Box::new(UncalibratedAtmosphere)).unwrap();
    assert_eq!(exec.error_count(), 1);
    assert!(exec.run());
    assert!(exec.get_property_value("atmosphere/rho-slugs_ft3").unwrap() > 0.0);
}

// ---------------------------------------------------------------------------
// Shared namespaces
// ---------------------------------------------------------------------------

#[test]
fn executives_sharing_a_root_get_distinct_instances() {
    let manager = PropertyManager::new();
    let first = Executive::with_root(silent(), Rc::clone(&manager)).unwrap();
    let second = Executive::with_root(silent(), Rc::clone(&manager)).unwrap();
    assert_eq!(first.properties().fully_qualified_name(), "/fdm/skyframe");
    assert_eq!(second.properties().fully_qualified_name(), "/fdm/skyframe[1]");
    assert_eq!(manager.live_instances(), 2);

    drop(second);
    assert_eq!(manager.live_instances(), 1);
    let root = manager.root();
    let orphan = root.find("fdm/skyframe[1]/simulation/sim-time-sec").unwrap();
    assert!(!orphan.is_tied());
    let live = root.find("fdm/skyframe/simulation/sim-time-sec").unwrap();
    assert!(live.is_tied());

    let third = Executive::with_root(silent(), Rc::clone(&manager)).unwrap();
    assert_eq!(third.properties().fully_qualified_name(), "/fdm/skyframe[1]");
    assert!(orphan.is_tied());
}

#[test]
fn dropping_an_executive_unties_everything() {
    let manager = PropertyManager::new();
    let exec = Executive::with_root(silent(), Rc::clone(&manager)).unwrap();
    let instance = exec.properties().clone();
    assert!(instance.leaves().iter().any(PropertyNode::is_tied));
    drop(exec);
    assert!(instance.leaves().iter().all(|leaf| !leaf.is_tied()));
    assert_eq!(manager.live_instances(), 0);
}
