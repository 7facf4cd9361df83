//! Integration tests for aircraft loading, reloading, slaves, scripts and
//! output sinks.
//!
//! Aircraft, engine and system documents come from `tests/fixtures/`.

use std::path::PathBuf;

use skyframe_fdm::models::fcs::FlightControl;
use skyframe_fdm::models::ground_reactions::GroundReactions;
use skyframe_fdm::models::output::SinkKind;
use skyframe_fdm::models::propulsion::Propulsion;
use skyframe_fdm::prelude::*;

fn silent() -> ExecConfig {
    ExecConfig {
        debug: Some(DebugLevel::SILENT),
        ..ExecConfig::default()
    }
}

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load(exec: &mut Executive, model: &str) -> Result<(), LoadError> {
    let dir = fixtures();
    exec.load_model(dir.join("aircraft"), dir.join("engine"), dir.join("systems"), model, true)
}

fn loaded(model: &str) -> Executive {
    let mut exec = Executive::new(silent()).unwrap();
    load(&mut exec, model).unwrap();
    exec
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn c172_sections_reach_their_models() {
    let exec = loaded("c172x");
    assert!(exec.model_loaded());
    assert_eq!(exec.aircraft_name(), "c172x");
    assert_eq!(exec.error_count(), 0);

    let propulsion = exec.model::<Propulsion>().unwrap();
    assert_eq!(propulsion.engine_count(), 1);
    assert_eq!(propulsion.tank_count(), 2);
    assert_eq!(propulsion.thruster_kind(0), Some("propeller"));
    assert_eq!(propulsion.engine_running(0), Some(false));

    let fcs = exec.model::<FlightControl>().unwrap();
    assert_eq!(fcs.channel_names(), vec!["Damper", "Pitch"]);

    let gear = exec.model::<GroundReactions>().unwrap();
    assert_eq!(gear.contact_names(), vec!["NOSE", "MAIN", "TAIL"]);

    assert_eq!(exec.get_property_value("metrics/Sw-sqft"), Some(174.0));
    assert_eq!(exec.get_property_value("propulsion/tank[1]/contents-lbs"), Some(150.0));
}

#[test]
fn load_without_model_directory() {
    let dir = fixtures();
    let mut exec = Executive::new(silent()).unwrap();
    exec.load_model(
        dir.join("aircraft/minimal"),
        dir.join("engine"),
        dir.join("systems"),
        "minimal",
        false,
    )
    .unwrap();
    assert_eq!(exec.aircraft_name(), "minimal");
}

#[test]
fn missing_aircraft_file_is_a_config_error() {
    let mut exec = Executive::new(silent()).unwrap();
    let err = load(&mut exec, "no_such_aircraft").unwrap_err();
    assert!(matches!(err, LoadError::Config(ConfigError::Io { .. })));
    assert!(!exec.model_loaded());
    assert_eq!(exec.error_count(), 1);
}

#[test]
fn unknown_section_fails_the_load() {
    let mut exec = Executive::new(silent()).unwrap();
    let err = load(&mut exec, "broken").unwrap_err();
    match err {
        LoadError::UnexpectedSection { tag } => assert_eq!(tag, "bogus"),
        other => panic!("expected UnexpectedSection, got {other}"),
    }
    assert!(!exec.model_loaded());
    assert!(exec.property_catalog().is_empty());
}

#[test]
fn inverted_clip_bounds_fail_the_load() {
    let mut exec = Executive::new(silent()).unwrap();
    let err = load(&mut exec, "inverted_clip").unwrap_err();
    match &err {
        LoadError::Section { section, .. } => assert_eq!(section, "flight_control"),
        other => panic!("expected a section failure, got {other}"),
    }
    assert!(err.to_string().contains("invalid range [1, -1]"));
    assert!(!exec.model_loaded());
    assert_eq!(exec.error_count(), 1);
    // the executive stays usable
    assert!(exec.run());
}

#[test]
fn failed_reload_keeps_previous_catalog() {
    let mut exec = loaded("minimal");
    let before = exec.property_catalog().clone();
    assert!(!before.is_empty());

    assert!(load(&mut exec, "broken").is_err());
    assert_eq!(exec.property_catalog(), &before);
    assert!(!exec.model_loaded());
}

#[test]
fn reload_is_idempotent() {
    let mut exec = loaded("c172x");
    let first = exec.property_catalog().clone();
    let names: Vec<String> = exec.scheduled_names().iter().map(|s| s.to_string()).collect();

    load(&mut exec, "c172x").unwrap();
    assert_eq!(exec.property_catalog(), &first);
    let again: Vec<String> = exec.scheduled_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(names, again);
    assert_eq!(exec.model::<Propulsion>().unwrap().engine_count(), 1);
    assert!(exec.run());
}

#[test]
fn loaded_aircraft_runs() {
    let mut exec = loaded("c172x");
    for _ in 0..60 {
        assert!(exec.run());
    }
    assert_eq!(exec.frame(), 60);
    assert!(exec.get_property_value("inertia/weight-lbs").unwrap() > 1500.0);
}

// ---------------------------------------------------------------------------
// Property catalog
// ---------------------------------------------------------------------------

#[test]
fn catalog_lists_instance_relative_paths_once() {
    let mut exec = loaded("minimal");
    let catalog = exec.property_catalog().clone();
    for path in [
        "metrics/Sw-sqft",
        "inertia/weight-lbs",
        "gear/unit/WOW",
        "propulsion/tank/contents-lbs",
        "simulation/sim-time-sec",
        "simulation/output/log_rate_hz",
        "ic/vt-fps",
    ] {
        assert!(catalog.contains(path), "catalog is missing {path}");
    }
    let unique: std::collections::HashSet<&str> = catalog.iter().collect();
    assert_eq!(unique.len(), catalog.len());
    assert!(catalog.iter().all(|entry| !entry.starts_with('/')));

    exec.run();
    assert_eq!(exec.property_catalog(), &catalog);
}

#[test]
fn catalog_query() {
    let exec = loaded("minimal");
    let hits = exec.query_property_catalog("tank");
    assert!(hits.lines().all(|line| line.contains("tank")));
    assert!(hits.lines().any(|line| line == "propulsion/tank/capacity-lbs"));
    assert_eq!(exec.query_property_catalog("warp-drive"), "No matches found\n");
}

// ---------------------------------------------------------------------------
// Initial conditions and trim
// ---------------------------------------------------------------------------

#[test]
fn initial_conditions_from_file() {
    let mut exec = loaded("c172x");
    exec.load_initial_conditions(fixtures().join("aircraft/c172x/reset00.json"))
        .unwrap();
    assert!(exec.run_ic());
    assert_eq!(exec.sim_time(), 0.0);
    assert_eq!(exec.get_property_value("position/h-sl-ft"), Some(3000.0));
    let u = exec.get_property_value("velocities/u-fps").unwrap();
    assert!((u - 180.0 * 2.0_f64.to_radians().cos()).abs() < 1e-9);
    let theta = exec.get_property_value("attitude/theta-rad").unwrap();
    assert!((theta - 2.0_f64.to_radians()).abs() < 1e-12);
}

#[test]
fn longitudinal_trim_reports_every_axis() {
    let mut exec = loaded("c172x");
    exec.load_initial_conditions(fixtures().join("aircraft/c172x/reset00.json"))
        .unwrap();
    exec.run_ic();
    for _ in 0..5 {
        exec.run();
    }
    let t = exec.sim_time();

    let report = exec.do_trim(0).unwrap();
    assert_eq!(report.mode, TrimMode::Longitudinal);
    assert_eq!(report.axes.len(), 3);
    assert!(report.sweeps >= 1);
    assert_eq!(exec.sim_time(), t);
    assert!(!exec.integration_suspended());
    let stored = exec.get_trim().last_report().map(|r| (r.mode, r.sweeps, r.axes.len()));
    assert_eq!(stored, Some((report.mode, report.sweeps, 3)));
}

#[test]
fn snapshot_restores_flight_state() {
    let mut exec = loaded("c172x");
    exec.run_ic();
    for _ in 0..30 {
        exec.run();
    }
    let snapshot = exec.capture_snapshot();
    assert!(snapshot.verify());
    let h = exec.get_property_value("position/h-sl-ft").unwrap();
    let u = exec.get_property_value("velocities/u-fps").unwrap();
    let frame = exec.frame();

    exec.set_property_value("position/h-sl-ft", h + 500.0).unwrap();
    exec.set_property_value("velocities/u-fps", u + 40.0).unwrap();
    assert!(exec.restore_snapshot(&snapshot).unwrap() > 0);

    assert_eq!(exec.get_property_value("position/h-sl-ft"), Some(h));
    assert_eq!(exec.get_property_value("velocities/u-fps"), Some(u));
    assert_eq!(exec.frame(), frame);
    assert_eq!(exec.error_count(), 0);
    assert!(exec.run());
}

// ---------------------------------------------------------------------------
// Slaves
// ---------------------------------------------------------------------------

#[test]
fn slave_section_loads_a_child_executive() {
    let mut exec = loaded("with_slave");
    assert_eq!(exec.enumerate_fdms(), vec!["with_slave", "minimal"]);
    assert_eq!(exec.slaves().len(), 2);
    assert!(exec.slaves()[0].is_identity());

    let slave = &exec.slaves()[1];
    let pose = slave.pose();
    assert_eq!((pose.x, pose.y, pose.z), (-30.0, 0.0, -10.0));
    assert_eq!(pose.pitch, 0.05);
    let child = slave.executive().unwrap();
    assert!(child.model_loaded());
    assert_eq!(child.aircraft_name(), "minimal");

    // detached slaves are stepped by the caller
    exec.run();
    assert_eq!(exec.slaves()[1].executive().unwrap().frame(), 0);
    assert!(exec.slaves_mut()[1].run());
    assert_eq!(exec.slaves()[1].executive().unwrap().frame(), 1);

    load(&mut exec, "minimal").unwrap();
    assert_eq!(exec.enumerate_fdms(), vec!["minimal"]);
}

#[test]
fn slave_naming_its_own_aircraft_fails_the_load() {
    let mut exec = Executive::new(silent()).unwrap();
    let err = load(&mut exec, "self_slave").unwrap_err();
    assert!(err.to_string().contains("slave chain self_slave -> self_slave is cyclic"));
    assert!(!exec.model_loaded());
    assert_eq!(exec.enumerate_fdms(), vec!["self_slave"]);

    load(&mut exec, "with_slave").unwrap();
    assert_eq!(exec.enumerate_fdms(), vec!["with_slave", "minimal"]);
}

#[test]
fn lockstep_slaves_follow_the_parent() {
    let mut exec = Executive::new(ExecConfig {
        slave_stepping: SlaveStepping::Lockstep,
        ..silent()
    })
    .unwrap();
    load(&mut exec, "with_slave").unwrap();
    for _ in 0..3 {
        exec.run();
    }
    let child = exec.slaves()[1].executive().unwrap();
    assert_eq!(child.frame(), 3);
    assert_eq!(child.sim_time(), exec.sim_time());
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

#[test]
fn script_drives_the_run_to_its_end_time() {
    let mut exec = loaded("c172x");
    exec.load_script(fixtures().join("scripts/c172_start.json")).unwrap();
    assert_eq!(exec.delta_t(), 0.01);

    let mut engine_started = false;
    let mut frames = 0;
    while exec.run() {
        frames += 1;
        if (0.2..0.3).contains(&exec.sim_time()) {
            engine_started |= exec.model::<Propulsion>().unwrap().engine_running(0) == Some(true);
        }
        assert!(frames < 1000, "script never ended");
    }
    assert!(engine_started);
    assert!(exec.sim_time() > 2.0 && exec.sim_time() < 2.05);
    assert_eq!(exec.get_property_value("fcs/throttle-cmd-norm"), Some(0.8));
    let elevator = exec.get_property_value("fcs/elevator-cmd-norm").unwrap();
    assert!((elevator - 0.1).abs() < 1e-12);
}

#[test]
fn identical_runs_hash_identically() {
    let run = || {
        let mut exec = loaded("c172x");
        exec.load_script(fixtures().join("scripts/c172_start.json")).unwrap();
        for _ in 0..150 {
            exec.run();
        }
        exec.state_hash()
    };
    assert_eq!(run(), run());
}

// ---------------------------------------------------------------------------
// Output sinks
// ---------------------------------------------------------------------------

#[test]
fn output_section_in_aircraft_file() {
    let exec = loaded("minimal");
    let outputs: Vec<_> = exec.outputs().collect();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].kind(), SinkKind::None);
    assert_eq!(outputs[0].labels()[0], "position/h-sl-ft");
    assert!(outputs[0].labels().contains(&"velocities/vt-fps"));
    assert_eq!(exec.get_property_value("simulation/output/log_rate_hz"), Some(10.0));
}

#[test]
fn csv_directives_write_a_log() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = dir.path().join("flight.csv");
    let directives = dir.path().join("output.json");
    let doc = serde_json::json!({
        "name": "output",
        "attributes": { "type": "CSV", "name": log.to_string_lossy(), "rate": 120 },
        "children": [
            { "name": "property", "text": "simulation/frame" },
            { "name": "velocities", "text": "ON" }
        ]
    });
    std::fs::write(&directives, serde_json::to_string_pretty(&doc)?)?;

    let mut exec = Executive::new(silent())?;
    exec.set_output_directives(&directives)?;
    for _ in 0..3 {
        exec.run();
    }
    let text = std::fs::read_to_string(&log)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Time,simulation/frame,velocities/vt-fps"));
    let frames: Vec<&str> = lines[1..].iter().map(|l| l.split(',').nth(1).unwrap_or("")).collect();
    assert_eq!(frames, vec!["0", "1", "2"]);

    exec.disable_output();
    exec.run();
    assert_eq!(exec.outputs().next().map(|o| o.lines_written()), Some(3));

    exec.enable_output();
    exec.reset_to_initial_conditions()?;
    exec.run();
    let second = exec.outputs().next().and_then(|o| o.current_path()).unwrap();
    assert_eq!(second, dir.path().join("flight_1.csv"));
    assert_eq!(std::fs::read_to_string(second)?.lines().count(), 2);
    Ok(())
}

#[test]
fn output_directives_must_be_an_output_document() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wrong.json");
    std::fs::write(&path, r#"{"name": "fdm_config"}"#)?;
    let mut exec = Executive::new(silent())?;
    assert!(exec.set_output_directives(&path).is_err());
    assert_eq!(exec.outputs().count(), 0);
    Ok(())
}
