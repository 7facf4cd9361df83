//! Property tests for the executive's clock and catalog.
//!
//! Random sequences of run/hold/suspend operations are applied to a loaded
//! executive and checked against a simple model of what the frame counter
//! and simulation clock should read afterwards.

use std::path::PathBuf;

use proptest::prelude::*;
use skyframe_fdm::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Run,
    Hold,
    Resume,
    Suspend,
    Unsuspend,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Run),
        1 => Just(Op::Hold),
        1 => Just(Op::Resume),
        1 => Just(Op::Suspend),
        1 => Just(Op::Unsuspend),
    ]
}

fn minimal() -> Executive {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let mut exec = Executive::new(ExecConfig {
        debug: Some(DebugLevel::SILENT),
        ..ExecConfig::default()
    })
    .unwrap();
    exec.load_model(dir.join("aircraft"), dir.join("engine"), dir.join("systems"), "minimal", true)
        .unwrap();
    exec
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The frame counter counts every run; the clock only counts runs made
    /// while neither holding nor suspended.
    #[test]
    fn clock_tracks_runs(ops in prop::collection::vec(op_strategy(), 0..80)) {
        let mut exec = minimal();
        let dt = exec.delta_t();
        let catalog = exec.property_catalog().clone();

        let (mut holding, mut suspended) = (false, false);
        let (mut runs, mut advancing) = (0u64, 0u32);
        for op in &ops {
            match op {
                Op::Run => {
                    prop_assert!(exec.run());
                    runs += 1;
                    if !holding && !suspended {
                        advancing += 1;
                    }
                }
                Op::Hold => {
                    exec.hold();
                    holding = true;
                }
                Op::Resume => {
                    exec.resume();
                    holding = false;
                }
                Op::Suspend => {
                    exec.suspend_integration();
                    suspended = true;
                }
                Op::Unsuspend => {
                    exec.resume_integration();
                    suspended = false;
                }
            }
        }

        prop_assert_eq!(exec.frame(), runs);
        prop_assert_eq!(exec.get_property_value("simulation/frame"), Some(runs as f64));
        prop_assert!((exec.sim_time() - dt * f64::from(advancing)).abs() < 1e-9);
        prop_assert_eq!(exec.holding(), holding);
        prop_assert_eq!(exec.integration_suspended(), suspended);
        prop_assert_eq!(exec.property_catalog(), &catalog);
    }

    /// Every line of a catalog query contains the search string.
    #[test]
    fn catalog_query_lines_match(needle in "[a-z/-]{1,5}") {
        let exec = minimal();
        let reply = exec.query_property_catalog(&needle);
        if reply != "No matches found\n" {
            for line in reply.lines() {
                prop_assert!(line.contains(needle.as_str()));
            }
        } else {
            prop_assert!(exec.property_catalog().iter().all(|e| !e.contains(needle.as_str())));
        }
    }
}
