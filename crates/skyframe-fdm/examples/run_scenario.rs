//! Load an aircraft, optionally a script, and run it to completion.
//!
//! ```text
//! cargo run --example run_scenario -- [aircraft] [script.json] [ic.json]
//! ```
//!
//! Aircraft, engine and system documents are read from the test fixtures.
//! Set `RUST_LOG=info` and `SKYFRAME_DEBUG=1` to see load and event logging.

use std::path::PathBuf;

use anyhow::Context;
use skyframe_fdm::prelude::*;

/// Frames to run when no script bounds the run.
const UNSCRIPTED_FRAMES: u32 = 600;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let aircraft = args.next().unwrap_or_else(|| "c172x".to_string());
    let script = args.next().map(PathBuf::from);
    let ic = args.next().map(PathBuf::from);

    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let mut exec = Executive::new(ExecConfig::default()).context("could not allocate the executive")?;
    exec.load_model(
        fixtures.join("aircraft"),
        fixtures.join("engine"),
        fixtures.join("systems"),
        &aircraft,
        true,
    )
    .with_context(|| format!("could not load aircraft '{aircraft}'"))?;

    if let Some(ic) = ic {
        exec.load_initial_conditions(&ic)
            .with_context(|| format!("could not read initial conditions {}", ic.display()))?;
    }
    if !exec.run_ic() {
        anyhow::bail!("initial-condition run failed");
    }

    let scripted = match script {
        Some(path) => {
            exec.load_script(&path)
                .with_context(|| format!("could not load script {}", path.display()))?;
            true
        }
        None => false,
    };

    let mut frames = 0u32;
    while exec.run() {
        frames += 1;
        if !scripted && frames >= UNSCRIPTED_FRAMES {
            break;
        }
    }

    println!("aircraft:   {}", exec.enumerate_fdms().join(", "));
    println!("frames:     {}", exec.frame());
    println!("sim time:   {:.3} s", exec.sim_time());
    println!("altitude:   {:.1} ft", exec.get_property_value("position/h-sl-ft").unwrap_or(0.0));
    println!("airspeed:   {:.1} ft/s", exec.get_property_value("velocities/vt-fps").unwrap_or(0.0));
    println!("errors:     {}", exec.error_count());
    println!("state hash: {}", exec.state_hash());
    Ok(())
}
