//! Frame loop benchmarks.
//!
//! Measures one executive frame with only the built-in models, one frame of
//! the four-seat trainer fixture, a full longitudinal trim, and catalog
//! construction after a load.
//!
//! Run with: `cargo bench --bench frame_benchmarks`

use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use skyframe_fdm::prelude::*;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn config() -> ExecConfig {
    ExecConfig {
        debug: Some(DebugLevel::SILENT),
        ..ExecConfig::default()
    }
}

fn load(model: &str) -> Executive {
    let dir = fixtures();
    let mut exec = Executive::new(config()).unwrap();
    exec.load_model(dir.join("aircraft"), dir.join("engine"), dir.join("systems"), model, true)
        .unwrap();
    exec
}

// ---------------------------------------------------------------------------
// Benchmark 1: single frames
// ---------------------------------------------------------------------------

fn bench_single_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    for model in ["bare", "minimal", "c172x"] {
        let mut exec = if model == "bare" {
            Executive::new(config()).unwrap()
        } else {
            load(model)
        };
        group.bench_with_input(BenchmarkId::from_parameter(model), &model, |b, _| {
            b.iter(|| black_box(exec.run()));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark 2: one simulated second at 120 Hz
// ---------------------------------------------------------------------------

fn bench_simulated_second(c: &mut Criterion) {
    c.bench_function("c172x_one_second", |b| {
        b.iter_batched(
            || {
                let mut exec = load("c172x");
                exec.load_initial_conditions(fixtures().join("aircraft/c172x/reset00.json"))
                    .unwrap();
                exec.run_ic();
                exec
            },
            |mut exec| {
                for _ in 0..120 {
                    exec.run();
                }
                black_box(exec.state_hash())
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

// ---------------------------------------------------------------------------
// Benchmark 3: trim and catalog
// ---------------------------------------------------------------------------

fn bench_trim(c: &mut Criterion) {
    let mut exec = load("c172x");
    exec.load_initial_conditions(fixtures().join("aircraft/c172x/reset00.json"))
        .unwrap();
    exec.run_ic();
    c.bench_function("c172x_longitudinal_trim", |b| {
        b.iter(|| black_box(exec.do_trim(0).map(|r| r.sweeps)));
    });
}

fn bench_catalog(c: &mut Criterion) {
    let exec = load("c172x");
    let root = exec.property_manager().root();
    let prefix = exec.properties().fully_qualified_name();
    c.bench_function("catalog_build_c172x", |b| {
        b.iter(|| black_box(PropertyCatalog::build(&root, &prefix).len()));
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_single_frame,
    bench_simulated_second,
    bench_trim,
    bench_catalog,
);
criterion_main!(benches);
