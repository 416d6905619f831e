//! Tick benchmark — measure the full cycle-driver path for queues of
//! varying depth.
//!
//! The planner must complete a tick well inside one servo period (1 ms).
//! This drives the compute-intensive portion: completion, activation,
//! look-ahead state, profiler, blending, and status publication, with the
//! I/O shim stubbed out.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use helix_common::config::PlannerConfig;
use helix_common::pose::{Cart, Pose};
use helix_common::state::{CanonKind, TermCond};
use helix_common::status::StatusBlock;
use helix_planner::{NullIo, Planner};

/// A planner loaded with an alternating corner path of `n` segments.
fn setup_planner(n: usize) -> (Planner, StatusBlock) {
    let cfg = PlannerConfig {
        // Room for the lines plus any spliced blend arcs.
        queue_size: 2 * n + 2,
        enable_blend_arcs: true,
        ..Default::default()
    };
    let mut tp = Planner::new(&cfg);
    tp.set_cycle_time(0.001).unwrap();
    tp.set_vmax(1000.0, 1000.0).unwrap();
    tp.set_vlimit(1000.0);
    tp.set_amax(1000.0).unwrap();
    tp.set_term_cond(TermCond::Parabolic, 0.1).unwrap();

    let mut x = 0.0;
    let mut y = 0.0;
    for i in 0..n {
        if i % 2 == 0 {
            x += 10.0;
        } else {
            y += 10.0;
        }
        let end = Pose {
            tran: Cart::new(x, y, 0.0),
            ..Pose::ZERO
        };
        tp.add_line(end, CanonKind::Feed, 100.0, 200.0, 1000.0, 0, false, None)
            .unwrap();
    }

    (tp, StatusBlock::default())
}

fn bench_run_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_tick");

    for &segments in &[4usize, 16, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(segments),
            &segments,
            |b, &n| {
                b.iter_batched_ref(
                    || setup_planner(n),
                    |(tp, status)| {
                        let mut io = NullIo;
                        for _ in 0..100 {
                            tp.run_tick(status, &mut io);
                        }
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_append(c: &mut Criterion) {
    c.bench_function("add_line_with_lookahead", |b| {
        b.iter_batched_ref(
            || {
                let cfg = PlannerConfig {
                    queue_size: 256,
                    ..Default::default()
                };
                let mut tp = Planner::new(&cfg);
                tp.set_cycle_time(0.001).unwrap();
                tp.set_vmax(1000.0, 1000.0).unwrap();
                tp.set_amax(1000.0).unwrap();
                tp.set_term_cond(TermCond::Tangent, 0.0).unwrap();
                tp
            },
            |tp| {
                for i in 0..100 {
                    let end = Pose {
                        tran: Cart::new((i + 1) as f64, 0.0, 0.0),
                        ..Pose::ZERO
                    };
                    tp.add_line(end, CanonKind::Feed, 100.0, 200.0, 1000.0, 0, false, None)
                        .unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_run_tick, bench_append);
criterion_main!(benches);
