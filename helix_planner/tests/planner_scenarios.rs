//! End-to-end planner scenarios.
//!
//! Drives a full planner through the cycle driver tick by tick with a
//! synthetic status block (and, for tapping, a synthetic spindle), checking
//! trajectory invariants on every tick:
//! velocity within limits, bounded acceleration, monotonic progress, and
//! final poses landing on the commanded endpoints.

use helix_common::config::PlannerConfig;
use helix_common::pose::{Cart, Pose};
use helix_common::state::{CanonKind, TermCond};
use helix_common::status::StatusBlock;
use helix_planner::{NullIo, Planner};

// ── Helpers ─────────────────────────────────────────────────────────

const DT: f64 = 0.001;

/// Opt-in debug logging: `RUST_LOG=helix_planner=debug cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn planner_with(config: &PlannerConfig) -> Planner {
    init_tracing();
    let mut tp = Planner::new(config);
    tp.set_cycle_time(DT).unwrap();
    tp.set_vmax(1000.0, 1000.0).unwrap();
    tp.set_vlimit(1000.0);
    tp.set_amax(1000.0).unwrap();
    tp
}

fn planner() -> Planner {
    planner_with(&PlannerConfig::default())
}

fn pose(x: f64, y: f64, z: f64) -> Pose {
    Pose {
        tran: Cart::new(x, y, z),
        ..Pose::ZERO
    }
}

/// Tick until done, recording the trajectory. Panics if the planner does
/// not finish within `max_ticks`.
fn drive(
    tp: &mut Planner,
    status: &mut StatusBlock,
    max_ticks: usize,
) -> Vec<(Pose, f64)> {
    let mut io = NullIo;
    let mut trace = Vec::new();
    for _ in 0..max_ticks {
        tp.run_tick(status, &mut io);
        trace.push((tp.position(), status.current_vel));
        if tp.is_done() {
            return trace;
        }
    }
    panic!("planner did not finish within {max_ticks} ticks");
}

// ── Scenario: single line ───────────────────────────────────────────

#[test]
fn single_line_profile() {
    let mut tp = planner();
    tp.add_line(pose(10.0, 0.0, 0.0), CanonKind::Feed, 100.0, 200.0, 1000.0, 0, false, None)
        .unwrap();

    let mut status = StatusBlock::default();
    let trace = drive(&mut tp, &mut status, 5000);

    // Final pose on the commanded end.
    let last = trace.last().unwrap().0;
    assert!((last.tran.x - 10.0).abs() < 1e-6, "final x {}", last.tran.x);

    // Peak velocity equals the request, never exceeds it.
    let peak = trace.iter().map(|t| t.1).fold(0.0_f64, f64::max);
    assert!(peak <= 100.0 + 1e-6, "peak {peak}");
    assert!(peak > 99.0, "peak {peak}");

    // Monotonic progress along x.
    for pair in trace.windows(2) {
        assert!(pair[1].0.tran.x >= pair[0].0.tran.x - 1e-12);
    }

    // Acceleration bounded by the segment limit.
    let mut prev_vel = 0.0;
    for (_, vel) in &trace {
        assert!(
            ((vel - prev_vel) / DT).abs() <= 1000.0 + 1e-3,
            "accel {}",
            (vel - prev_vel) / DT
        );
        prev_vel = *vel;
    }
}

// ── Scenario: two collinear lines ───────────────────────────────────

#[test]
fn collinear_lines_blend_without_stopping() {
    let mut tp = planner();
    tp.set_term_cond(TermCond::Parabolic, 0.0).unwrap();
    tp.add_line(pose(5.0, 0.0, 0.0), CanonKind::Feed, 100.0, 200.0, 1000.0, 0, false, None)
        .unwrap();
    tp.add_line(pose(10.0, 0.0, 0.0), CanonKind::Feed, 100.0, 200.0, 1000.0, 0, false, None)
        .unwrap();

    let mut status = StatusBlock::default();
    let trace = drive(&mut tp, &mut status, 5000);

    let last = trace.last().unwrap().0;
    assert!((last.tran.x - 10.0).abs() < 1e-6);

    // Velocity at the segment boundary stays near cruise: no dip to zero.
    let boundary_vel = trace
        .iter()
        .find(|(p, _)| p.tran.x >= 5.0)
        .map(|(_, v)| *v)
        .unwrap();
    assert!(boundary_vel > 90.0, "boundary velocity {boundary_vel}");
}

// ── Scenario: corner blending ───────────────────────────────────────

#[test]
fn right_angle_corner_with_blend_arc() {
    let cfg = PlannerConfig {
        enable_blend_arcs: true,
        ..Default::default()
    };
    let mut tp = planner_with(&cfg);
    tp.set_term_cond(TermCond::Parabolic, 0.1).unwrap();
    tp.add_line(pose(10.0, 0.0, 0.0), CanonKind::Feed, 10.0, 200.0, 1000.0, 0, false, None)
        .unwrap();
    tp.add_line(pose(10.0, 10.0, 0.0), CanonKind::Feed, 10.0, 200.0, 1000.0, 0, false, None)
        .unwrap();

    // The corner was replaced: trimmed line, arc, trimmed line.
    assert_eq!(tp.queue_depth(), 3);

    let mut status = StatusBlock::default();
    let trace = drive(&mut tp, &mut status, 20_000);

    let last = trace.last().unwrap().0;
    assert!((last.tran.x - 10.0).abs() < 1e-6);
    assert!((last.tran.y - 10.0).abs() < 1e-6);

    // The path never strays further than the tolerance from the corner
    // along the cut, and it passes within tolerance of the corner point.
    let corner = Cart::new(10.0, 0.0, 0.0);
    let closest = trace
        .iter()
        .map(|(p, _)| (p.tran - corner).mag())
        .fold(f64::MAX, f64::min);
    assert!(closest <= 0.1 + 1e-6, "closest approach {closest}");

    // No velocity excursion above the request through the corner.
    let peak = trace.iter().map(|t| t.1).fold(0.0_f64, f64::max);
    assert!(peak <= 10.0 + 1e-6, "peak {peak}");

    // And the corner is carried at speed: no stop in the middle section.
    let mid_min = trace
        .iter()
        .filter(|(p, _)| p.tran.x > 5.0 && p.tran.y < 5.0)
        .map(|(_, v)| *v)
        .fold(f64::MAX, f64::min);
    assert!(mid_min > 5.0, "mid-trajectory velocity dipped to {mid_min}");
}

#[test]
fn downward_corner_also_blends() {
    let cfg = PlannerConfig {
        enable_blend_arcs: true,
        ..Default::default()
    };
    let mut tp = planner_with(&cfg);
    tp.set_term_cond(TermCond::Parabolic, 0.1).unwrap();
    tp.add_line(pose(10.0, 0.0, 0.0), CanonKind::Feed, 10.0, 200.0, 1000.0, 0, false, None)
        .unwrap();
    tp.add_line(pose(10.0, -10.0, 0.0), CanonKind::Feed, 10.0, 200.0, 1000.0, 0, false, None)
        .unwrap();

    assert_eq!(tp.queue_depth(), 3);

    let mut status = StatusBlock::default();
    let trace = drive(&mut tp, &mut status, 20_000);
    let last = trace.last().unwrap().0;
    assert!((last.tran.y + 10.0).abs() < 1e-6);
}

#[test]
fn straight_continuation_promotes_tangent_without_arc() {
    let cfg = PlannerConfig {
        enable_blend_arcs: true,
        ..Default::default()
    };
    let mut tp = planner_with(&cfg);
    tp.set_term_cond(TermCond::Parabolic, 0.1).unwrap();
    tp.add_line(pose(10.0, 0.0, 0.0), CanonKind::Feed, 10.0, 200.0, 1000.0, 0, false, None)
        .unwrap();
    // Continuation is collinear to within numerical noise.
    tp.add_line(pose(20.0, 1e-9, 0.0), CanonKind::Feed, 10.0, 200.0, 1000.0, 0, false, None)
        .unwrap();

    // No arc spliced; the first segment was promoted instead.
    assert_eq!(tp.queue_depth(), 2);

    let mut status = StatusBlock::default();
    let trace = drive(&mut tp, &mut status, 20_000);
    let boundary_vel = trace
        .iter()
        .find(|(p, _)| p.tran.x >= 10.0)
        .map(|(_, v)| *v)
        .unwrap();
    assert!(boundary_vel > 9.0, "boundary velocity {boundary_vel}");
}

#[test]
fn full_reversal_declines_arc() {
    let cfg = PlannerConfig {
        enable_blend_arcs: true,
        ..Default::default()
    };
    let mut tp = planner_with(&cfg);
    tp.set_term_cond(TermCond::Parabolic, 0.1).unwrap();
    tp.add_line(pose(10.0, 0.0, 0.0), CanonKind::Feed, 10.0, 200.0, 1000.0, 0, false, None)
        .unwrap();
    tp.add_line(pose(0.0, 0.0, 0.0), CanonKind::Feed, 10.0, 200.0, 1000.0, 0, false, None)
        .unwrap();

    // No arc possible on a 180° reversal; both lines stay whole.
    assert_eq!(tp.queue_depth(), 2);

    let mut status = StatusBlock::default();
    let trace = drive(&mut tp, &mut status, 20_000);
    let last = trace.last().unwrap().0;
    assert!(last.tran.x.abs() < 1e-6, "final x {}", last.tran.x);

    // The reversal point is actually reached.
    let max_x = trace
        .iter()
        .map(|(p, _)| p.tran.x)
        .fold(f64::MIN, f64::max);
    assert!((max_x - 10.0).abs() < 0.1, "turnaround at {max_x}");
}

// ── Scenario: queue full recovery ───────────────────────────────────

#[test]
fn queue_full_recovers_after_consumption() {
    let cfg = PlannerConfig {
        queue_size: 2,
        ..Default::default()
    };
    let mut tp = planner_with(&cfg);
    tp.add_line(pose(1.0, 0.0, 0.0), CanonKind::Feed, 50.0, 100.0, 1000.0, 0, false, None)
        .unwrap();
    tp.add_line(pose(2.0, 0.0, 0.0), CanonKind::Feed, 50.0, 100.0, 1000.0, 0, false, None)
        .unwrap();
    assert!(tp
        .add_line(pose(3.0, 0.0, 0.0), CanonKind::Feed, 50.0, 100.0, 1000.0, 0, false, None)
        .is_err());

    // Consume the first segment, then the append succeeds.
    let mut status = StatusBlock::default();
    let mut io = NullIo;
    let mut appended = false;
    for _ in 0..20_000 {
        tp.run_tick(&mut status, &mut io);
        if !appended
            && tp
                .add_line(pose(3.0, 0.0, 0.0), CanonKind::Feed, 50.0, 100.0, 1000.0, 0, false, None)
                .is_ok()
        {
            appended = true;
        }
        if tp.is_done() {
            break;
        }
    }
    assert!(appended, "append never succeeded");
    assert!(tp.is_done());
    assert!((tp.position().tran.x - 3.0).abs() < 1e-6);
}

// ── Scenario: pause / resume ────────────────────────────────────────

#[test]
fn pause_mid_motion_then_resume() {
    let mut tp = planner();
    tp.add_line(pose(10.0, 0.0, 0.0), CanonKind::Feed, 100.0, 200.0, 1000.0, 0, false, None)
        .unwrap();

    let mut status = StatusBlock::default();
    let mut io = NullIo;

    // Run until roughly halfway.
    while tp.position().tran.x < 5.0 {
        tp.run_tick(&mut status, &mut io);
    }
    tp.pause();

    // Velocity must drain to zero within maxvel/amax plus one period.
    let drain_ticks = ((100.0 / 1000.0) / DT).ceil() as usize + 2;
    for _ in 0..drain_ticks {
        tp.run_tick(&mut status, &mut io);
    }
    assert_eq!(status.current_vel, 0.0, "still moving after pause drain");
    let paused_at = tp.position().tran.x;
    assert!(paused_at < 10.0);
    assert!(!tp.is_done());

    // Progress is retained across the pause.
    for _ in 0..50 {
        tp.run_tick(&mut status, &mut io);
    }
    assert_eq!(tp.position().tran.x, paused_at);

    tp.resume();
    let trace = drive(&mut tp, &mut status, 20_000);
    assert!((trace.last().unwrap().0.tran.x - 10.0).abs() < 1e-6);
}

#[test]
fn pause_resume_on_empty_queue_is_noop() {
    let mut tp = planner();
    let mut status = StatusBlock::default();
    let mut io = NullIo;

    tp.pause();
    tp.run_tick(&mut status, &mut io);
    tp.resume();
    tp.run_tick(&mut status, &mut io);

    assert!(tp.is_done());
    assert_eq!(tp.position(), Pose::ZERO);
}

// ── Scenario: feed override ─────────────────────────────────────────

#[test]
fn zero_feed_override_freezes_motion() {
    let mut tp = planner();
    tp.add_line(pose(10.0, 0.0, 0.0), CanonKind::Feed, 100.0, 200.0, 1000.0, 0, false, None)
        .unwrap();

    let mut status = StatusBlock::default();
    let mut io = NullIo;
    while tp.position().tran.x < 3.0 {
        tp.run_tick(&mut status, &mut io);
    }

    status.net_feed_scale = 0.0;
    for _ in 0..500 {
        tp.run_tick(&mut status, &mut io);
    }
    assert_eq!(status.current_vel, 0.0);
    let frozen_at = tp.position().tran.x;
    assert!(frozen_at < 10.0);

    status.net_feed_scale = 1.0;
    let trace = drive(&mut tp, &mut status, 20_000);
    assert!((trace.last().unwrap().0.tran.x - 10.0).abs() < 1e-6);
    assert!(trace.last().unwrap().0.tran.x > frozen_at);
}

// ── Scenario: rigid tap ─────────────────────────────────────────────

/// Synthetic spindle: first-order approach to the commanded speed, with an
/// encoder that counts revolutions (down again when reversed).
struct SpindleSim {
    velocity: f64,
    accel: f64,
}

impl SpindleSim {
    fn new() -> Self {
        Self {
            velocity: 0.0,
            accel: 200.0, // revs/s²
        }
    }

    fn tick(&mut self, status: &mut StatusBlock) {
        let commanded = status.spindle.speed;
        let dv = (commanded - self.velocity).clamp(-self.accel * DT, self.accel * DT);
        self.velocity += dv;
        status.spindle.revs += self.velocity * DT;
        status.spindle.speed_in = self.velocity;
        status.spindle.is_atspeed = true;
    }
}

#[test]
fn rigid_tap_full_cycle() {
    let mut tp = planner();
    tp.set_spindle_sync(0.1, false);
    tp.add_rigid_tap(pose(0.0, 0.0, 10.0), 10.0, 50.0, 1000.0, 0)
        .unwrap();

    let mut status = StatusBlock {
        spindle: helix_common::status::SpindleStatus {
            speed: 10.0, // revs/s, 0.1 uu/rev → 1 uu/s feed at speed
            ..Default::default()
        },
        ..Default::default()
    };
    let mut io = NullIo;
    let mut spindle = SpindleSim::new();

    let mut index_countdown = None;
    let mut max_depth: f64 = 0.0;
    let mut done = false;

    for _ in 0..400_000 {
        spindle.tick(&mut status);

        // Hardware index latch: the encoder zeroes a few ticks after the
        // planner requests it.
        if status.spindle.index_enable && index_countdown.is_none() {
            index_countdown = Some(5);
        }
        if let Some(n) = index_countdown {
            if n == 0 {
                status.spindle.revs = 0.0;
                status.spindle.index_enable = false;
                index_countdown = None;
            } else {
                index_countdown = Some(n - 1);
            }
        }

        tp.run_tick(&mut status, &mut io);
        max_depth = max_depth.max(tp.position().tran.z);
        if tp.is_done() && max_depth > 0.0 {
            done = true;
            break;
        }
    }

    assert!(done, "tap cycle never finished");
    // The tool went at least to the reversal depth (plus some overrun).
    assert!(max_depth >= 10.0, "max depth {max_depth}");
    // And came back to the exact start.
    let final_pos = tp.position();
    assert!(
        final_pos.tran.z.abs() < 1e-6,
        "final z {}",
        final_pos.tran.z
    );
    // The spindle was commanded back to forward.
    assert!(status.spindle.speed > 0.0);
}
