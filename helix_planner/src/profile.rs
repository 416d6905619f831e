//! Per-tick trapezoidal velocity profiler.
//!
//! Advances one segment by one servo period under a trapezoidal profile
//! that may terminate at non-zero velocity: the new velocity is chosen so
//! that decelerating at the segment's scaled limit just reaches `target`
//! at `finalvel`. Overshoot (negative discriminant) is recovered locally
//! by snapping to the target — never propagated as an error.

use helix_common::consts::FINAL_DECEL_EPSILON;
use helix_common::state::{CanonKind, SyncMode, TermCond};

use crate::segment::Segment;

/// Planner-wide values the profiler needs each tick, copied out of the
/// planner so segment borrows stay narrow.
#[derive(Debug, Clone, Copy)]
pub struct TickCtx {
    /// Servo period [s].
    pub cycle_time: f64,
    /// Tool-tip velocity ceiling (applies to non-rotary, non-position-sync
    /// motion).
    pub v_limit: f64,
    pub pausing: bool,
    pub aborting: bool,
    /// Net feed-rate scale from the host.
    pub net_feed_scale: f64,
}

/// Result of one profiler step.
#[derive(Debug, Clone, Copy)]
pub struct CycleOutcome {
    /// Velocity after this tick.
    pub velocity: f64,
    /// The segment is on its final deceleration ramp.
    pub on_final_decel: bool,
}

/// Feed-rate override applied to a segment's requested velocity.
///
/// Rapids and position-synchronised moves ignore the override entirely;
/// pausing or aborting forces it to zero so motion drains to rest.
#[inline]
pub fn feed_override(ctx: &TickCtx, tc: &Segment) -> f64 {
    if tc.canon_kind == CanonKind::Traverse || tc.sync == SyncMode::Position {
        1.0
    } else if ctx.pausing || ctx.aborting {
        0.0
    } else {
        ctx.net_feed_scale
    }
}

/// Acceleration limit after the blend scale is applied.
#[inline]
pub fn scaled_accel(tc: &Segment) -> f64 {
    if tc.accel_scale < 0.0 {
        return 0.0;
    }
    tc.maxaccel * tc.accel_scale
}

/// Clip `x` to ±`max`. Unlike `f64::clamp` this tolerates a non-positive
/// `max` (the cycle driver must never panic).
#[inline]
fn saturate(x: f64, max: f64) -> f64 {
    if x > max {
        max
    } else if x < -max {
        -max
    } else {
        x
    }
}

/// Advance `tc` by one servo period, updating `progress` and `currentvel`.
pub fn run_segment_cycle(ctx: &TickCtx, tc: &mut Segment) -> CycleOutcome {
    let mut req_vel = tc.reqvel * feed_override(ctx, tc);
    let mut final_vel = tc.finalvel * feed_override(ctx, tc);

    if req_vel > tc.maxvel {
        req_vel = tc.maxvel;
    }
    if final_vel > req_vel {
        final_vel = req_vel;
    }
    // A pause must be able to plan all the way down to rest.
    if ctx.pausing {
        final_vel = 0.0;
    }

    if !tc.blending {
        tc.vel_at_blend_start = tc.currentvel;
    }

    let delta_pos = tc.target - tc.progress;
    let maxaccel = scaled_accel(tc);
    let dt = tc.cycle_time;

    // Choose newvel so that decelerating at maxaccel from here just
    // reaches target at final_vel.
    let discr = final_vel * final_vel
        + maxaccel * (2.0 * delta_pos - tc.currentvel * dt)
        + (maxaccel * dt / 2.0) * (maxaccel * dt / 2.0);

    // A negative discriminant means we have overshot (or are about to);
    // recover as well as we can.
    let maxnewvel = if discr < 0.0 {
        0.0
    } else {
        -0.5 * maxaccel * dt + discr.sqrt()
    };
    let mut newvel = maxnewvel;

    if newvel > req_vel {
        newvel = req_vel;
    }

    if newvel < 0.0 {
        newvel = 0.0;
        // Not handing over tangentially: discard the overshoot and force
        // an exact stop at the target.
        if tc.term_cond != TermCond::Tangent || tc.progress < tc.target {
            tc.progress = tc.target;
        }
        tc.currentvel = newvel;
    } else {
        // Tool-tip velocity cap, except for angular-unit moves and
        // position-synced motion (which must track the spindle).
        if !tc.is_pure_rotary() && tc.sync != SyncMode::Position && newvel > ctx.v_limit {
            newvel = ctx.v_limit;
        }

        // Saturate the acceleration needed to reach newvel.
        let newaccel = saturate((newvel - tc.currentvel) / dt, maxaccel);
        newvel = tc.currentvel + newaccel * dt;

        // Trapezoidal integration. Progress may exceed target here; a
        // tangent successor absorbs the difference.
        tc.progress += (newvel + tc.currentvel) * 0.5 * dt;
        tc.currentvel = newvel;
    }

    CycleOutcome {
        velocity: newvel,
        on_final_decel: (maxnewvel - newvel).abs() < FINAL_DECEL_EPSILON,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
