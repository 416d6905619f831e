//! Spindle synchronisation controllers.
//!
//! Velocity mode slaves the requested velocity to the measured spindle
//! speed (feed-per-rev). Position mode servos segment progress onto the
//! spindle position: an initial acceleration phase chases the spindle as
//! fast as the segment allows, latches the offset the moment the
//! velocities match, and then tracks with a square-root error-correction
//! term.

use tracing::trace;

use helix_common::state::TapState;

use crate::profile::scaled_accel;
use crate::segment::{Segment, SegmentGeometry};

/// Planner-side spindle bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpindleTracking {
    /// Revolutions consumed by previously completed synchronised segments.
    pub offset: f64,
    /// Effective spindle revolutions seen on the last tick.
    pub revs: f64,
    /// Segment id stalled waiting for the encoder index, if any.
    pub waiting_for_index: Option<i32>,
    /// Segment id stalled waiting for spindle at-speed, if any.
    pub waiting_for_atspeed: Option<i32>,
}

impl Default for SpindleTracking {
    fn default() -> Self {
        Self {
            offset: 0.0,
            revs: 0.0,
            waiting_for_index: None,
            waiting_for_atspeed: None,
        }
    }
}

/// Velocity-mode sync: requested velocity follows spindle speed scaled by
/// the feed per revolution, less whatever the follower has already moved
/// during a blend. A follower that has run ahead leaves the request
/// negative, which the profiler answers by slowing down.
pub fn sync_velocity_mode(tc: &mut Segment, nexttc: Option<&Segment>, spindle_speed_in: f64) {
    let mut pos_error = spindle_speed_in.abs() * tc.uu_per_rev;
    if let Some(next) = nexttc {
        pos_error -= next.progress;
    }
    tc.reqvel = pos_error;
}

/// Position-mode sync: servo segment progress onto the spindle position.
pub fn sync_position_mode(
    tracking: &mut SpindleTracking,
    tc: &mut Segment,
    nexttc: Option<&Segment>,
    signed_spindle_pos: f64,
) {
    let oldrevs = tracking.revs;

    // While a rigid tap runs backwards, the encoder counts down from the
    // reversal point; flip to an effective forward count.
    let revs = match &tc.geometry {
        SegmentGeometry::RigidTap(tap)
            if tap.state == TapState::Retraction || tap.state == TapState::FinalReversal =>
        {
            tap.spindlerevs_at_reversal - signed_spindle_pos
        }
        _ => signed_spindle_pos,
    };
    tracking.revs = revs;

    let mut pos_error = (revs - tracking.offset) * tc.uu_per_rev - tc.progress;
    if let Some(next) = nexttc {
        pos_error -= next.progress;
    }

    if tc.sync_accel > 0 {
        // Still accelerating to match the spindle: detect the moment the
        // velocities cross and re-home the offset so the position error
        // vanishes on the next cycle.
        let spindle_vel = revs / (tc.cycle_time * tc.sync_accel as f64);
        tc.sync_accel += 1;
        let target_vel = spindle_vel * tc.uu_per_rev;
        if tc.currentvel >= target_vel {
            tracking.offset = revs - tc.progress / tc.uu_per_rev;
            tc.sync_accel = 0;
            tc.reqvel = target_vel;
            trace!(offset = tracking.offset, "position sync latched");
        } else {
            // Behind the spindle: chase as fast as the segment allows.
            tc.reqvel = tc.maxvel;
        }
    } else {
        // Steady state: track the spindle velocity with a square-root
        // correction toward zero position error.
        let spindle_vel = (revs - oldrevs) / tc.cycle_time;
        let target_vel = spindle_vel * tc.uu_per_rev;
        let mut errorvel = (pos_error.abs() * scaled_accel(tc)).sqrt();
        if pos_error < 0.0 {
            errorvel = -errorvel;
        }
        tc.reqvel = target_vel + errorvel;
    }

    if tc.reqvel < 0.0 {
        tc.reqvel = 0.0;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
