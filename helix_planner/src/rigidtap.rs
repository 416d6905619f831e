//! Rigid-tap cycle state machine.
//!
//! Tapping → Reversing → Retraction → FinalReversal → FinalPlacement,
//! gated on the signed spindle position. The tool feeds in synchronised to
//! the spindle, commands a reversal at the thread bottom, follows the
//! spindle back out, and finishes with an ordinary unsynchronised move to
//! the exact start point. Targets and progress are rewritten at each
//! reversal because the direction of travel flips.

use tracing::{debug, trace};

use helix_common::consts::TAP_OVERRUN_REVS;
use helix_common::geometry::CartLine;
use helix_common::state::{SyncMode, TapState};
use helix_common::status::SpindleStatus;

use crate::segment::{Segment, SegmentGeometry};

/// Advance the rigid-tap state machine by one tick.
///
/// May flip the commanded spindle speed (requesting a reversal), rebuild
/// the auxiliary traversal line, and reset `target`/`progress` for the
/// next leg. `spindle_offset` is the planner's accumulated spindle offset,
/// folded into the position captured at the first reversal.
pub fn advance_rigid_tap(tc: &mut Segment, spindle: &mut SpindleStatus, spindle_offset: f64) {
    let new_spindle_pos = spindle.signed_position();

    // The geometry update below needs scalar fields from the segment, so
    // pull the tap coordinates out by value and write them back.
    let SegmentGeometry::RigidTap(mut tap) = tc.geometry else {
        return;
    };

    match tap.state {
        TapState::Tapping => {
            trace!(progress = tc.progress, "tapping");
            if tc.progress >= tap.reversal_target {
                // Thread bottom reached: command the reversal.
                spindle.speed *= -1.0;
                tap.state = TapState::Reversing;
            }
        }
        TapState::Reversing => {
            if new_spindle_pos < tap.last_spindle_pos {
                // The spindle has stopped and reversed; retract from
                // wherever the overrun carried us back to the start.
                tap.spindlerevs_at_reversal = new_spindle_pos + spindle_offset;

                let start = tap.xyz.point(tc.progress);
                let end = tap.xyz.start;
                tap.aux_xyz = CartLine::new(start, end);

                debug!(old_target = tc.target, "spindle reversed");
                tap.reversal_target = tap.aux_xyz.mag;
                tc.target = tap.aux_xyz.mag + TAP_OVERRUN_REVS * tc.uu_per_rev;
                tc.progress = 0.0;
                debug!(new_target = tc.target, "retraction leg begins");

                tap.state = TapState::Retraction;
            }
            tap.last_spindle_pos = new_spindle_pos;
            trace!(spindle_pos = new_spindle_pos, "waiting for reversal");
        }
        TapState::Retraction => {
            if tc.progress >= tap.reversal_target {
                // Clear of the hole: bring the spindle back to forward.
                spindle.speed *= -1.0;
                tap.state = TapState::FinalReversal;
            }
        }
        TapState::FinalReversal => {
            if new_spindle_pos > tap.last_spindle_pos {
                // Forward again; close the remaining gap to the start
                // point as a plain positioning move.
                let start = tap.aux_xyz.point(tc.progress);
                let end = tap.xyz.start;
                tap.aux_xyz = CartLine::new(start, end);

                tc.target = tap.aux_xyz.mag;
                tc.progress = 0.0;
                tc.sync = SyncMode::None;
                tc.reqvel = tc.maxvel;

                tap.state = TapState::FinalPlacement;
            }
            tap.last_spindle_pos = new_spindle_pos;
        }
        TapState::FinalPlacement => {
            // Ordinary profiled move; terminates at target like any other.
        }
    }

    tc.geometry = SegmentGeometry::RigidTap(tap);
}

// ─── Tests ──────────────────────────────────────────────────────────
