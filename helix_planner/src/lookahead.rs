//! Look-ahead final-velocity optimisation.
//!
//! A "rising tide" pass: walk the queue from the most recently appended
//! segment backwards and raise each predecessor's allowed final velocity
//! to the highest speed from which the successor can still decelerate to
//! its own final velocity within its length. The walk stops at the first
//! non-tangent boundary (final velocity stays zero there), at a segment
//! already executing, or at a chain peak. No forward pass is needed: the
//! profiler re-checks deceleration feasibility every tick.

use tracing::trace;

use helix_common::state::TermCond;

use crate::profile::scaled_accel;
use crate::queue::SegmentQueue;

/// Propagate reachable final velocities backwards from the queue tail,
/// visiting at most `depth` segment pairs.
pub fn run_optimization(queue: &mut SegmentQueue, depth: usize) {
    let len = queue.len();
    if len < 2 {
        return;
    }

    for x in 1..depth {
        if x > len - 1 {
            break;
        }
        let ind = len - x;

        let Some((prev_tc, tc)) = queue.pair_mut(ind - 1, ind) else {
            break;
        };

        // A parabolic or exact-stop boundary resets the chain.
        if prev_tc.term_cond != TermCond::Tangent {
            break;
        }

        // Already executing: its final velocity is spoken for.
        if prev_tc.progress > 0.0 {
            trace!(id = prev_tc.id, progress = prev_tc.progress, "segment already started");
            break;
        }

        // Highest entry speed from which tc can still decelerate to its
        // own final velocity over its full length.
        let acc = scaled_accel(tc);
        let vs = (tc.finalvel * tc.finalvel + 2.0 * acc * tc.target).sqrt();

        if vs >= tc.maxvel {
            // The chain is velocity-limited here; no point looking deeper.
            prev_tc.finalvel = tc.maxvel;
            prev_tc.atpeak = true;
            trace!(id = prev_tc.id, finalvel = prev_tc.finalvel, "found peak");
        } else {
            prev_tc.finalvel = vs;
            prev_tc.atpeak = false;
        }

        if tc.atpeak {
            break;
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
