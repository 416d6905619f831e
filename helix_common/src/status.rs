//! Status and spindle I/O structures exchanged with the real-time host.
//!
//! The planner reads machine inputs (spindle feedback, feed scale) from a
//! [`StatusBlock`] at the top of each tick and publishes motion status back
//! into it at the bottom. The block is plain data: the host owns transport
//! (shared memory, message passing) and visibility ordering.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

use crate::pose::Pose;

/// Number of stageable digital outputs.
pub const MAX_DIO: usize = 64;

/// Number of stageable analog outputs.
pub const MAX_AIO: usize = 16;

// Mask words are u64, one bit per channel.
const_assert!(MAX_DIO <= 64);
const_assert!(MAX_AIO <= 64);

// ─── DIO batch ──────────────────────────────────────────────────────

/// A staged batch of digital/analog output changes.
///
/// Written by the producer-side `set_dout`/`set_aout` calls, snapshotted
/// into the next queued segment, and applied by the cycle driver once the
/// segment becomes the primary motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DioBatch {
    /// Anything staged at all (cheap emptiness check).
    pub any_changed: bool,
    /// One bit per staged digital channel.
    pub dio_mask: u64,
    /// One bit per staged analog channel.
    pub aio_mask: u64,
    /// +1 = switch on, -1 = switch off, 0 = untouched.
    pub dios: [i8; MAX_DIO],
    /// Value to write per staged analog channel.
    pub aios: [f64; MAX_AIO],
}

impl Default for DioBatch {
    fn default() -> Self {
        Self {
            any_changed: false,
            dio_mask: 0,
            aio_mask: 0,
            dios: [0; MAX_DIO],
            aios: [0.0; MAX_AIO],
        }
    }
}

impl DioBatch {
    /// Drop everything staged.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Stage a digital output change.
    pub fn stage_dio(&mut self, index: usize, on: bool) {
        if index >= MAX_DIO {
            return;
        }
        self.any_changed = true;
        self.dio_mask |= 1 << index;
        self.dios[index] = if on { 1 } else { -1 };
    }

    /// Stage an analog output value.
    pub fn stage_aio(&mut self, index: usize, value: f64) {
        if index >= MAX_AIO {
            return;
        }
        self.any_changed = true;
        self.aio_mask |= 1 << index;
        self.aios[index] = value;
    }
}

// ─── Spindle ────────────────────────────────────────────────────────

/// Spindle feedback and handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpindleStatus {
    /// Accumulated revolutions from the encoder (unsigned magnitude).
    pub revs: f64,
    /// Rotation sign: +1 forward, -1 reverse.
    pub direction: i8,
    /// Commanded spindle speed. The rigid-tap cycle flips its sign to
    /// request reversals.
    pub speed: f64,
    /// Measured spindle speed used for velocity-mode sync [revs/s].
    pub speed_in: f64,
    /// Spindle has reached its commanded speed.
    pub is_atspeed: bool,
    /// Index-latch handshake: the planner raises it to request an encoder
    /// index reset; the hardware clears it once the index has passed.
    pub index_enable: bool,
}

impl Default for SpindleStatus {
    fn default() -> Self {
        Self {
            revs: 0.0,
            direction: 1,
            speed: 0.0,
            speed_in: 0.0,
            is_atspeed: true,
            index_enable: false,
        }
    }
}

impl SpindleStatus {
    /// Encoder position with the rotation sign applied.
    #[inline]
    pub fn signed_position(&self) -> f64 {
        if self.direction < 0 {
            -self.revs
        } else {
            self.revs
        }
    }
}

// ─── Status block ───────────────────────────────────────────────────

/// Status shared between the planner and the embedding host.
///
/// Inputs are refreshed by the host before each tick; outputs are written
/// by the cycle driver at the end of each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusBlock {
    // ── Inputs ──
    /// Spindle feedback and handshakes (partly written back by the planner).
    pub spindle: SpindleStatus,
    /// Net feed-rate scale applied to non-traverse moves.
    pub net_feed_scale: f64,
    /// Single-stepping: suppress look-at-next so each segment ends at rest.
    pub stepping: bool,
    /// Enable flags to report while no motion is queued.
    pub enables_new: u8,

    // ── Outputs ──
    /// Tool-tip velocity this tick (sum of both segments mid-blend).
    pub current_vel: f64,
    /// Requested velocity of the primary segment.
    pub requested_vel: f64,
    /// Scalar distance to go on the primary segment.
    pub distance_to_go: f64,
    /// Per-axis distance to go.
    pub dtg: Pose,
    /// Enable flags of the primary segment.
    pub enables_queued: u8,
    /// Spindle-position sync established.
    pub spindle_sync: bool,
    /// Current motion queue depth.
    pub queue_len: usize,
}

impl Default for StatusBlock {
    fn default() -> Self {
        Self {
            spindle: SpindleStatus::default(),
            net_feed_scale: 1.0,
            stepping: false,
            enables_new: 0,
            current_vel: 0.0,
            requested_vel: 0.0,
            distance_to_go: 0.0,
            dtg: Pose::ZERO,
            enables_queued: 0,
            spindle_sync: false,
            queue_len: 0,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
