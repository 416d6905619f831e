//! Compact state enums shared across the Helix workspace.
//!
//! All enums use `#[repr(u8)]` for compact memory layout and stable
//! numbering toward the embedding host. `Stop` must stay zero: the cycle
//! driver relies on "non-zero termination condition" meaning a follower
//! may be fetched.

use serde::{Deserialize, Serialize};

/// What kind of motion a queued segment performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SegmentKind {
    /// Coordinated straight move across any of the nine axes.
    Line = 1,
    /// Circular / helical move in XYZ with linear ABC/UVW follow-through.
    Circle = 2,
    /// Spindle-synchronised tapping cycle with reversal.
    RigidTap = 3,
}

/// How a segment hands over to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TermCond {
    /// Decelerate to rest before the next segment starts.
    Stop = 0,
    /// Velocity-summation blend while this segment decelerates.
    Parabolic = 1,
    /// Successor continues at this segment's final velocity.
    Tangent = 2,
}

impl TermCond {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stop),
            1 => Some(Self::Parabolic),
            2 => Some(Self::Tangent),
            _ => None,
        }
    }
}

impl Default for TermCond {
    fn default() -> Self {
        Self::Parabolic
    }
}

/// Spindle synchronisation mode of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SyncMode {
    /// Free-running motion.
    None = 0,
    /// Requested velocity follows spindle speed (feed-per-rev).
    Velocity = 1,
    /// Progress tracks spindle position (threading, tapping).
    Position = 2,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::None
    }
}

/// Canonical motion classification for status reporting.
///
/// `None` is also what the status shows mid-blend, when no single segment
/// owns the motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CanonKind {
    None = 0,
    /// Rapid positioning — feed override does not apply.
    Traverse = 1,
    /// Feed-rate machining move.
    Feed = 2,
    /// Arc feed move.
    Arc = 3,
}

impl Default for CanonKind {
    fn default() -> Self {
        Self::None
    }
}

/// Phase of a rigid-tap cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TapState {
    /// Feeding into the hole, synchronised to the spindle.
    Tapping = 0,
    /// Reversal commanded, waiting for the spindle to actually reverse.
    Reversing = 1,
    /// Withdrawing along the reverse line.
    Retraction = 2,
    /// Second reversal commanded near the top of the hole.
    FinalReversal = 3,
    /// Unsynchronised positioning back to the exact start point.
    FinalPlacement = 4,
}

impl Default for TapState {
    fn default() -> Self {
        Self::Tapping
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_cond_round_trip() {
        for cond in [TermCond::Stop, TermCond::Parabolic, TermCond::Tangent] {
            assert_eq!(TermCond::from_u8(cond as u8), Some(cond));
        }
        assert_eq!(TermCond::from_u8(7), None);
    }

    #[test]
    fn stop_is_zero() {
        assert_eq!(TermCond::Stop as u8, 0);
        assert_eq!(SyncMode::None as u8, 0);
        assert_eq!(CanonKind::None as u8, 0);
    }
}
