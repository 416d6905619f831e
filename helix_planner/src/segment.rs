//! One executable motion segment (TC).
//!
//! A segment pairs kind-specific geometry with the kinematic state the
//! profiler advances every tick: `target` (total arclength), `progress`
//! (arclength travelled), velocities, and acceleration limits. The
//! profiler only ever touches the scalar state; position queries dispatch
//! on the geometry.

use helix_common::geometry::{CartLine, Circle};
use helix_common::pose::{Cart, Pose};
use helix_common::state::{CanonKind, SegmentKind, SyncMode, TapState, TermCond};
use helix_common::status::DioBatch;

// ─── Geometry variants ──────────────────────────────────────────────

/// Line geometry: XYZ plus ABC/UVW travelled in parallel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineCoords {
    pub xyz: CartLine,
    pub abc: CartLine,
    pub uvw: CartLine,
}

/// Circle geometry: XYZ arc plus linear ABC/UVW follow-through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCoords {
    pub xyz: Circle,
    pub abc: CartLine,
    pub uvw: CartLine,
}

/// Rigid-tap geometry.
///
/// `xyz` is the downward tap line; `aux_xyz` is rebuilt at each reversal to
/// describe the current leg. The rotary and auxiliary axes hold still for
/// the whole cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTapCoords {
    pub xyz: CartLine,
    pub aux_xyz: CartLine,
    pub abc: Cart,
    pub uvw: Cart,
    pub state: TapState,
    /// Progress at which the current leg commands a spindle reversal.
    pub reversal_target: f64,
    /// Signed spindle position captured when the first reversal completed.
    pub spindlerevs_at_reversal: f64,
    /// Signed spindle position seen on the previous tick, for detecting
    /// the moment the spindle actually changes direction.
    pub last_spindle_pos: f64,
}

/// Kind-specific geometry of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentGeometry {
    Line(LineCoords),
    Circle(CircleCoords),
    RigidTap(RigidTapCoords),
}

// ─── Segment ────────────────────────────────────────────────────────

/// A queued motion segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Queue-assigned motion id (-1 until queued).
    pub id: i32,
    pub geometry: SegmentGeometry,
    /// Canonical classification for status reporting.
    pub canon_kind: CanonKind,

    /// Total arclength of the segment.
    pub target: f64,
    /// Arclength travelled so far.
    pub progress: f64,

    /// Feed-requested velocity before override scaling.
    pub reqvel: f64,
    /// Hard velocity ceiling (machine constraint and sample-rate cap).
    pub maxvel: f64,
    /// Velocity allowed at `target` (non-zero only before a tangent
    /// successor).
    pub finalvel: f64,
    /// Velocity at the end of the last tick.
    pub currentvel: f64,
    /// Acceleration limit before scaling.
    pub maxaccel: f64,
    /// Scale on `maxaccel`: 1.0 normally, 0.5 in parabolic blends, 1/√2
    /// for blend arcs.
    pub accel_scale: f64,
    /// Servo period captured at construction [s].
    pub cycle_time: f64,

    pub term_cond: TermCond,
    /// Path tolerance for blending; 0 means unlimited.
    pub tolerance: f64,

    pub sync: SyncMode,
    /// User units of feed per spindle revolution.
    pub uu_per_rev: f64,
    /// Cycle counter while position sync is still accelerating to match
    /// the spindle; 0 once latched.
    pub sync_accel: u32,

    /// Wait for the spindle to reach commanded speed before starting.
    pub atspeed: bool,
    /// Segment has been activated by the cycle driver.
    pub active: bool,
    /// Parabolic blend with the successor is in progress.
    pub blending: bool,
    /// Look-ahead found this segment velocity-limited (chain peak).
    pub atpeak: bool,

    /// Parabolic blend handover velocity computed each tick.
    pub blend_vel: f64,
    /// Velocity recorded when the blend began.
    pub vel_at_blend_start: f64,

    /// Enable flags forwarded to status while this segment is primary.
    pub enables: u8,
    /// Synchronised output changes applied when this segment becomes
    /// primary.
    pub syncdio: DioBatch,
    /// Indexing rotary axis to unlock before this move, if any.
    pub index_rotary: Option<u8>,
}

impl Default for Segment {
    fn default() -> Self {
        let zero_line = CartLine::new(Cart::ZERO, Cart::ZERO);
        Self {
            id: -1,
            geometry: SegmentGeometry::Line(LineCoords {
                xyz: zero_line,
                abc: zero_line,
                uvw: zero_line,
            }),
            canon_kind: CanonKind::None,
            target: 0.0,
            progress: 0.0,
            reqvel: 0.0,
            maxvel: 0.0,
            finalvel: 0.0,
            currentvel: 0.0,
            maxaccel: 0.0,
            accel_scale: 1.0,
            cycle_time: 0.0,
            term_cond: TermCond::Stop,
            tolerance: 0.0,
            sync: SyncMode::None,
            uu_per_rev: 0.0,
            sync_accel: 0,
            atspeed: false,
            active: false,
            blending: false,
            atpeak: false,
            blend_vel: 0.0,
            vel_at_blend_start: 0.0,
            enables: 0,
            syncdio: DioBatch::default(),
            index_rotary: None,
        }
    }
}

impl Segment {
    /// Motion kind of this segment.
    #[inline]
    pub fn kind(&self) -> SegmentKind {
        match self.geometry {
            SegmentGeometry::Line(_) => SegmentKind::Line,
            SegmentGeometry::Circle(_) => SegmentKind::Circle,
            SegmentGeometry::RigidTap(_) => SegmentKind::RigidTap,
        }
    }

    #[inline]
    pub fn is_synchronized(&self) -> bool {
        self.sync != SyncMode::None
    }

    /// A line that moves rotary axes only — its units are angular, so
    /// tool-tip velocity limits do not apply.
    pub fn is_pure_rotary(&self) -> bool {
        match &self.geometry {
            SegmentGeometry::Line(line) => line.xyz.mag_zero && line.uvw.mag_zero,
            _ => false,
        }
    }

    /// Pose after travelling `progress` units of arclength.
    ///
    /// Whichever sub-geometry owns the arclength parameterisation drives;
    /// the others follow proportionally.
    pub fn pos_at(&self, progress: f64) -> Pose {
        match &self.geometry {
            SegmentGeometry::Line(line) => {
                let (xyz, abc, uvw) = if !line.xyz.mag_zero {
                    (
                        line.xyz.point(progress),
                        line.abc.point(self.scaled(progress, line.abc.mag)),
                        line.uvw.point(self.scaled(progress, line.uvw.mag)),
                    )
                } else if !line.uvw.mag_zero {
                    (
                        line.xyz.start,
                        line.abc.point(self.scaled(progress, line.abc.mag)),
                        line.uvw.point(progress),
                    )
                } else {
                    (line.xyz.start, line.abc.point(progress), line.uvw.start)
                };
                Pose::from_parts(xyz, abc, uvw)
            }
            SegmentGeometry::Circle(circle) => {
                let phi = self.scaled(progress, circle.xyz.angle);
                Pose::from_parts(
                    circle.xyz.point(phi),
                    circle.abc.point(self.scaled(progress, circle.abc.mag)),
                    circle.uvw.point(self.scaled(progress, circle.uvw.mag)),
                )
            }
            SegmentGeometry::RigidTap(tap) => {
                let xyz = match tap.state {
                    TapState::Tapping | TapState::Reversing => tap.xyz.point(progress),
                    TapState::Retraction | TapState::FinalReversal | TapState::FinalPlacement => {
                        tap.aux_xyz.point(progress)
                    }
                };
                Pose::from_parts(xyz, tap.abc, tap.uvw)
            }
        }
    }

    /// Current pose of the segment.
    #[inline]
    pub fn current_pos(&self) -> Pose {
        self.pos_at(self.progress)
    }

    /// Pose at the segment's end point.
    ///
    /// For a rigid tap this is the original start: the cycle finishes where
    /// it began.
    pub fn endpoint(&self) -> Pose {
        match &self.geometry {
            SegmentGeometry::Line(line) => {
                Pose::from_parts(line.xyz.end, line.abc.end, line.uvw.end)
            }
            SegmentGeometry::Circle(circle) => Pose::from_parts(
                circle.xyz.point(circle.xyz.angle),
                circle.abc.end,
                circle.uvw.end,
            ),
            SegmentGeometry::RigidTap(tap) => Pose::from_parts(tap.xyz.start, tap.abc, tap.uvw),
        }
    }

    /// Unit tangent of the XYZ path at the segment start.
    pub fn starting_unit_vector(&self) -> Cart {
        match &self.geometry {
            SegmentGeometry::Line(line) => line.xyz.u_vec,
            SegmentGeometry::Circle(circle) => circle.xyz.tangent(0.0),
            SegmentGeometry::RigidTap(tap) => tap.xyz.u_vec,
        }
    }

    /// Unit tangent of the XYZ path at the segment end.
    pub fn ending_unit_vector(&self) -> Cart {
        match &self.geometry {
            SegmentGeometry::Line(line) => line.xyz.u_vec,
            SegmentGeometry::Circle(circle) => circle.xyz.tangent(circle.xyz.angle),
            // The tap retracts back out along the way it came in.
            SegmentGeometry::RigidTap(tap) => -tap.xyz.u_vec,
        }
    }

    /// Map `progress` along the driving geometry to arclength on a
    /// follower of length `follower_mag`.
    #[inline]
    fn scaled(&self, progress: f64, follower_mag: f64) -> f64 {
        if self.target > 0.0 {
            progress * follower_mag / self.target
        } else {
            0.0
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
