//! The trajectory planner structure and its command API.
//!
//! All methods here run on the producer side (the canonical-command
//! dispatcher): they validate arguments, build segments from the goal
//! pose, splice blend arcs, and append to the queue. The real-time
//! consumer half lives in [`crate::cycle`].
//!
//! The producer/consumer split across threads is the embedding host's
//! responsibility: it must make queue appends visible before the next
//! tick consumes them (release on put, acquire on fetch).

use tracing::debug;

use helix_common::config::PlannerConfig;
use helix_common::consts::TAP_OVERRUN_REVS;
use helix_common::geometry::{CartLine, Circle};
use helix_common::pose::{Cart, Pose};
use helix_common::state::{CanonKind, SyncMode, TermCond};
use helix_common::status::DioBatch;

use crate::blend::{check_need_blend_arc, connect_blend_arc, create_blend_arc, BlendDecision};
use crate::error::PlannerError;
use crate::lookahead::run_optimization;
use crate::profile::TickCtx;
use crate::queue::SegmentQueue;
use crate::segment::{
    CircleCoords, LineCoords, RigidTapCoords, Segment, SegmentGeometry,
};
use crate::sync::SpindleTracking;

/// The trajectory planner.
///
/// Owns the bounded segment queue (arena allocated once, here), the
/// current and goal poses, global velocity/acceleration settings, and the
/// runtime flags the cycle driver works through.
#[derive(Debug)]
pub struct Planner {
    pub(crate) queue: SegmentQueue,

    pub(crate) lookahead_depth: usize,
    pub(crate) enable_blend_arcs: bool,

    pub(crate) current_pos: Pose,
    pub(crate) goal_pos: Pose,

    pub(crate) cycle_time: f64,
    pub(crate) v_limit: f64,
    pub(crate) v_max: f64,
    pub(crate) ini_maxvel: f64,
    pub(crate) a_max: f64,

    pub(crate) next_id: i32,
    pub(crate) exec_id: i32,
    pub(crate) motion_type: CanonKind,

    pub(crate) term_cond: TermCond,
    pub(crate) tolerance: f64,

    pub(crate) done: bool,
    pub(crate) pausing: bool,
    pub(crate) aborting: bool,

    pub(crate) sync_mode: SyncMode,
    pub(crate) uu_per_rev: f64,
    pub(crate) spindle: SpindleTracking,

    pub(crate) depth: usize,
    pub(crate) active_depth: usize,

    /// Feed scale observed on the last tick; used by producer-side blend
    /// sizing between ticks.
    pub(crate) last_feed_scale: f64,

    /// Staged output changes consumed by the next appended segment.
    pub(crate) pending_dio: DioBatch,
}

impl Planner {
    /// Create a planner with an empty queue. The queue arena is the only
    /// allocation; everything after this point is allocation-free.
    pub fn new(config: &PlannerConfig) -> Self {
        let mut planner = Self {
            queue: SegmentQueue::with_capacity(config.queue_size),
            lookahead_depth: config.lookahead_depth,
            enable_blend_arcs: config.enable_blend_arcs,
            current_pos: Pose::ZERO,
            goal_pos: Pose::ZERO,
            cycle_time: 0.0,
            v_limit: 0.0,
            v_max: 0.0,
            ini_maxvel: 0.0,
            a_max: 0.0,
            next_id: 0,
            exec_id: 0,
            motion_type: CanonKind::None,
            term_cond: TermCond::Parabolic,
            tolerance: 0.0,
            done: true,
            pausing: false,
            aborting: false,
            sync_mode: SyncMode::None,
            uu_per_rev: 0.0,
            spindle: SpindleTracking::default(),
            depth: 0,
            active_depth: 0,
            last_feed_scale: 1.0,
            pending_dio: DioBatch::default(),
        };
        planner.init();
        planner
    }

    /// Fully reinitialise: configuration values back to defaults, then a
    /// soft clear.
    pub fn init(&mut self) {
        self.cycle_time = 0.0;
        self.v_limit = 0.0;
        self.v_max = 0.0;
        self.ini_maxvel = 0.0;
        self.a_max = 0.0;
        self.spindle = SpindleTracking::default();
        self.current_pos = Pose::ZERO;
        self.clear();
    }

    /// Soft clear: configuration (cycle time, velocity and acceleration
    /// limits) is left alone, but the queue empties and the goal pose
    /// re-homes to the current position — as if all queued motion had
    /// finished here.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.goal_pos = self.current_pos;
        self.next_id = 0;
        self.exec_id = 0;
        self.motion_type = CanonKind::None;
        self.term_cond = TermCond::Parabolic;
        self.tolerance = 0.0;
        self.done = true;
        self.depth = 0;
        self.active_depth = 0;
        self.aborting = false;
        self.pausing = false;
        self.sync_mode = SyncMode::None;
        self.uu_per_rev = 0.0;
        self.pending_dio.clear();
    }

    // ─── Configuration setters ──────────────────────────────────────

    pub fn set_cycle_time(&mut self, secs: f64) -> Result<(), PlannerError> {
        if secs <= 0.0 {
            return Err(PlannerError::InvalidArgument("cycle time must be positive"));
        }
        self.cycle_time = secs;
        Ok(())
    }

    /// Set the requested velocity ceiling (the F word) and the absolute
    /// machine-constraint ceiling that feed override above 100% may use.
    pub fn set_vmax(&mut self, v_max: f64, ini_maxvel: f64) -> Result<(), PlannerError> {
        if v_max <= 0.0 || ini_maxvel <= 0.0 {
            return Err(PlannerError::InvalidArgument("vmax must be positive"));
        }
        self.v_max = v_max;
        self.ini_maxvel = ini_maxvel;
        Ok(())
    }

    /// Tool-tip velocity limit. Negative values clamp to zero.
    pub fn set_vlimit(&mut self, v_limit: f64) {
        self.v_limit = v_limit.max(0.0);
    }

    pub fn set_amax(&mut self, a_max: f64) -> Result<(), PlannerError> {
        if a_max <= 0.0 {
            return Err(PlannerError::InvalidArgument("amax must be positive"));
        }
        self.a_max = a_max;
        Ok(())
    }

    /// Set the id the next appended motion will carry. Ids increment from
    /// here on.
    pub fn set_id(&mut self, id: i32) -> Result<(), PlannerError> {
        if id < 0 {
            return Err(PlannerError::InvalidMotionId(id));
        }
        self.next_id = id;
        Ok(())
    }

    /// Termination condition and blend tolerance for subsequent moves.
    pub fn set_term_cond(&mut self, cond: TermCond, tolerance: f64) -> Result<(), PlannerError> {
        if tolerance < 0.0 {
            return Err(PlannerError::InvalidArgument("tolerance must be non-negative"));
        }
        self.term_cond = cond;
        self.tolerance = tolerance;
        Ok(())
    }

    /// Teleport: set current and goal position together. Only valid while
    /// no motion is queued (mode switches, homing).
    pub fn set_pos(&mut self, pos: Pose) {
        self.current_pos = pos;
        self.goal_pos = pos;
    }

    // ─── Spindle / IO staging ───────────────────────────────────────

    /// Configure spindle synchronisation for subsequent moves.
    /// `uu_per_rev` of zero turns synchronisation off.
    pub fn set_spindle_sync(&mut self, uu_per_rev: f64, velocity_mode: bool) {
        if uu_per_rev != 0.0 {
            self.sync_mode = if velocity_mode {
                SyncMode::Velocity
            } else {
                SyncMode::Position
            };
            self.uu_per_rev = uu_per_rev;
        } else {
            self.sync_mode = SyncMode::None;
        }
    }

    /// Stage a synchronised digital output change for the next appended
    /// move. The `end` value is accepted for call parity but unused: only
    /// the start value is ever applied.
    pub fn set_dout(&mut self, index: usize, start: bool, _end: bool) {
        self.pending_dio.stage_dio(index, start);
    }

    /// Stage a synchronised analog output for the next appended move.
    /// As with [`Self::set_dout`], the end value is unused.
    pub fn set_aout(&mut self, index: usize, start: f64, _end: f64) {
        self.pending_dio.stage_aio(index, start);
    }

    // ─── Control ────────────────────────────────────────────────────

    /// Decelerate to rest without discarding the queue.
    pub fn pause(&mut self) {
        self.pausing = true;
    }

    pub fn resume(&mut self) {
        self.pausing = false;
    }

    /// Level-triggered abort: implies a pause, drains velocity to zero,
    /// then the cycle driver performs the full reset. Staged output
    /// changes are dropped immediately.
    pub fn abort(&mut self) {
        if !self.aborting {
            self.pause();
            self.aborting = true;
        }
        self.pending_dio.clear();
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Id of the motion currently executing.
    pub fn exec_id(&self) -> i32 {
        self.exec_id
    }

    pub fn position(&self) -> Pose {
        self.current_pos
    }

    pub fn motion_type(&self) -> CanonKind {
        self.motion_type
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn queue_depth(&self) -> usize {
        self.depth
    }

    pub fn active_depth(&self) -> usize {
        self.active_depth
    }

    /// Current (vMax, ini_maxvel) settings for subsequent moves.
    pub fn vmax(&self) -> (f64, f64) {
        (self.v_max, self.ini_maxvel)
    }

    /// Current acceleration limit for subsequent moves.
    pub fn amax(&self) -> f64 {
        self.a_max
    }

    // ─── Adding motion ──────────────────────────────────────────────

    /// Append a straight line from the previous end to `end`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_line(
        &mut self,
        end: Pose,
        canon_kind: CanonKind,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        enables: u8,
        atspeed: bool,
        index_rotary: Option<u8>,
    ) -> Result<(), PlannerError> {
        self.error_check()?;

        let (start_xyz, start_abc, start_uvw) = self.goal_pos.to_parts();
        let (end_xyz, end_abc, end_uvw) = end.to_parts();

        let xyz = CartLine::new(start_xyz, end_xyz);
        let abc = CartLine::new(start_abc, end_abc);
        let uvw = CartLine::new(start_uvw, end_uvw);

        let mut tc = self.new_segment_common(vel, ini_maxvel, acc, enables);

        // Arclength parameterisation: XYZ drives when it moves, otherwise
        // UVW, otherwise ABC.
        tc.target = if !xyz.mag_zero {
            xyz.mag
        } else if !uvw.mag_zero {
            uvw.mag
        } else {
            abc.mag
        };

        tc.atspeed = atspeed;
        tc.geometry = SegmentGeometry::Line(LineCoords { xyz, abc, uvw });
        tc.canon_kind = canon_kind;
        tc.term_cond = self.term_cond;
        tc.tolerance = self.tolerance;
        tc.sync = self.sync_mode;
        tc.uu_per_rev = self.uu_per_rev;
        tc.index_rotary = index_rotary;
        tc.syncdio = self.take_pending_dio();

        self.handle_blend_arc(&mut tc, &end)?;

        self.clip_velocity_limit(&mut tc);
        self.add_segment_to_queue(tc, end)?;
        run_optimization(&mut self.queue, self.lookahead_depth);
        Ok(())
    }

    /// Append a circular, arc, or helical move around `center` with plane
    /// normal `normal` and `turn` additional full revolutions.
    #[allow(clippy::too_many_arguments)]
    pub fn add_circle(
        &mut self,
        end: Pose,
        center: Cart,
        normal: Cart,
        turn: u32,
        canon_kind: CanonKind,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        enables: u8,
        atspeed: bool,
    ) -> Result<(), PlannerError> {
        self.error_check()?;

        let (start_xyz, start_abc, start_uvw) = self.goal_pos.to_parts();
        let (end_xyz, end_abc, end_uvw) = end.to_parts();

        let circle = Circle::new(start_xyz, end_xyz, center, normal, turn)
            .ok_or(PlannerError::InvalidArgument("degenerate circle"))?;
        let abc = CartLine::new(start_abc, end_abc);
        let uvw = CartLine::new(start_uvw, end_uvw);

        // Helical length: planar arc and rise combine in quadrature.
        let planar = circle.planar_length();
        let helix_length = (planar * planar + circle.r_helix.dot(&circle.r_helix)).sqrt();

        let mut tc = self.new_segment_common(vel, ini_maxvel, acc, enables);
        tc.target = helix_length;
        tc.atspeed = atspeed;
        tc.geometry = SegmentGeometry::Circle(CircleCoords { xyz: circle, abc, uvw });
        tc.canon_kind = canon_kind;
        tc.term_cond = self.term_cond;
        tc.tolerance = self.tolerance;
        tc.sync = self.sync_mode;
        tc.uu_per_rev = self.uu_per_rev;
        tc.syncdio = self.take_pending_dio();

        self.clip_velocity_limit(&mut tc);
        self.add_segment_to_queue(tc, end)?;
        run_optimization(&mut self.queue, self.lookahead_depth);
        Ok(())
    }

    /// Append a rigid-tap cycle along the line from the previous end to
    /// `end`. Requires spindle synchronisation to be configured.
    pub fn add_rigid_tap(
        &mut self,
        end: Pose,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        enables: u8,
    ) -> Result<(), PlannerError> {
        self.error_check()?;

        if self.sync_mode == SyncMode::None {
            return Err(PlannerError::UnsynchronizedTap);
        }

        let (start_xyz, abc, uvw) = self.goal_pos.to_parts();
        let (end_xyz, _, _) = end.to_parts();
        let xyz = CartLine::new(start_xyz, end_xyz);

        let mut tc = self.new_segment_common(vel, ini_maxvel, acc, enables);

        tc.target = xyz.mag + TAP_OVERRUN_REVS * self.uu_per_rev;
        // The spindle must already be turning at speed to cut a thread.
        tc.atspeed = true;
        tc.geometry = SegmentGeometry::RigidTap(RigidTapCoords {
            xyz,
            aux_xyz: xyz,
            abc,
            uvw,
            state: helix_common::state::TapState::Tapping,
            reversal_target: xyz.mag,
            spindlerevs_at_reversal: 0.0,
            last_spindle_pos: 0.0,
        });
        tc.canon_kind = CanonKind::None;
        tc.term_cond = TermCond::Stop;
        tc.tolerance = self.tolerance;
        tc.sync = self.sync_mode;
        tc.uu_per_rev = self.uu_per_rev;
        tc.syncdio = self.take_pending_dio();

        self.add_segment_to_queue(tc, end)
    }

    // ─── Internals ──────────────────────────────────────────────────

    pub(crate) fn error_check(&self) -> Result<(), PlannerError> {
        if self.aborting {
            return Err(PlannerError::Aborting);
        }
        Ok(())
    }

    /// Common runtime-field initialisation for a new segment.
    fn new_segment_common(&self, vel: f64, ini_maxvel: f64, acc: f64, enables: u8) -> Segment {
        Segment {
            id: -1, // assigned when queued
            cycle_time: self.cycle_time,
            maxaccel: acc,
            maxvel: ini_maxvel,
            // maxvel never changes for a segment, so the request is capped
            // here once.
            reqvel: vel.min(ini_maxvel),
            enables,
            ..Default::default()
        }
    }

    /// Sample-rate velocity cap: a segment must last at least two ticks.
    pub(crate) fn clip_velocity_limit(&self, tc: &mut Segment) {
        if self.cycle_time <= 0.0 {
            return;
        }
        let sample_maxvel = 0.5 * tc.target / self.cycle_time;
        if tc.maxvel > sample_maxvel {
            debug!(
                id = tc.id,
                from = tc.maxvel,
                to = sample_maxvel,
                "clipped maxvel to sample rate"
            );
            tc.maxvel = sample_maxvel;
        }
    }

    fn take_pending_dio(&mut self) -> DioBatch {
        if self.pending_dio.any_changed {
            let batch = self.pending_dio;
            self.pending_dio.clear();
            batch
        } else {
            DioBatch::default()
        }
    }

    /// Assign an id, enqueue, and advance the goal pose.
    fn add_segment_to_queue(&mut self, mut tc: Segment, end: Pose) -> Result<(), PlannerError> {
        tc.id = self.next_id;
        self.queue.put(tc).map_err(|_| PlannerError::QueueFull)?;

        self.goal_pos = end;
        self.done = false;
        self.depth = self.queue.len();
        self.next_id += 1;
        Ok(())
    }

    /// Producer-side context for blend sizing, using the feed scale
    /// observed on the last tick.
    fn producer_ctx(&self) -> TickCtx {
        TickCtx {
            cycle_time: self.cycle_time,
            v_limit: self.v_limit,
            pausing: self.pausing,
            aborting: self.aborting,
            net_feed_scale: self.last_feed_scale,
        }
    }

    /// Corner handling for a new line `tc` about to enter the queue: may
    /// promote the previous segment to tangent, or splice a blend arc and
    /// trim both neighbours.
    fn handle_blend_arc(&mut self, tc: &mut Segment, end: &Pose) -> Result<(), PlannerError> {
        let prev_started = match self.queue.last() {
            None => return Ok(()),
            // Don't touch a segment that is already executing.
            Some(prev) => prev.progress > 0.0,
        };
        if prev_started {
            return Ok(());
        }

        let decision = match self.queue.last() {
            Some(prev) => check_need_blend_arc(prev, tc),
            None => return Ok(()),
        };
        match decision {
            BlendDecision::AlreadyTangent => {
                debug!("segments nearly collinear, promoting to tangent");
                if let Some(prev) = self.queue.last_mut() {
                    prev.term_cond = TermCond::Tangent;
                }
            }
            BlendDecision::BuildArc => {
                if !self.enable_blend_arcs {
                    debug!("blend arcs disabled, keeping parabolic blend");
                    return Ok(());
                }

                // The splice needs room for the arc plus the incoming line.
                if self.queue.len() + 2 > self.queue.capacity() {
                    debug!("queue too full to splice an arc");
                    return Ok(());
                }

                let ctx = self.producer_ctx();
                let blend_tc = {
                    let Some(prev) = self.queue.last() else {
                        return Ok(());
                    };
                    match create_blend_arc(&ctx, prev, tc) {
                        Some(arc) => arc,
                        None => {
                            debug!("arc construction declined, keeping parabolic blend");
                            return Ok(());
                        }
                    }
                };

                let collapsed = {
                    let Some(prev) = self.queue.last_mut() else {
                        return Ok(());
                    };
                    let collapsed = connect_blend_arc(prev, tc, &blend_tc);
                    if !collapsed {
                        self.clip_velocity_limit_on_last();
                    }
                    collapsed
                };
                if collapsed {
                    self.queue.pop_back();
                }

                let mut blend_tc = blend_tc;
                self.clip_velocity_limit(&mut blend_tc);
                self.add_segment_to_queue(blend_tc, *end)?;
                run_optimization(&mut self.queue, self.lookahead_depth);
            }
            BlendDecision::Fallback => {}
        }
        Ok(())
    }

    fn clip_velocity_limit_on_last(&mut self) {
        if self.cycle_time <= 0.0 {
            return;
        }
        if let Some(prev) = self.queue.last_mut() {
            let sample_maxvel = 0.5 * prev.target / self.cycle_time;
            if prev.maxvel > sample_maxvel {
                prev.maxvel = sample_maxvel;
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
