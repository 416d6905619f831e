//! The per-tick cycle driver.
//!
//! Called once per servo period. Completes finished segments, activates
//! the head of the queue, runs spindle synchronisation, profiles the
//! active segment (and its follower during blends), accumulates the pose
//! displacement, applies synchronised outputs, and publishes status.
//!
//! The driver never blocks and never allocates. Spindle at-speed, encoder
//! index, and rotary-lock waits are all stall states: the tick returns
//! without advancing motion and re-checks next period.

use tracing::{debug, warn};

use helix_common::consts::PARABOLIC_ACCEL_SCALE;
use helix_common::pose::Pose;
use helix_common::state::{CanonKind, SyncMode, TermCond};
use helix_common::status::StatusBlock;

use crate::blend::blend_velocity;
use crate::io::MotionIo;
use crate::planner::Planner;
use crate::profile::{feed_override, run_segment_cycle, TickCtx};
use crate::rigidtap::advance_rigid_tap;
use crate::segment::{Segment, SegmentGeometry};
use crate::sync::{sync_position_mode, sync_velocity_mode};

/// Status fields captured from the primary segment while queue borrows are
/// live, applied to the status block afterwards.
#[derive(Debug, Clone, Copy)]
struct MovementSnapshot {
    endpoint: Pose,
    distance_to_go: f64,
    enables: u8,
    id: i32,
    reqvel: f64,
    currentvel: f64,
    canon_kind: CanonKind,
}

impl MovementSnapshot {
    fn capture(tc: &Segment) -> Self {
        Self {
            endpoint: tc.endpoint(),
            distance_to_go: tc.target - tc.progress,
            enables: tc.enables,
            id: tc.id,
            reqvel: tc.reqvel,
            currentvel: tc.currentvel,
            canon_kind: tc.canon_kind,
        }
    }
}

/// Apply a segment's staged output changes, once.
fn toggle_dios(tc: &mut Segment, io: &mut impl MotionIo) {
    if !tc.syncdio.any_changed {
        return;
    }
    for i in 0..helix_common::status::MAX_DIO {
        if tc.syncdio.dio_mask & (1u64 << i) == 0 {
            continue;
        }
        if tc.syncdio.dios[i] > 0 {
            io.dio_write(i, true);
        } else if tc.syncdio.dios[i] < 0 {
            io.dio_write(i, false);
        }
    }
    for i in 0..helix_common::status::MAX_AIO {
        if tc.syncdio.aio_mask & (1u64 << i) == 0 {
            continue;
        }
        io.aio_write(i, tc.syncdio.aios[i]);
    }
    tc.syncdio.any_changed = false;
}

/// Carry a tangent segment's overshoot into its successor, preserving
/// velocity for C¹ continuity.
fn check_overshoot(tc: &mut Segment, nexttc: &mut Segment) {
    if tc.progress > tc.target {
        let overshoot = tc.progress - tc.target;
        debug!(overshoot, id = tc.id, "overshot end of move");
        nexttc.progress = overshoot;
        if overshoot > nexttc.target {
            debug!(
                overshoot,
                next_target = nexttc.target,
                "overshoot beyond next segment"
            );
        }
        nexttc.currentvel = tc.currentvel;
        tc.progress = tc.target;
    }
}

/// Advance the follower during a parabolic blend: it receives the
/// velocity the primary segment is shedding.
fn do_parabolic_blend(ctx: &TickCtx, tc: &Segment, nexttc: &mut Segment, primary_vel: f64) {
    let save_vel = nexttc.reqvel;
    let ov = feed_override(ctx, nexttc);
    nexttc.reqvel = if ov > 0.0 {
        (tc.vel_at_blend_start - primary_vel) / ov
    } else {
        0.0
    };
    run_segment_cycle(ctx, nexttc);
    nexttc.reqvel = save_vel;
}

impl Planner {
    /// One servo tick: update `self.current_pos` and publish status.
    pub fn run_tick(&mut self, status: &mut StatusBlock, io: &mut impl MotionIo) {
        self.last_feed_scale = status.net_feed_scale;

        status.queue_len = self.queue.len();
        status.requested_vel = 0.0;

        if self.queue.is_empty() {
            self.handle_empty_queue(status);
            return;
        }

        // ── Complete the head if it finished last tick ──
        let Some((finished, head_id)) = self
            .queue
            .item(0)
            .map(|tc| (tc.target == tc.progress, tc.id))
        else {
            return;
        };
        if finished && self.spindle.waiting_for_atspeed != Some(head_id) {
            if !self.complete_segment(io) {
                // Rotary axis not relocked yet; try again next tick.
                return;
            }
            if self.queue.is_empty() {
                return;
            }
        }

        // ── Candidate follower ──
        let next_idx = self.resolve_next(status.stepping);

        // ── Abort drain ──
        if self.aborting {
            let stopped = {
                let head_stopped = self
                    .queue
                    .item(0)
                    .map_or(true, |tc| tc.currentvel == 0.0);
                let next_stopped = next_idx
                    .and_then(|i| self.queue.item(i))
                    .map_or(true, |next| next.currentvel == 0.0);
                self.spindle.waiting_for_index.is_some()
                    || self.spindle.waiting_for_atspeed.is_some()
                    || (head_stopped && next_stopped)
            };
            if stopped {
                self.abort_reset(status);
                return;
            }
            // Still moving: keep profiling toward rest below.
        }

        // ── Wait states ──
        if self.check_waiting(status) {
            return;
        }

        // ── Activation ──
        let head_active = self.queue.item(0).map_or(true, |tc| tc.active);
        if !head_active && !self.activate_segment(status, io) {
            return;
        }

        // ── Index latch ──
        if self.spindle.waiting_for_index.is_some() {
            if status.spindle.index_enable {
                // Index has not passed yet.
                return;
            }
            status.spindle_sync = true;
            self.spindle.waiting_for_index = None;
            if let Some(tc) = self.queue.item_mut(0) {
                tc.sync_accel = 1;
            }
            self.spindle.revs = 0.0;
        }

        // ── Rigid tap phase walk ──
        let spindle_offset = self.spindle.offset;
        if let Some(tc) = self.queue.item_mut(0) {
            if matches!(tc.geometry, SegmentGeometry::RigidTap(_)) {
                advance_rigid_tap(tc, &mut status.spindle, spindle_offset);
            }
        }

        if !self.queue.item(0).map_or(false, |tc| tc.is_synchronized()) {
            status.spindle_sync = false;
        }

        // ── Lazy-activate the follower ──
        if let Some(i) = next_idx {
            let head_term = self
                .queue
                .item(0)
                .map_or(TermCond::Stop, |tc| tc.term_cond);
            let mut activated = false;
            if let Some(next) = self.queue.item_mut(i) {
                if !next.active {
                    debug!(id = next.id, "activate next segment");
                    next.currentvel = 0.0;
                    next.active = true;
                    next.blending = false;
                    // Leave acceleration headroom for the velocity overlap.
                    if head_term == TermCond::Parabolic || next.term_cond == TermCond::Parabolic {
                        next.accel_scale = PARABOLIC_ACCEL_SCALE;
                    }
                    activated = true;
                }
            }
            if activated {
                self.depth = 1;
                self.active_depth = 1;
            }
        }

        let ctx = TickCtx {
            cycle_time: self.cycle_time,
            v_limit: self.v_limit,
            pausing: self.pausing,
            aborting: self.aborting,
            net_feed_scale: status.net_feed_scale,
        };

        // ── Spindle sync + motion ──
        let signed_pos = status.spindle.signed_position();
        let speed_in = status.spindle.speed_in;

        let snapshot = match next_idx {
            Some(i) => {
                let Some((tc, nexttc)) = self.queue.pair_mut(0, i) else {
                    return;
                };

                match tc.sync {
                    SyncMode::None => {}
                    SyncMode::Velocity => sync_velocity_mode(tc, Some(nexttc), speed_in),
                    SyncMode::Position => {
                        sync_position_mode(&mut self.spindle, tc, Some(nexttc), signed_pos)
                    }
                }
                if nexttc.is_synchronized() {
                    // A synchronised follower tracks the same spindle.
                    nexttc.reqvel = tc.reqvel;
                }

                if tc.term_cond == TermCond::Parabolic {
                    tc.blend_vel = blend_velocity(&ctx, tc, Some(nexttc));
                }

                let primary_before = tc.current_pos();
                let secondary_before = nexttc.current_pos();

                let out = run_segment_cycle(&ctx, tc);
                if tc.term_cond == TermCond::Tangent {
                    check_overshoot(tc, nexttc);
                }

                let primary_disp = tc.current_pos() - primary_before;
                self.current_pos += primary_disp;

                let is_blend_start = tc.term_cond == TermCond::Parabolic
                    && out.on_final_decel
                    && out.velocity < tc.blend_vel;
                let is_tangent_blend_start =
                    tc.term_cond == TermCond::Tangent && tc.target == tc.progress;

                if is_blend_start {
                    tc.blending = true;
                }

                if tc.blending {
                    let blend_before = nexttc.current_pos();
                    do_parabolic_blend(&ctx, tc, nexttc, out.velocity);
                    let secondary_disp = nexttc.current_pos() - blend_before;
                    self.current_pos += secondary_disp;

                    // Status and outputs follow whichever segment carries
                    // more of the motion.
                    let snap = if tc.currentvel > nexttc.currentvel {
                        MovementSnapshot::capture(tc)
                    } else {
                        toggle_dios(nexttc, io);
                        MovementSnapshot::capture(nexttc)
                    };
                    let combined_vel = tc.currentvel + nexttc.currentvel;
                    MovementSnapshot {
                        currentvel: combined_vel,
                        // Mid-blend, no single segment owns the motion.
                        canon_kind: CanonKind::None,
                        ..snap
                    }
                } else {
                    if is_tangent_blend_start {
                        let secondary_disp = nexttc.current_pos() - secondary_before;
                        self.current_pos += secondary_disp;
                    }
                    toggle_dios(tc, io);
                    MovementSnapshot::capture(tc)
                }
            }
            None => {
                let Some(tc) = self.queue.item_mut(0) else {
                    return;
                };

                match tc.sync {
                    SyncMode::None => {}
                    SyncMode::Velocity => sync_velocity_mode(tc, None, speed_in),
                    SyncMode::Position => {
                        sync_position_mode(&mut self.spindle, tc, None, signed_pos)
                    }
                }

                if tc.term_cond == TermCond::Parabolic {
                    tc.blend_vel = blend_velocity(&ctx, tc, None);
                }

                let before = tc.current_pos();
                run_segment_cycle(&ctx, tc);
                // Tangent overshoot with nothing to hand it to: snap.
                if tc.term_cond == TermCond::Tangent && tc.progress > tc.target {
                    debug!(id = tc.id, "tangent overshoot with empty queue");
                    tc.progress = tc.target;
                }
                let disp = tc.current_pos() - before;
                self.current_pos += disp;

                toggle_dios(tc, io);
                MovementSnapshot::capture(tc)
            }
        };

        self.apply_status(status, &snapshot);
    }

    // ─── Tick helpers ───────────────────────────────────────────────

    /// Queue starvation or program end: soft-reset so the planner idles at
    /// the current position.
    fn handle_empty_queue(&mut self, status: &mut StatusBlock) {
        self.queue.clear();
        self.goal_pos = self.current_pos;
        self.done = true;
        self.depth = 0;
        self.active_depth = 0;
        self.aborting = false;
        self.exec_id = 0;
        self.motion_type = CanonKind::None;
        self.resume();
        // While nothing executes, report the host's live enable flags.
        status.enables_queued = status.enables_new;
    }

    /// Pop the finished head. Returns false while a rotary relock keeps the
    /// segment pinned.
    fn complete_segment(&mut self, io: &mut impl MotionIo) -> bool {
        let Some((id, synchronized, target, uu_per_rev, index_rotary)) =
            self.queue.item(0).map(|tc| {
                (
                    tc.id,
                    tc.is_synchronized(),
                    tc.target,
                    tc.uu_per_rev,
                    tc.index_rotary,
                )
            })
        else {
            return true;
        };
        debug!(id, "finished segment");

        // Preserve the spindle phase across consecutive synchronised moves.
        if synchronized && uu_per_rev != 0.0 {
            self.spindle.offset += target / uu_per_rev;
        } else if !synchronized {
            self.spindle.offset = 0.0;
        }

        if let Some(axis) = index_rotary {
            // An indexing move must relock the axis before it is removed.
            io.rotary_unlock(axis, false);
            if io.rotary_is_unlocked(axis) {
                return false;
            }
        }

        self.queue.pop_front();
        true
    }

    /// Decide whether the follower may participate this tick. Downgrades
    /// the head to an exact stop when the follower must start from rest
    /// (spindle-position sync or at-speed gate).
    fn resolve_next(&mut self, stepping: bool) -> Option<usize> {
        let (head_term, head_sync) = {
            let tc = self.queue.item(0)?;
            (tc.term_cond, tc.sync)
        };

        if stepping || head_term == TermCond::Stop || self.queue.len() < 2 {
            return None;
        }

        let (next_needs_sync, next_atspeed) = {
            let next = self.queue.item(1)?;
            (next.sync == SyncMode::Position, next.atspeed)
        };

        if head_sync != SyncMode::Position && next_needs_sync {
            // The follower will wait for spindle sync; stop at the right
            // place instead of blending into the wait.
            if let Some(tc) = self.queue.item_mut(0) {
                tc.term_cond = TermCond::Stop;
            }
            return None;
        }

        if next_atspeed {
            // Same for an at-speed gate.
            if let Some(tc) = self.queue.item_mut(0) {
                tc.term_cond = TermCond::Stop;
            }
            return None;
        }

        Some(1)
    }

    /// Motion is at rest (or parked in a wait): tear everything down.
    fn abort_reset(&mut self, status: &mut StatusBlock) {
        debug!("abort complete, resetting planner");
        self.queue.clear();
        self.goal_pos = self.current_pos;
        self.done = true;
        self.depth = 0;
        self.active_depth = 0;
        self.aborting = false;
        self.exec_id = 0;
        self.motion_type = CanonKind::None;
        self.sync_mode = SyncMode::None;
        self.spindle.waiting_for_index = None;
        self.spindle.waiting_for_atspeed = None;
        status.spindle_sync = false;
        self.resume();
    }

    /// Validate and service at-speed/index waits. Returns true when the
    /// tick must stall.
    fn check_waiting(&mut self, status: &StatusBlock) -> bool {
        let head_id = match self.queue.item(0) {
            Some(tc) => tc.id,
            None => return false,
        };

        if let Some(id) = self.spindle.waiting_for_index {
            if id != head_id {
                warn!(waiting = id, reached = head_id, "index wait left behind");
                self.spindle.waiting_for_index = None;
            }
        }
        if let Some(id) = self.spindle.waiting_for_atspeed {
            if id != head_id {
                warn!(waiting = id, reached = head_id, "at-speed wait left behind");
                self.spindle.waiting_for_atspeed = None;
            }
        }

        if self.spindle.waiting_for_atspeed.is_some() {
            if !status.spindle.is_atspeed {
                // Spindle still spinning up; wait another cycle.
                return true;
            }
            self.spindle.waiting_for_atspeed = None;
        }

        false
    }

    /// First-touch setup of the head segment. Returns false when the tick
    /// must stall (at-speed, rotary unlock, or index wait just latched).
    fn activate_segment(&mut self, status: &mut StatusBlock, io: &mut impl MotionIo) -> bool {
        let Some((id, atspeed, sync, index_rotary, canon_kind)) = self
            .queue
            .item(0)
            .map(|tc| (tc.id, tc.atspeed, tc.sync, tc.index_rotary, tc.canon_kind))
        else {
            return false;
        };

        // All spindle-position-synchronised motion starts from a spindle
        // already at speed.
        let needs_atspeed = atspeed || (sync == SyncMode::Position && !status.spindle_sync);
        if needs_atspeed && !status.spindle.is_atspeed {
            self.spindle.waiting_for_atspeed = Some(id);
            return false;
        }

        if let Some(axis) = index_rotary {
            io.rotary_unlock(axis, true);
            if !io.rotary_is_unlocked(axis) {
                return false;
            }
        }

        debug!(id, "activate segment");
        if let Some(tc) = self.queue.item_mut(0) {
            tc.active = true;
            tc.currentvel = 0.0;
            tc.blending = false;
            // Half the acceleration budget, in case the corner with the
            // follower is acute.
            if tc.term_cond == TermCond::Parabolic {
                tc.accel_scale = PARABOLIC_ACCEL_SCALE;
            }
        }
        self.depth = 1;
        self.active_depth = 1;
        self.motion_type = canon_kind;

        if sync == SyncMode::Position && !status.spindle_sync {
            // Not synced yet: request an encoder index reset and hold
            // position until it passes.
            self.spindle.waiting_for_index = Some(id);
            status.spindle.index_enable = true;
            self.spindle.offset = 0.0;
            debug!(id, "waiting on spindle index");
            return false;
        }

        true
    }

    fn apply_status(&mut self, status: &mut StatusBlock, snap: &MovementSnapshot) {
        self.motion_type = snap.canon_kind;
        self.exec_id = snap.id;
        status.distance_to_go = snap.distance_to_go;
        status.enables_queued = snap.enables;
        status.requested_vel = snap.reqvel;
        status.current_vel = snap.currentvel;
        status.dtg = snap.endpoint - self.current_pos;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
