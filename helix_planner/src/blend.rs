//! Blend-arc construction and parabolic blend velocity.
//!
//! Between two consecutive XYZ line moves the planner can replace the
//! corner with a circular arc tangent to both lines, sized by the path
//! tolerance, the normal-acceleration budget, and the servo sample rate.
//! Whenever the arc cannot match at least the performance of the default
//! parabolic blend, construction falls back silently — the corner is still
//! executable, just less smoothly.

use tracing::{debug, trace};

use helix_common::consts::{
    ACCEL_EPSILON, ANGLE_EPSILON, ARC_ACCEL_MARGIN, ARC_ACCEL_SCALE, BLEND_RATIO, MAG_EPSILON,
};
use helix_common::geometry::{CartLine, Circle};
use helix_common::pose::Cart;
use helix_common::state::{CanonKind, TermCond};
use helix_common::status::DioBatch;

use crate::profile::{feed_override, scaled_accel, TickCtx};
use crate::segment::{CircleCoords, Segment, SegmentGeometry};

/// Outcome of the blend-arc eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendDecision {
    /// Corner qualifies; try to build an arc.
    BuildArc,
    /// Segments are already tangent within the critical angle — no arc
    /// needed, just promote the termination condition.
    AlreadyTangent,
    /// Not eligible; keep the parabolic blend.
    Fallback,
}

/// Intersection half-angle θ between two unit tangents: half the
/// supplement of the corner angle.
fn intersection_half_angle(u1: &Cart, u2: &Cart) -> Option<f64> {
    let dot = u1.dot(u2);
    if !(-1.0..=1.0).contains(&dot) {
        return None;
    }
    Some(f64::acos(-dot) / 2.0)
}

/// Decide whether the corner between `prev` and `tc` can take a blend arc.
pub fn check_need_blend_arc(prev: &Segment, tc: &Segment) -> BlendDecision {
    let (prev_line, tc_line) = match (&prev.geometry, &tc.geometry) {
        (SegmentGeometry::Line(p), SegmentGeometry::Line(t)) => (p, t),
        _ => {
            debug!(
                prev_kind = ?prev.kind(),
                tc_kind = ?tc.kind(),
                "wrong motion type for arc blend"
            );
            return BlendDecision::Fallback;
        }
    };

    let dot = prev_line.xyz.u_vec.dot(&tc_line.xyz.u_vec);
    if !(-1.0..=1.0).contains(&dot) {
        return BlendDecision::Fallback;
    }
    let omega = dot.acos();

    let crit_angle = ANGLE_EPSILON;
    trace!(omega, crit_angle, "angle between segments");

    // Nearly collinear: the acceleration spike of a direct handover is
    // within limits, so treat as tangent.
    if omega < crit_angle {
        return BlendDecision::AlreadyTangent;
    }

    // Corner too tight; a tangent arc would have zero radius.
    if (std::f64::consts::PI - omega) < crit_angle {
        debug!(omega, "corner too tight for arc blend");
        return BlendDecision::Fallback;
    }

    if prev.term_cond != TermCond::Parabolic {
        debug!(term_cond = ?prev.term_cond, "term condition excludes arc blend");
        return BlendDecision::Fallback;
    }

    // Any rotary or auxiliary motion makes the corner non-planar.
    if prev_line.abc.mag > MAG_EPSILON || tc_line.abc.mag > MAG_EPSILON {
        debug!("rotary motion present, cannot arc blend");
        return BlendDecision::Fallback;
    }
    if prev_line.uvw.mag > MAG_EPSILON || tc_line.uvw.mag > MAG_EPSILON {
        debug!("auxiliary motion present, cannot arc blend");
        return BlendDecision::Fallback;
    }

    BlendDecision::BuildArc
}

/// Safe handover velocity for a parabolic blend between `tc` and its
/// successor.
///
/// Bounded by what either segment can reach from rest over its own length,
/// by the successor's effective request, by the acceleration ratio when the
/// successor out-accelerates us, and by the path tolerance at the corner.
pub fn blend_velocity(ctx: &TickCtx, tc: &Segment, nexttc: Option<&Segment>) -> f64 {
    let Some(next) = nexttc else {
        return 0.0;
    };

    let acc_this = scaled_accel(tc);
    let acc_next = scaled_accel(next);
    if acc_next <= 0.0 {
        return 0.0;
    }

    let v_peak_this = (tc.target * acc_this).sqrt();
    let v_peak_next = (next.target * acc_next).sqrt();
    let mut blend_vel = v_peak_this.min(v_peak_next);

    let next_req = next.reqvel * feed_override(ctx, next);
    if blend_vel > next_req {
        // The successor has a cruise phase; blend over its whole
        // acceleration period.
        blend_vel = next_req;
    }
    if acc_this < acc_next {
        blend_vel *= acc_this / acc_next;
    }

    if tc.tolerance > 0.0 {
        // While decelerating to rest we pass within distance d of the
        // corner at velocity v with d = v²/(2a) and the tolerance cone
        // gives d = 2T/cos θ; solving for v bounds the blend velocity.
        let v1 = tc.ending_unit_vector();
        let v2 = next.starting_unit_vector();
        let dot = v1.dot(&v2).clamp(-1.0, 1.0);
        let theta = f64::acos(-dot) / 2.0;
        if theta.cos() > 0.001 {
            let tblend_vel = 2.0 * (acc_this * tc.tolerance / theta.cos()).sqrt();
            if tblend_vel < blend_vel {
                blend_vel = tblend_vel;
            }
        }
    }

    blend_vel
}

/// Try to build the blend-arc segment for the corner between `prev` and
/// `tc` (both XYZ lines, already screened by [`check_need_blend_arc`]).
///
/// Returns `None` when geometry or the quality gate rules the arc out; the
/// caller then keeps the parabolic blend.
pub fn create_blend_arc(ctx: &TickCtx, prev: &Segment, tc: &Segment) -> Option<Segment> {
    let (prev_line, tc_line) = match (&prev.geometry, &tc.geometry) {
        (SegmentGeometry::Line(p), SegmentGeometry::Line(t)) => (p, t),
        _ => return None,
    };

    let theta = match intersection_half_angle(&prev_line.xyz.u_vec, &tc_line.xyz.u_vec) {
        Some(theta) => theta,
        None => {
            debug!("failed to find intersection angle");
            return None;
        }
    };
    trace!(theta, "blend arc half-angle");

    let v_req = prev.reqvel.max(tc.reqvel);

    // Raw acceleration limits; the arc gets an even tangential/normal
    // split with a small margin for the sample-rate adjustment below.
    let a_max = prev.maxaccel.min(tc.maxaccel);
    let a_n_max = a_max * ARC_ACCEL_SCALE * ARC_ACCEL_MARGIN;
    if a_n_max < ACCEL_EPSILON {
        debug!(a_n_max, "normal acceleration budget too low");
        return None;
    }

    // Corner points.
    let start = prev_line.xyz.start;
    let middle = prev_line.xyz.end;
    let end = tc_line.xyz.end;

    // Zero tolerance means unlimited.
    let t1 = if prev.tolerance == 0.0 {
        1e7
    } else {
        prev.tolerance
    };
    let t2 = if tc.tolerance == 0.0 { 1e7 } else { tc.tolerance };
    let tolerance = t1.min(t2);

    let cos_theta = theta.cos();
    let sin_theta = theta.sin();
    let tan_theta = theta.tan();

    let tmp = 1.0 - sin_theta;
    if tmp <= ANGLE_EPSILON {
        debug!(theta, "tolerance height diverges");
        return None;
    }
    let h_tol = tolerance / tmp;
    let d_tol = cos_theta * h_tol;

    let l1 = prev.target;
    let l2 = tc.target;

    // Retreat distance: the whole previous segment is available, a fixed
    // fraction of the next, and whatever the tolerance permits.
    let d_prev = l1;
    let d_next = l2 * BLEND_RATIO;
    let d_geom = d_prev.min(d_next).min(d_tol);
    let r_geom = tan_theta * d_geom;
    trace!(d_geom, r_geom, "geometric bounds");

    // Velocity allowed by normal acceleration on the geometric radius,
    // then shrink the radius to what that velocity actually needs.
    let v_normal = (a_n_max * r_geom).sqrt();
    let mut v_upper = v_req.min(v_normal);
    let r_normal = v_upper * v_upper / a_n_max;
    let r_upper = r_normal.min(r_geom);
    let mut d_upper = r_upper / tan_theta;

    let phi = std::f64::consts::PI - theta * 2.0;
    let l_prev = l1 - d_upper;

    if l_prev < -MAG_EPSILON {
        debug!(l_prev, "negative remnant length");
        return None;
    } else if l_prev < MAG_EPSILON {
        // Consume the previous segment entirely rather than leave a
        // degenerate sliver.
        d_upper += l_prev;
    } else {
        // The arc must span at least one servo tick at v_upper. When the
        // segments are short there may be no overlap between the arc
        // equation's lower bound on d and the sample time's upper bound;
        // compromise on segment length.
        let v_sample = phi * d_upper * tan_theta / ctx.cycle_time;
        v_upper = v_upper.min(v_sample);

        let d_sample = v_upper * ctx.cycle_time / (phi * tan_theta);
        let v1_sample = (l1 - d_sample) / ctx.cycle_time;

        // Too big a bite out of the previous line would leave it unable to
        // reach v_upper in the first place.
        if v1_sample < v_upper {
            d_upper = l1 / (1.0 + phi * tan_theta);
            v_upper = (l1 - d_upper) / ctx.cycle_time;
        }
        trace!(v_upper, d_upper, "sample-rate adjusted");
    }

    let r_upper = d_upper * tan_theta;
    trace!(r_upper, "final radius");

    // Quality gate: if the arc cannot beat the parabolic blend velocity,
    // the smoothing is not worth the queue surgery.
    let v_parabolic = blend_velocity(ctx, prev, Some(tc));
    if v_upper < v_parabolic {
        debug!(v_upper, v_parabolic, "arc slower than parabolic, abort");
        return None;
    }

    if r_upper < MAG_EPSILON {
        debug!(r_upper, "blend radius too small");
        return None;
    }

    let circle = match Circle::from_corner(start, middle, end, r_upper) {
        Some(c) => c,
        None => {
            debug!("corner arc fit failed");
            return None;
        }
    };

    // The rotary and auxiliary axes hold still through the corner (the
    // eligibility check guarantees they carry no motion).
    let abc_hold = CartLine::new(prev_line.abc.end, prev_line.abc.end);
    let uvw_hold = CartLine::new(prev_line.uvw.end, prev_line.uvw.end);

    // The arc is an extension of the previous segment: it inherits its
    // enables, sync settings, and velocity ceiling.
    Some(Segment {
        id: -1,
        geometry: SegmentGeometry::Circle(CircleCoords {
            xyz: circle,
            abc: abc_hold,
            uvw: uvw_hold,
        }),
        canon_kind: CanonKind::Arc,
        target: circle.planar_length(),
        reqvel: v_upper,
        maxvel: prev.maxvel,
        maxaccel: a_max,
        accel_scale: ARC_ACCEL_SCALE,
        cycle_time: ctx.cycle_time,
        term_cond: TermCond::Tangent,
        tolerance: 0.0,
        sync: prev.sync,
        uu_per_rev: prev.uu_per_rev,
        atspeed: prev.atspeed,
        enables: prev.enables,
        syncdio: DioBatch::default(),
        index_rotary: None,
        ..Default::default()
    })
}

/// Trim the two lines to meet the spliced arc. Returns `true` when the
/// previous segment collapsed to zero length and must be popped.
pub fn connect_blend_arc(prev: &mut Segment, tc: &mut Segment, blend: &Segment) -> bool {
    let circle = match &blend.geometry {
        SegmentGeometry::Circle(c) => &c.xyz,
        _ => return false,
    };

    let arc_start = circle.point(0.0);
    let arc_end = circle.point(circle.angle);

    if let SegmentGeometry::Line(line) = &mut prev.geometry {
        line.xyz = CartLine::new(line.xyz.start, arc_start);
        prev.target = line.xyz.mag;
    }
    if let SegmentGeometry::Line(line) = &mut tc.geometry {
        line.xyz = CartLine::new(arc_end, line.xyz.end);
        tc.target = line.xyz.mag;
    }
    prev.term_cond = TermCond::Tangent;

    if prev.target < MAG_EPSILON {
        debug!(id = prev.id, "previous segment consumed by blend arc");
        return true;
    }
    false
}

// ─── Tests ──────────────────────────────────────────────────────────
