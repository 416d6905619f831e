//! Cartesian line and circle parametrisation.
//!
//! Both primitives are parameterised by arclength so a motion segment can
//! ask "where am I after travelling s units" in closed form. Circles carry
//! an optional helical rise along the plane normal, which makes the same
//! type cover arcs, full circles, and helixes.

use serde::{Deserialize, Serialize};

use crate::consts::{ANGLE_EPSILON, MAG_EPSILON};
use crate::pose::Cart;

// ─── Line ───────────────────────────────────────────────────────────

/// A straight Cartesian segment from `start` to `end`.
///
/// `u_vec` is only meaningful when `mag_zero` is false; a zero-length line
/// is still a valid object (it parks at `start`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartLine {
    pub start: Cart,
    pub end: Cart,
    pub u_vec: Cart,
    pub mag: f64,
    pub mag_zero: bool,
}

impl CartLine {
    /// Build a line between two points, computing direction and magnitude.
    pub fn new(start: Cart, end: Cart) -> Self {
        let delta = end - start;
        let mag = delta.mag();
        match delta.try_unit() {
            Some(u_vec) => Self {
                start,
                end,
                u_vec,
                mag,
                mag_zero: false,
            },
            None => Self {
                start,
                end,
                u_vec: Cart::ZERO,
                mag: 0.0,
                mag_zero: true,
            },
        }
    }

    /// Point at arclength `s` from the start. Values outside `0..=mag`
    /// extrapolate along the line.
    #[inline]
    pub fn point(&self, s: f64) -> Cart {
        if self.mag_zero {
            self.start
        } else {
            self.start + self.u_vec * s
        }
    }
}

// ─── Circle ─────────────────────────────────────────────────────────

/// A circular arc (optionally helical) around `center` in the plane
/// perpendicular to `normal`.
///
/// `r_tan` and `r_perp` are unit vectors spanning the plane, with `r_tan`
/// pointing at the arc start; `angle` is the total sweep in radians and
/// `r_helix` the total rise along the normal over the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Circle {
    pub center: Cart,
    pub normal: Cart,
    pub r_tan: Cart,
    pub r_perp: Cart,
    pub radius: f64,
    pub angle: f64,
    pub r_helix: Cart,
}

impl Circle {
    /// Build an arc from its start/end points, centre, plane normal, and
    /// full-turn count. Returns `None` for degenerate input (zero radius,
    /// unusable normal, or an endpoint on the axis).
    pub fn new(start: Cart, end: Cart, center: Cart, normal: Cart, turn: u32) -> Option<Self> {
        let n = normal.try_unit()?;

        let v_start = start - center;
        let r_start = v_start - n * v_start.dot(&n);
        let radius = r_start.mag();
        if radius < MAG_EPSILON {
            return None;
        }

        let v_end = end - center;
        let r_end = v_end - n * v_end.dot(&n);
        if r_end.mag() < MAG_EPSILON {
            return None;
        }

        let r_tan = r_start.scale(1.0 / radius);
        let r_perp = n.cross(&r_tan);

        let mut angle = f64::atan2(r_end.dot(&r_perp), r_end.dot(&r_tan));
        if angle < ANGLE_EPSILON {
            // Zero comes out as a full revolution; negative sweeps wrap.
            angle += 2.0 * std::f64::consts::PI;
        }
        angle += turn as f64 * 2.0 * std::f64::consts::PI;

        let r_helix = n * (end - start).dot(&n);

        Some(Self {
            center,
            normal: n,
            r_tan,
            r_perp,
            radius,
            angle,
            r_helix,
        })
    }

    /// Fit an arc of the given radius into the corner `middle`, tangent to
    /// the incoming leg `start → middle` and the outgoing leg `middle → end`.
    ///
    /// Returns `None` when either leg is degenerate or the legs are
    /// (anti-)parallel, in which case no finite tangent arc exists.
    pub fn from_corner(start: Cart, middle: Cart, end: Cart, radius: f64) -> Option<Self> {
        let u1 = (middle - start).try_unit()?;
        let u2 = (end - middle).try_unit()?;

        let dot = u1.dot(&u2);
        if !(-1.0..=1.0).contains(&dot) {
            return None;
        }
        // Half the supplement of the corner angle.
        let theta = f64::acos(-dot) / 2.0;
        let sin_theta = theta.sin();
        let tan_theta = theta.tan();
        if sin_theta < MAG_EPSILON || tan_theta < MAG_EPSILON {
            return None;
        }

        let d = radius / tan_theta;
        let arc_start = middle - u1 * d;
        let arc_end = middle + u2 * d;

        let bisector = (u2 - u1).try_unit()?;
        let center = middle + bisector * (radius / sin_theta);
        let normal = u1.cross(&u2).try_unit()?;

        Self::new(arc_start, arc_end, center, normal, 0)
    }

    /// Point at sweep position `phi` ∈ `0..=angle`, including the
    /// proportional helical rise.
    #[inline]
    pub fn point(&self, phi: f64) -> Cart {
        let radial = self.r_tan * (self.radius * phi.cos()) + self.r_perp * (self.radius * phi.sin());
        let rise = if self.angle > MAG_EPSILON {
            self.r_helix * (phi / self.angle)
        } else {
            Cart::ZERO
        };
        self.center + radial + rise
    }

    /// Unit tangent (in the circle plane) at sweep position `phi`.
    #[inline]
    pub fn tangent(&self, phi: f64) -> Cart {
        self.r_perp * phi.cos() - self.r_tan * phi.sin()
    }

    /// Planar arc length: sweep times radius, excluding the helical rise.
    #[inline]
    pub fn planar_length(&self) -> f64 {
        self.angle * self.radius
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
