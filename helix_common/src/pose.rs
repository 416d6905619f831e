//! Nine-axis pose algebra.
//!
//! A [`Pose`] carries translation (x, y, z), rotary (a, b, c), and auxiliary
//! (u, v, w) coordinates. No rotation algebra is involved: the rotary and
//! auxiliary axes are treated as mutually orthogonal linear axes, so poses
//! form an additive group and split naturally into three [`Cart`] triples.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::consts::MAG_EPSILON;

/// A 3-component Cartesian vector in double precision.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cart {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cart {
    pub const ZERO: Cart = Cart {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &Cart) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[inline]
    pub fn cross(&self, other: &Cart) -> Cart {
        Cart {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Euclidean magnitude.
    #[inline]
    pub fn mag(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(&self, s: f64) -> Cart {
        Cart {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    /// Unit vector, or `None` when the magnitude is below [`MAG_EPSILON`].
    #[inline]
    pub fn try_unit(&self) -> Option<Cart> {
        let m = self.mag();
        if m < MAG_EPSILON {
            None
        } else {
            Some(self.scale(1.0 / m))
        }
    }
}

impl Add for Cart {
    type Output = Cart;

    #[inline]
    fn add(self, rhs: Cart) -> Cart {
        Cart::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Cart {
    type Output = Cart;

    #[inline]
    fn sub(self, rhs: Cart) -> Cart {
        Cart::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Cart {
    type Output = Cart;

    #[inline]
    fn neg(self) -> Cart {
        Cart::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Cart {
    type Output = Cart;

    #[inline]
    fn mul(self, s: f64) -> Cart {
        self.scale(s)
    }
}

/// A nine-axis machine pose.
///
/// `tran` is the tool-tip translation; `a`/`b`/`c` are the rotary axes and
/// `u`/`v`/`w` the auxiliary linear axes, all in user units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub tran: Cart,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

impl Pose {
    pub const ZERO: Pose = Pose {
        tran: Cart::ZERO,
        a: 0.0,
        b: 0.0,
        c: 0.0,
        u: 0.0,
        v: 0.0,
        w: 0.0,
    };

    /// Break the pose into (xyz, abc, uvw) Cartesian triples.
    ///
    /// The rotary and auxiliary axes become two further 3-vectors so line
    /// geometry can treat all nine axes uniformly.
    #[inline]
    pub fn to_parts(&self) -> (Cart, Cart, Cart) {
        (
            self.tran,
            Cart::new(self.a, self.b, self.c),
            Cart::new(self.u, self.v, self.w),
        )
    }

    /// Assemble a pose from (xyz, abc, uvw) Cartesian triples.
    #[inline]
    pub fn from_parts(xyz: Cart, abc: Cart, uvw: Cart) -> Pose {
        Pose {
            tran: xyz,
            a: abc.x,
            b: abc.y,
            c: abc.z,
            u: uvw.x,
            v: uvw.y,
            w: uvw.z,
        }
    }
}

impl Add for Pose {
    type Output = Pose;

    #[inline]
    fn add(self, rhs: Pose) -> Pose {
        Pose {
            tran: self.tran + rhs.tran,
            a: self.a + rhs.a,
            b: self.b + rhs.b,
            c: self.c + rhs.c,
            u: self.u + rhs.u,
            v: self.v + rhs.v,
            w: self.w + rhs.w,
        }
    }
}

impl AddAssign for Pose {
    #[inline]
    fn add_assign(&mut self, rhs: Pose) {
        *self = *self + rhs;
    }
}

impl Sub for Pose {
    type Output = Pose;

    #[inline]
    fn sub(self, rhs: Pose) -> Pose {
        Pose {
            tran: self.tran - rhs.tran,
            a: self.a - rhs.a,
            b: self.b - rhs.b,
            c: self.c - rhs.c,
            u: self.u - rhs.u,
            v: self.v - rhs.v,
            w: self.w - rhs.w,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
