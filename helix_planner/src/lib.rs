//! # Helix Trajectory Planner
//!
//! Real-time trajectory planner core for the Helix motion kernel. Accepts a
//! stream of geometric motion commands (lines, circular/helical arcs,
//! rigid-tap cycles) and, on every fixed servo tick, produces a new
//! nine-axis Cartesian setpoint while honouring per-segment velocity and
//! acceleration limits, blending, feed override, pause/abort, and spindle
//! synchronisation.
//!
//! ## Architecture
//!
//! 1. **Segment queue** — bounded ring of parameterised segments
//! 2. **Blend-arc builder** — splices tangent arcs into eligible corners
//! 3. **Look-ahead optimiser** — propagates safe end velocities backwards
//! 4. **Profiler** — per-tick trapezoidal step with a final-velocity term
//! 5. **Cycle driver** — complete / activate / blend / advance / publish
//!
//! ## Zero-Allocation RT Loop
//!
//! The queue arena is allocated once at planner creation; segments are
//! stored by value. [`Planner::run_tick`] allocates nothing, never blocks,
//! and models every wait (spindle at-speed, index latch, rotary unlock) as
//! a stall state that simply returns without advancing motion.

pub mod blend;
pub mod cycle;
pub mod error;
pub mod io;
pub mod lookahead;
pub mod planner;
pub mod profile;
pub mod queue;
pub mod rigidtap;
pub mod segment;
pub mod sync;

pub use error::PlannerError;
pub use io::{MotionIo, NullIo};
pub use planner::Planner;
