//! Planner API error type.
//!
//! Only the producer-side command surface is fallible. The per-tick cycle
//! driver recovers from every condition locally and never returns an error.

use thiserror::Error;

/// Errors returned by the planner command API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// A parameter was out of range for the call.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The motion queue is at capacity; the goal pose was not advanced.
    #[error("motion queue is full")]
    QueueFull,

    /// The planner is draining an abort; no new motion is accepted.
    #[error("planner is aborting")]
    Aborting,

    /// Rigid tapping requires spindle synchronisation to be configured.
    #[error("cannot add unsynchronized rigid tap move")]
    UnsynchronizedTap,

    /// A motion id outside the valid range was supplied.
    #[error("invalid motion id {0}")]
    InvalidMotionId(i32),
}
