//! Helix Common Library
//!
//! Shared leaf crate for the Helix motion kernel: nine-axis pose algebra,
//! Cartesian line/circle geometry, system-wide constants, TOML configuration
//! loading, and the status/spindle data structures exchanged with the
//! embedding real-time host.
//!
//! # Module Structure
//!
//! - [`pose`] - Nine-axis pose type and 3-vector algebra
//! - [`geometry`] - Cartesian line and circle parametrisation
//! - [`consts`] - Numeric limits, epsilons, and defaults
//! - [`config`] - Configuration loading traits and the planner config
//! - [`state`] - Compact state enums shared across the workspace
//! - [`status`] - Status block and spindle I/O structures

pub mod config;
pub mod consts;
pub mod geometry;
pub mod pose;
pub mod state;
pub mod status;
