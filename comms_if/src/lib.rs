//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the localisation software: sensor
//! readings going in, telecommands configuring the filter, and telemetry coming out.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Readings from equipment (odometry and lidar)
pub mod eqpt;

pub mod msg;
pub mod tc;
pub mod tm;
