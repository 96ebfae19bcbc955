//! # Equipment Interface
//!
//! This module defines the readings produced by the equipment the localiser consumes.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod lidar;
pub mod odom;
