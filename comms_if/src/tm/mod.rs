//! # Telemetry module
//!
//! Telemetry produced by the localiser: pose estimates after each filter update and snapshots
//! of the weighted particle cloud.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The localiser's best estimate of the robot's pose in the map frame.
///
/// All fields are flat so the estimate can be archived directly as a CSV row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    /// Timestamp of the scan which produced this estimate
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    /// Sequence number of the scan which produced this estimate
    pub scan_seq: u64,

    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Units: radians, in (-pi, pi]
    pub heading_rad: f64,

    /// Weighted standard deviation of particle x positions
    ///
    /// Units: meters
    pub std_x_m: f64,

    /// Weighted standard deviation of particle y positions
    ///
    /// Units: meters
    pub std_y_m: f64,

    /// Mean resultant length of the particle headings, 1 when all headings agree and 0 when they
    /// are fully dispersed.
    pub heading_concentration: f64,
}

/// One particle of a cloud snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedPose {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub weight: f64,
}

/// A read only copy of the whole particle cloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudSnapshot {
    /// Timestamp of the last input applied to the cloud
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    pub particles: Vec<WeightedPose>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CloudSnapshot {
    /// Sum of all particle weights.
    pub fn total_weight(&self) -> f64 {
        self.particles.iter().map(|p| p.weight).sum()
    }
}
