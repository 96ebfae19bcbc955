//! # Lidar readings
//!
//! A scan is a list of beams, each a bearing in the robot frame and the range at which the beam
//! returned. Beams which did not return, or returned outside the sensor's valid range, are still
//! carried in the scan so that bearings line up with the raw sensor output.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::eqpt::odom::OdomPose;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// A single lidar beam
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    /// Bearing of the beam in the robot frame, positive anticlockwise from the robot's heading.
    ///
    /// Units: radians
    pub bearing_rad: f64,

    /// Measured range, or `None` if the beam had no return.
    ///
    /// Units: meters
    pub range_m: Option<f64>,
}

/// A full lidar scan captured at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    /// Sequence number, strictly increasing between scans
    pub seq: u64,

    /// Capture time
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    /// Minimum valid range of the sensor
    ///
    /// Units: meters
    pub range_min_m: f64,

    /// Maximum valid range of the sensor
    ///
    /// Units: meters
    pub range_max_m: f64,

    /// The pose reported by odometry when the scan was captured, if known
    #[serde(default)]
    pub odom_pose: Option<OdomPose>,

    /// All beams in the scan, in bearing order
    pub beams: Vec<Beam>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl LaserScan {
    /// Build a scan from evenly spaced ranges, starting at `bearing_min_rad` and incrementing by
    /// `bearing_inc_rad`.
    ///
    /// Non-finite ranges are stored as no return.
    pub fn from_ranges(
        seq: u64,
        timestamp_s: f64,
        range_min_m: f64,
        range_max_m: f64,
        bearing_min_rad: f64,
        bearing_inc_rad: f64,
        ranges: &[f64],
    ) -> Self {
        let beams = ranges
            .iter()
            .enumerate()
            .map(|(i, &r)| Beam {
                bearing_rad: bearing_min_rad + i as f64 * bearing_inc_rad,
                range_m: if r.is_finite() { Some(r) } else { None },
            })
            .collect();

        Self {
            seq,
            timestamp_s,
            range_min_m,
            range_max_m,
            odom_pose: None,
            beams,
        }
    }

    /// Returns the range of the beam if it's valid, i.e. it returned, is finite, and is inside
    /// the sensor's valid range.
    pub fn valid_range(&self, beam: &Beam) -> Option<f64> {
        match beam.range_m {
            Some(r) if r.is_finite() && r >= self.range_min_m && r <= self.range_max_m => Some(r),
            _ => None,
        }
    }

    /// Number of valid beams in the scan.
    pub fn num_valid(&self) -> usize {
        self.beams
            .iter()
            .filter(|b| self.valid_range(b).is_some())
            .count()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_valid_range() {
        let scan = LaserScan::from_ranges(
            0,
            0.0,
            0.1,
            5.0,
            0.0,
            0.1,
            &[1.0, std::f64::NAN, 0.05, 5.0, 6.0, std::f64::INFINITY],
        );

        let valid: Vec<_> = scan.beams.iter().map(|b| scan.valid_range(b)).collect();

        assert_eq!(valid, vec![Some(1.0), None, None, Some(5.0), None, None]);
        assert_eq!(scan.num_valid(), 2);
        assert!((scan.beams[3].bearing_rad - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_scan_json() {
        let scan: LaserScan = serde_json::from_str(
            r#"{
                "seq": 4,
                "timestamp_s": 1.5,
                "range_min_m": 0.1,
                "range_max_m": 5.0,
                "beams": [
                    {"bearing_rad": 0.0, "range_m": 1.0},
                    {"bearing_rad": 0.1, "range_m": null}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scan.seq, 4);
        assert!(scan.odom_pose.is_none());
        assert_eq!(scan.num_valid(), 1);
    }
}
