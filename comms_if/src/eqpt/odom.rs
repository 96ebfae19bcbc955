//! # Odometry readings

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Displacement of the robot since the previous odometry reading, expressed in the robot's body
/// frame at the previous reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OdomDelta {
    /// Sequence number, strictly increasing between readings
    pub seq: u64,

    /// Time the reading was taken at
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    /// Displacement along the robot's heading
    ///
    /// Units: meters
    pub forward_m: f64,

    /// Displacement to the robot's left
    ///
    /// Units: meters
    #[serde(default)]
    pub strafe_m: f64,

    /// Change in heading, positive anticlockwise
    ///
    /// Units: radians
    pub heading_rad: f64,
}

/// A pose reported by the odometry source, used as a reference for when a reading was captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OdomPose {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl OdomDelta {
    /// Magnitude of the linear part of the displacement.
    pub fn linear_m(&self) -> f64 {
        self.forward_m.hypot(self.strafe_m)
    }

    /// Magnitude of the angular part of the displacement.
    pub fn angular_rad(&self) -> f64 {
        self.heading_rad.abs()
    }

    /// Returns `true` if the reading contains no movement at all.
    pub fn is_zero(&self) -> bool {
        self.forward_m == 0.0 && self.strafe_m == 0.0 && self.heading_rad == 0.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_magnitudes() {
        let d = OdomDelta {
            forward_m: 3.0,
            strafe_m: -4.0,
            heading_rad: -0.5,
            ..Default::default()
        };

        assert_eq!(d.linear_m(), 5.0);
        assert_eq!(d.angular_rad(), 0.5);
        assert!(!d.is_zero());
        assert!(OdomDelta::default().is_zero());
    }

    #[test]
    fn test_strafe_defaults() {
        let d: OdomDelta = serde_json::from_str(
            r#"{"seq": 2, "timestamp_s": 0.2, "forward_m": 0.1, "heading_rad": 0.0}"#
        ).unwrap();

        assert_eq!(d.strafe_m, 0.0);
    }
}
