//! # Planar geometry
//!
//! Poses and the rigid transforms between the robot body frame and the map frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Rotation2, Vector2};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// The pose (position and heading) of the robot body frame in the map frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the map frame
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// Heading, anticlockwise from the map's x axis, always in (-pi, pi].
    ///
    /// Units: radians
    pub heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self::from_parts(Vector2::new(x_m, y_m), heading_rad)
    }

    pub fn from_parts(position_m: Vector2<f64>, heading_rad: f64) -> Self {
        Self {
            position_m,
            heading_rad: wrap_pi(heading_rad),
        }
    }

    pub fn x_m(&self) -> f64 {
        self.position_m[0]
    }

    pub fn y_m(&self) -> f64 {
        self.position_m[1]
    }

    /// Rotation from the body frame into the map frame.
    pub fn rotation(&self) -> Rotation2<f64> {
        Rotation2::new(self.heading_rad)
    }

    /// Transform a point given in the body frame into the map frame.
    pub fn transform_point(&self, point_b: &Vector2<f64>) -> Vector2<f64> {
        self.position_m + self.rotation() * point_b
    }

    /// Compose a body frame displacement onto this pose, i.e. `self ⊕ delta`.
    pub fn compose(&self, delta: &Pose) -> Pose {
        Pose::from_parts(
            self.transform_point(&delta.position_m),
            self.heading_rad + delta.heading_rad,
        )
    }

    /// The map frame point at which a beam of the given bearing and range ends.
    #[inline]
    pub fn beam_endpoint(&self, bearing_rad: f64, range_m: f64) -> Vector2<f64> {
        let angle = self.heading_rad + bearing_rad;

        Vector2::new(
            self.position_m[0] + range_m * angle.cos(),
            self.position_m[1] + range_m * angle.sin(),
        )
    }

    /// Return a copy of this pose with independent zero-mean Gaussian noise added to each
    /// position axis and to the heading.
    pub fn perturbed<R: Rng + ?Sized>(
        &self,
        linear_sigma_m: f64,
        angular_sigma_rad: f64,
        rng: &mut R,
    ) -> Pose {
        Pose::from_parts(
            self.position_m
                + Vector2::new(
                    gaussian(rng, linear_sigma_m),
                    gaussian(rng, linear_sigma_m),
                ),
            self.heading_rad + gaussian(rng, angular_sigma_rad),
        )
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Draw a sample from a zero-mean normal distribution with standard deviation `sigma`.
///
/// No random number is consumed when `sigma` is zero.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    if sigma == 0.0 {
        return 0.0;
    }

    let z: f64 = rng.sample(StandardNormal);
    z * sigma
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_new_wraps_heading() {
        assert_eq!(Pose::new(0.0, 0.0, -PI).heading_rad, PI);
        assert_relative_eq!(Pose::new(0.0, 0.0, 2.0 * PI + 0.1).heading_rad, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_point() {
        let pose = Pose::new(1.0, 2.0, FRAC_PI_2);
        let p = pose.transform_point(&Vector2::new(1.0, 0.0));

        assert!((p - Vector2::new(1.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_compose() {
        let pose = Pose::new(1.0, 1.0, PI);
        let composed = pose.compose(&Pose::new(2.0, 0.5, FRAC_PI_2));

        assert!((composed.position_m - Vector2::new(-1.0, 0.5)).norm() < 1e-12);
        assert_relative_eq!(composed.heading_rad, -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_beam_endpoint() {
        let pose = Pose::new(0.0, 0.0, FRAC_PI_2);
        let end = pose.beam_endpoint(-FRAC_PI_2, 2.0);

        assert!((end - Vector2::new(2.0, 0.0)).norm() < 1e-12);
        assert!((end - pose.transform_point(&Vector2::new(0.0, -2.0))).norm() < 1e-12);
    }

    #[test]
    fn test_perturbed() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let pose = Pose::new(0.5, -0.5, 3.1);

        assert_eq!(pose.perturbed(0.0, 0.0, &mut rng), pose);

        for _ in 0..1000 {
            let p = pose.perturbed(0.1, 0.5, &mut rng);
            assert!(p.heading_rad > -PI && p.heading_rad <= PI);
            assert!((p.position_m - pose.position_m).norm() < 1.0);
        }
    }
}
