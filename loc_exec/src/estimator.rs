//! # Pose estimator
//!
//! Reduces a weighted cloud to a single pose. Position is the weighted arithmetic mean, heading
//! is the weighted circular mean.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;

use crate::{
    cloud::{CloudError, ParticleCloud},
    geom::Pose,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Best guess of the robot's pose, with a measure of how spread out the cloud is around it.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Estimate {
    pub pose: Pose,
    pub spread: EstimateSpread,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EstimateSpread {
    /// Weighted standard deviation of the particles' x position
    ///
    /// Units: meters
    pub std_x_m: f64,

    /// Weighted standard deviation of the particles' y position
    ///
    /// Units: meters
    pub std_y_m: f64,

    /// Length of the weighted mean heading vector. 1 when every particle has the same heading,
    /// near 0 when the headings cancel out and the mean heading is meaningless.
    pub heading_concentration: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the weighted mean pose of the cloud.
///
/// The weights must already be normalised, and the cloud must not be empty.
pub fn estimate(cloud: &ParticleCloud) -> Result<Estimate, CloudError> {
    cloud.check_normalised()?;

    let mut mean = Vector2::<f64>::zeros();
    let mut sum_cos = 0.0;
    let mut sum_sin = 0.0;

    for p in cloud.particles() {
        mean += p.pose.position_m * p.weight;
        sum_cos += p.weight * p.pose.heading_rad.cos();
        sum_sin += p.weight * p.pose.heading_rad.sin();
    }

    let mut var = Vector2::<f64>::zeros();
    for p in cloud.particles() {
        let d = p.pose.position_m - mean;
        var += d.component_mul(&d) * p.weight;
    }

    Ok(Estimate {
        pose: Pose::from_parts(mean, sum_sin.atan2(sum_cos)),
        spread: EstimateSpread {
            std_x_m: var[0].max(0.0).sqrt(),
            std_y_m: var[1].max(0.0).sqrt(),
            heading_concentration: sum_sin.hypot(sum_cos),
        },
    })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::cloud::Particle;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn cloud(poses: &[(f64, f64, f64)], weights: &[f64]) -> ParticleCloud {
        ParticleCloud::from_particles(
            poses
                .iter()
                .zip(weights.iter())
                .map(|(&(x, y, h), &w)| Particle::new(Pose::new(x, y, h), w))
                .collect(),
        )
    }

    #[test]
    fn test_weighted_position() {
        let c = cloud(&[(0.0, 0.0, 0.0), (4.0, 2.0, 0.0)], &[0.75, 0.25]);
        let est = estimate(&c).unwrap();

        assert_relative_eq!(est.pose.x_m(), 1.0);
        assert_relative_eq!(est.pose.y_m(), 0.5);
        assert_relative_eq!(est.pose.heading_rad, 0.0);

        // sqrt(0.75 * 1^2 + 0.25 * 3^2)
        assert_relative_eq!(est.spread.std_x_m, 3f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(est.spread.heading_concentration, 1.0);
    }

    #[test]
    fn test_circular_mean_small_angles() {
        let c = cloud(&[(0.0, 0.0, 0.1), (0.0, 0.0, -0.1)], &[0.5, 0.5]);
        let est = estimate(&c).unwrap();

        assert_relative_eq!(est.pose.heading_rad, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circular_mean_across_wrap() {
        // A naive mean of these would point the wrong way entirely
        let c = cloud(&[(0.0, 0.0, PI - 0.1), (0.0, 0.0, -PI + 0.1)], &[0.5, 0.5]);
        let est = estimate(&c).unwrap();

        assert_relative_eq!(est.pose.heading_rad.abs(), PI, epsilon = 1e-9);
        assert_relative_eq!(est.spread.heading_concentration, 0.1f64.cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_opposite_headings_well_defined() {
        let c = cloud(&[(0.0, 0.0, 0.0), (0.0, 0.0, PI)], &[0.5, 0.5]);
        let est = estimate(&c).unwrap();

        assert!(est.pose.heading_rad.is_finite());
        assert!(est.pose.heading_rad > -PI && est.pose.heading_rad <= PI);
        assert!(est.spread.heading_concentration < 1e-9);
    }

    #[test]
    fn test_preconditions() {
        assert_eq!(
            estimate(&ParticleCloud::new()).unwrap_err(),
            CloudError::EmptyCloud
        );
        assert!(matches!(
            estimate(&cloud(&[(0.0, 0.0, 0.0)], &[3.0])),
            Err(CloudError::WeightsNotNormalised(_))
        ));

        // Negative weights summing to 1 would put the mean outside every particle
        assert_eq!(
            estimate(&cloud(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)], &[-0.5, 1.5])).unwrap_err(),
            CloudError::InvalidWeight(0, -0.5)
        );
        assert!(matches!(
            estimate(&cloud(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)], &[std::f64::NAN, 1.0])),
            Err(CloudError::InvalidWeight(0, _))
        ));
    }
}
