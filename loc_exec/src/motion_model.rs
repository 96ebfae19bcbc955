//! # Motion model
//!
//! Advances every particle by an odometry displacement. The displacement is given in the robot
//! body frame, so it is rotated by each particle's own heading before being applied. Gaussian
//! noise proportional to the size of the displacement is then added independently to each
//! particle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use rand::Rng;

use comms_if::eqpt::odom::OdomDelta;

use crate::{
    cloud::ParticleCloud,
    geom::{Pose, gaussian},
    params::LocParams,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Propagate every particle in the cloud by `delta`.
///
/// A delta with no movement leaves the cloud untouched and consumes no random numbers.
pub fn propagate<R: Rng + ?Sized>(
    cloud: &mut ParticleCloud,
    delta: &OdomDelta,
    params: &LocParams,
    rng: &mut R,
) {
    if delta.is_zero() {
        return;
    }

    let linear_sigma_m = params.motion_linear_noise_ratio * delta.linear_m();
    let angular_sigma_rad = params.motion_angular_noise_ratio * delta.angular_rad();

    let delta_b = Pose {
        position_m: Vector2::new(delta.forward_m, delta.strafe_m),
        heading_rad: delta.heading_rad,
    };

    for particle in cloud.particles_mut() {
        let moved = particle.pose.compose(&delta_b);

        particle.pose = Pose::from_parts(
            moved.position_m
                + Vector2::new(
                    gaussian(rng, linear_sigma_m),
                    gaussian(rng, linear_sigma_m),
                ),
            moved.heading_rad + gaussian(rng, angular_sigma_rad),
        );
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
