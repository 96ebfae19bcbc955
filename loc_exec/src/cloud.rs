//! # Particle cloud
//!
//! The cloud owns two particle buffers. The current generation is mutated in place by the
//! motion and sensor models, while resampling writes the next generation into the second buffer
//! and swaps them. After a swap the second buffer still holds the weighted generation the
//! resampler drew from, which is what cloud snapshots publish.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use rand::Rng;
use serde::Serialize;

use comms_if::tm::{CloudSnapshot, WeightedPose};

use crate::geom::Pose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Weight sums at or below this are treated as all zero.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-12;

/// Maximum distance of the weight sum from 1 for the cloud to count as normalised.
pub const NORMALISED_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// One hypothesis of the robot's pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Particle {
    pub pose: Pose,
    pub weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ParticleCloud {
    /// The current generation
    current: Vec<Particle>,

    /// The previous generation after resampling, otherwise scratch space
    next: Vec<Particle>,

    /// `true` if `next` holds the weighted generation of the last resample
    next_is_weighted: bool,

    /// Scratch space for the resampler's cumulative distribution
    pub(crate) cdf: Vec<f64>,

    /// Scratch space for the resampler's draws
    pub(crate) draws: Vec<usize>,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Result of normalising the cloud's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalisation {
    /// Weights were divided by their sum
    Normalised,

    /// The weights summed to (effectively) zero, or weren't finite, so all weights were reset to
    /// uniform.
    Degenerate,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CloudError {
    #[error("The particle cloud is empty")]
    EmptyCloud,

    #[error("The particle weights are not normalised (sum = {0})")]
    WeightsNotNormalised(f64),

    #[error("Particle {0} has a weight of {1}, weights must be finite and non-negative")]
    InvalidWeight(usize, f64),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Particle {
    pub fn new(pose: Pose, weight: f64) -> Self {
        Self { pose, weight }
    }
}

impl ParticleCloud {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cloud from the given particles, as is. Weights are not normalised.
    pub fn from_particles(particles: Vec<Particle>) -> Self {
        Self {
            current: particles,
            ..Default::default()
        }
    }

    /// Replace the whole cloud with `num_particles` particles drawn from a Gaussian around
    /// `seed`, each with weight `1 / num_particles`.
    ///
    /// Zero sigmas place every particle exactly on the seed.
    pub fn init_gaussian<R: Rng + ?Sized>(
        &mut self,
        num_particles: usize,
        seed: &Pose,
        linear_sigma_m: f64,
        angular_sigma_rad: f64,
        rng: &mut R,
    ) {
        let weight = uniform_weight(num_particles);

        self.current.clear();
        self.current.extend((0..num_particles).map(|_| {
            Particle::new(seed.perturbed(linear_sigma_m, angular_sigma_rad, rng), weight)
        }));

        // The old buffers may be far larger than needed after shrinking the cloud
        self.current.shrink_to_fit();
        self.next.clear();
        self.next.shrink_to_fit();
        self.next_is_weighted = false;

        trace!(
            "Cloud initialised with {} particles around {:?}",
            num_particles,
            seed
        );
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.current
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.current
    }

    pub fn total_weight(&self) -> f64 {
        self.current.iter().map(|p| p.weight).sum()
    }

    /// Set every weight to `1 / len`.
    pub fn set_uniform_weights(&mut self) {
        let weight = uniform_weight(self.current.len());

        for p in self.current.iter_mut() {
            p.weight = weight;
        }
    }

    /// Divide every weight by the sum of all weights.
    ///
    /// If the sum is not greater than [`WEIGHT_SUM_EPSILON`], or isn't finite, the weights are
    /// reset to uniform and [`Normalisation::Degenerate`] is returned.
    pub fn normalise(&mut self) -> Normalisation {
        let total = self.total_weight();

        if !total.is_finite() || total <= WEIGHT_SUM_EPSILON {
            self.set_uniform_weights();
            return Normalisation::Degenerate;
        }

        for p in self.current.iter_mut() {
            p.weight /= total;
        }

        Normalisation::Normalised
    }

    /// Check every weight is finite and non-negative, and that the weights sum to 1 within
    /// [`NORMALISED_TOLERANCE`].
    pub fn check_normalised(&self) -> Result<(), CloudError> {
        if self.current.is_empty() {
            return Err(CloudError::EmptyCloud);
        }

        // Also catches NaN, which would otherwise pass the sum check below
        if let Some((i, p)) = self
            .current
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.weight.is_finite() && p.weight >= 0.0))
        {
            return Err(CloudError::InvalidWeight(i, p.weight));
        }

        let total = self.total_weight();
        if (total - 1.0).abs() <= NORMALISED_TOLERANCE {
            Ok(())
        } else {
            Err(CloudError::WeightsNotNormalised(total))
        }
    }

    /// A copy of the last weighted generation, or of the current generation if the cloud has
    /// not been resampled since initialisation.
    pub fn snapshot(&self, timestamp_s: f64) -> CloudSnapshot {
        let source = if self.next_is_weighted {
            &self.next
        } else {
            &self.current
        };

        CloudSnapshot {
            timestamp_s,
            particles: source
                .iter()
                .map(|p| WeightedPose {
                    x_m: p.pose.x_m(),
                    y_m: p.pose.y_m(),
                    heading_rad: p.pose.heading_rad,
                    weight: p.weight,
                })
                .collect(),
        }
    }

    /// Split the cloud into the current generation and the (cleared) buffer for the next one.
    pub(crate) fn generations(&mut self) -> (&[Particle], &mut Vec<Particle>) {
        self.next.clear();
        (&self.current, &mut self.next)
    }

    /// Make the next generation current.
    pub(crate) fn swap_generations(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
        self.next_is_weighted = true;
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn uniform_weight(num_particles: usize) -> f64 {
    if num_particles == 0 {
        0.0
    } else {
        1.0 / num_particles as f64
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
