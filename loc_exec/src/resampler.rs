//! # Resampler
//!
//! Draws the next generation of the cloud with replacement, with probability proportional to
//! weight. Draws use the cloud's cumulative weight distribution with a binary search, so a
//! particle with zero weight can never be chosen.
//!
//! The first `floor(sample_factor * N)` particles are independent draws. The rest of the
//! generation is filled according to the configured [`FillStrategy`]. Every new particle gets
//! fresh Gaussian noise on its position and heading, and a weight of `1 / N`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use rand::Rng;

use comms_if::tc::FillStrategy;

use crate::{
    cloud::{CloudError, Particle, ParticleCloud},
    params::LocParams,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Replace the cloud with a resampled generation of the same size.
///
/// The cloud's weights must be normalised. Resampling an empty cloud does nothing.
pub fn resample<R: Rng + ?Sized>(
    cloud: &mut ParticleCloud,
    params: &LocParams,
    rng: &mut R,
) -> Result<(), CloudError> {
    let n = cloud.len();
    if n == 0 {
        return Ok(());
    }

    cloud.check_normalised()?;

    let num_drawn = ((params.sample_factor * n as f64).floor() as usize).min(n);
    let weight = 1.0 / n as f64;
    let (sigma_l, sigma_a) = (
        params.resample_linear_sigma_m,
        params.resample_angular_sigma_rad,
    );

    // Take the scratch buffers out of the cloud while the generations are borrowed
    let mut cdf = std::mem::take(&mut cloud.cdf);
    let mut draws = std::mem::take(&mut cloud.draws);

    {
        let (current, next) = cloud.generations();

        build_cdf(current, &mut cdf);
        let total = cdf[n - 1];

        draws.clear();
        draws.extend((0..num_drawn).map(|_| draw(&cdf, total, rng)));

        for &i in draws.iter() {
            next.push(Particle::new(current[i].pose.perturbed(sigma_l, sigma_a, rng), weight));
        }

        for k in 0..(n - num_drawn) {
            let i = match params.fill_strategy {
                FillStrategy::ReuseDraws if num_drawn > 0 => draws[k % num_drawn],
                _ => draw(&cdf, total, rng),
            };

            next.push(Particle::new(current[i].pose.perturbed(sigma_l, sigma_a, rng), weight));
        }
    }

    cloud.swap_generations();
    cloud.cdf = cdf;
    cloud.draws = draws;

    trace!(
        "Resampled {} particles ({} drawn, {} filled with {:?})",
        n,
        num_drawn,
        n - num_drawn,
        params.fill_strategy
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Fill `cdf` with the running sum of the particle weights.
fn build_cdf(particles: &[Particle], cdf: &mut Vec<f64>) {
    let mut sum = 0.0;

    cdf.clear();
    cdf.extend(particles.iter().map(|p| {
        sum += p.weight;
        sum
    }));
}

/// Draw an index from the cumulative distribution.
///
/// The index returned is the first whose cumulative weight is strictly greater than a uniform
/// sample from `[0, total)`, so empty buckets are never selected.
fn draw<R: Rng + ?Sized>(cdf: &[f64], total: f64, rng: &mut R) -> usize {
    let u = rng.gen_range(0.0..total);

    cdf.partition_point(|&c| c <= u).min(cdf.len() - 1)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
