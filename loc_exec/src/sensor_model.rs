//! # Sensor model
//!
//! Likelihood field model. Each selected beam is projected from the particle's pose into the
//! map frame, the distance from its endpoint to the nearest obstacle is looked up, and that
//! distance is mapped to a likelihood through a zero-mean Gaussian with a floor. Per-beam
//! likelihoods are summed rather than multiplied, which keeps a few bad beams from wiping out
//! an otherwise good particle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use rayon::prelude::*;
use serde::Serialize;

use comms_if::eqpt::lidar::LaserScan;
use util::maths::gaussian_pdf;

use crate::{cloud::ParticleCloud, geom::Pose, map::MapQuery, params::LocParams};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Summary of one weighing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeighReport {
    /// Number of beams used per particle
    pub valid_beams: usize,

    /// Number of (particle, beam) pairs whose endpoint fell outside the known map
    pub out_of_bounds_beams: usize,

    /// `true` if there was nothing to weigh with, so all particles were given equal weight
    pub uniform_fallback: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Overwrite the weight of every particle with its raw (unnormalised) score against `scan`.
pub fn weigh<M>(
    cloud: &mut ParticleCloud,
    scan: &LaserScan,
    map: &M,
    params: &LocParams,
) -> WeighReport
where
    M: MapQuery + Sync + ?Sized,
{
    // Select every nth beam, dropping the invalid ones
    let beams: Vec<(f64, f64)> = scan
        .beams
        .iter()
        .step_by(params.beam_stride.max(1))
        .filter_map(|b| scan.valid_range(b).map(|r| (b.bearing_rad, r)))
        .collect();

    if beams.is_empty() || cloud.is_empty() {
        cloud.set_uniform_weights();

        return WeighReport {
            valid_beams: beams.len(),
            out_of_bounds_beams: 0,
            uniform_fallback: true,
        };
    }

    let out_of_bounds_beams: usize = if params.parallel_weighing {
        cloud
            .particles_mut()
            .par_iter_mut()
            .map(|p| {
                let (score, oob) = score_pose(&p.pose, &beams, map, params);
                p.weight = score;
                oob
            })
            .sum()
    } else {
        cloud
            .particles_mut()
            .iter_mut()
            .map(|p| {
                let (score, oob) = score_pose(&p.pose, &beams, map, params);
                p.weight = score;
                oob
            })
            .sum()
    };

    trace!(
        "Weighed {} particles with {} of {} valid beams ({} out of bounds)",
        cloud.len(),
        beams.len(),
        scan.num_valid(),
        out_of_bounds_beams
    );

    WeighReport {
        valid_beams: beams.len(),
        out_of_bounds_beams,
        uniform_fallback: false,
    }
}

/// Likelihood of a single beam whose endpoint is `distance_m` from the nearest obstacle, or
/// outside the known map if `None`.
pub fn beam_likelihood(distance_m: Option<f64>, params: &LocParams) -> f64 {
    match distance_m {
        Some(d) => gaussian_pdf(d.min(params.max_obstacle_distance_m), 0.0, params.model_noise_rate)
            .max(params.model_noise_floor),
        None => params.model_noise_floor,
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Score a single pose, returning the summed likelihood and the number of out of bounds beams.
fn score_pose<M>(pose: &Pose, beams: &[(f64, f64)], map: &M, params: &LocParams) -> (f64, usize)
where
    M: MapQuery + ?Sized,
{
    let mut score = 0.0;
    let mut oob = 0;

    for &(bearing_rad, range_m) in beams {
        let distance_m = map.nearest_obstacle_distance(&pose.beam_endpoint(bearing_rad, range_m));

        if distance_m.is_none() {
            oob += 1;
        }

        score += beam_likelihood(distance_m, params);
    }

    (score, oob)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::cloud::Particle;
    use crate::map::test_utils::box_room;
    use comms_if::eqpt::lidar::Beam;
    use nalgebra::Vector2;

    /// A map where everything right of x = 0 is free with the only obstacle on the line x = 0,
    /// and everything left of it is unknown.
    struct HalfPlane;

    impl MapQuery for HalfPlane {
        fn nearest_obstacle_distance(&self, point: &Vector2<f64>) -> Option<f64> {
            if point[0] < 0.0 {
                None
            } else {
                Some(point[0])
            }
        }
    }

    fn scan(beams: Vec<Beam>) -> LaserScan {
        LaserScan {
            range_min_m: 0.1,
            range_max_m: 10.0,
            beams,
            ..Default::default()
        }
    }

    fn params() -> LocParams {
        LocParams {
            beam_stride: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_beam_likelihood() {
        let p = params();

        assert_eq!(beam_likelihood(None, &p), p.model_noise_floor);
        assert_eq!(beam_likelihood(Some(10.0), &p), p.model_noise_floor);
        assert_eq!(
            beam_likelihood(Some(0.0), &p),
            gaussian_pdf(0.0, 0.0, p.model_noise_rate)
        );
        assert!(beam_likelihood(Some(0.01), &p) > beam_likelihood(Some(0.05), &p));
    }

    #[test]
    fn test_true_pose_has_max_weight() {
        let map = box_room();
        let true_pose = Pose::new(2.0, 1.5, 0.3);

        // Ray cast a perfect scan from the true pose
        let ranges: Vec<f64> = (0..360)
            .map(|i| {
                map.grid()
                    .raycast(&true_pose, (i as f64).to_radians(), 10.0)
                    .unwrap_or(std::f64::NAN)
            })
            .collect();
        let scan = LaserScan::from_ranges(0, 0.0, 0.05, 10.0, 0.0, 1f64.to_radians(), &ranges);

        let mut particles = vec![Particle::new(true_pose, 1.0)];
        for (dx, dy, dh) in [
            (0.3, 0.0, 0.0),
            (0.0, -0.4, 0.0),
            (0.0, 0.0, 0.4),
            (-0.5, 0.5, -0.2),
            (1.0, 0.2, 1.0),
        ]
        .iter()
        {
            particles.push(Particle::new(
                Pose::new(2.0 + dx, 1.5 + dy, 0.3 + dh),
                1.0,
            ));
        }
        let mut cloud = crate::cloud::ParticleCloud::from_particles(particles);

        let report = weigh(&mut cloud, &scan, &map, &LocParams::default());

        assert!(!report.uniform_fallback);
        assert_eq!(report.valid_beams, 72);

        let weights: Vec<f64> = cloud.particles().iter().map(|p| p.weight).collect();
        for w in weights[1..].iter() {
            assert!(weights[0] > *w, "true pose weight {} <= {}", weights[0], w);
        }
    }

    #[test]
    fn test_invalid_beams_skipped() {
        let mut cloud = ParticleCloud::from_particles(vec![Particle::new(Pose::new(1.0, 0.0, 0.0), 0.0)]);
        let p = params();

        // Backwards beam of 1 m ends on the obstacle, the others are invalid
        let s = scan(vec![
            Beam { bearing_rad: std::f64::consts::PI, range_m: Some(1.0) },
            Beam { bearing_rad: 0.0, range_m: None },
            Beam { bearing_rad: 0.0, range_m: Some(0.01) },
            Beam { bearing_rad: 0.0, range_m: Some(20.0) },
        ]);

        let report = weigh(&mut cloud, &s, &HalfPlane, &p);

        assert_eq!(report.valid_beams, 1);
        let expected = beam_likelihood(Some(0.0), &p);
        assert!((cloud.particles()[0].weight - expected).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_bounds_gets_floor() {
        let mut cloud = ParticleCloud::from_particles(vec![
            Particle::new(Pose::new(0.5, 0.0, std::f64::consts::PI), 0.0),
            Particle::new(Pose::new(5.0, 0.0, std::f64::consts::PI), 0.0),
        ]);
        let p = params();

        let s = scan(vec![Beam { bearing_rad: 0.0, range_m: Some(2.0) }]);
        let report = weigh(&mut cloud, &s, &HalfPlane, &p);

        assert_eq!(report.out_of_bounds_beams, 1);
        assert_eq!(cloud.particles()[0].weight, p.model_noise_floor);
        assert!(cloud.particles()[1].weight >= p.model_noise_floor);
    }

    #[test]
    fn test_no_valid_beams_is_uniform() {
        let mut cloud = ParticleCloud::from_particles(vec![
            Particle::new(Pose::new(0.5, 0.0, 0.0), 0.9),
            Particle::new(Pose::new(5.0, 0.0, 0.0), 0.1),
        ]);

        let s = scan(vec![Beam { bearing_rad: 0.0, range_m: None }]);
        let report = weigh(&mut cloud, &s, &HalfPlane, &params());

        assert!(report.uniform_fallback);
        assert_eq!(report.valid_beams, 0);
        assert!(cloud.particles().iter().all(|p| p.weight == 0.5));

        // And an empty scan
        let report = weigh(&mut cloud, &scan(vec![]), &HalfPlane, &params());
        assert!(report.uniform_fallback);
    }

    #[test]
    fn test_beam_stride() {
        let mut cloud = ParticleCloud::from_particles(vec![Particle::new(Pose::default(), 1.0)]);
        let beams = (0..10)
            .map(|i| Beam { bearing_rad: i as f64 * 0.1, range_m: Some(1.0) })
            .collect();

        let p = LocParams { beam_stride: 3, ..Default::default() };
        let report = weigh(&mut cloud, &scan(beams), &HalfPlane, &p);

        // Beams 0, 3, 6 and 9
        assert_eq!(report.valid_beams, 4);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let map = box_room();
        let mut rng = <rand_chacha::ChaCha8Rng as rand::SeedableRng>::seed_from_u64(2);

        let mut serial = ParticleCloud::new();
        serial.init_gaussian(300, &Pose::new(2.0, 1.5, 0.0), 0.5, 0.5, &mut rng);
        let mut parallel = serial.clone();

        let ranges: Vec<f64> = (0..90).map(|i| 1.0 + (i % 7) as f64 * 0.3).collect();
        let s = LaserScan::from_ranges(0, 0.0, 0.1, 5.0, -1.5, 0.035, &ranges);

        let serial_report = weigh(&mut serial, &s, &map, &LocParams::default());
        let parallel_report = weigh(
            &mut parallel,
            &s,
            &map,
            &LocParams {
                parallel_weighing: true,
                ..Default::default()
            },
        );

        assert_eq!(serial_report, parallel_report);
        assert_eq!(serial.particles(), parallel.particles());
    }
}
