//! # Localisation parameters
//!
//! All tunables of the filter form a single immutable snapshot. Reconfiguration builds a new
//! snapshot from the current one, validates it, and only then replaces the old one.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use comms_if::tc::{FillStrategy, LocParamsUpdate};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Parameters for the localisation manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocParams {
    // ---- CLOUD ----

    /// Number of particles in the cloud.
    pub num_particles: usize,

    /// Standard deviation of particle positions around the seed pose on initialisation.
    ///
    /// Units: meters
    pub init_linear_sigma_m: f64,

    /// Standard deviation of particle headings around the seed pose on initialisation.
    ///
    /// Units: radians
    pub init_angular_sigma_rad: f64,

    // ---- RESAMPLING ----

    /// Fraction of the new generation drawn directly from the weighted cloud, in [0, 1].
    pub sample_factor: f64,

    /// How the rest of the new generation is filled.
    pub fill_strategy: FillStrategy,

    /// Standard deviation of the position noise added to resampled particles.
    ///
    /// Units: meters
    pub resample_linear_sigma_m: f64,

    /// Standard deviation of the heading noise added to resampled particles.
    ///
    /// Units: radians
    pub resample_angular_sigma_rad: f64,

    // ---- MOTION MODEL ----

    /// Position noise standard deviation per meter travelled.
    pub motion_linear_noise_ratio: f64,

    /// Heading noise standard deviation per radian turned.
    pub motion_angular_noise_ratio: f64,

    // ---- SENSOR MODEL ----

    /// Standard deviation of the Gaussian mapping obstacle distance to beam likelihood.
    ///
    /// Units: meters
    pub model_noise_rate: f64,

    /// Minimum likelihood of any beam.
    pub model_noise_floor: f64,

    /// Obstacle distances are clamped to this value before evaluating the likelihood.
    ///
    /// Units: meters
    pub max_obstacle_distance_m: f64,

    /// Only every `beam_stride`th beam of a scan is used.
    pub beam_stride: usize,

    /// Weigh particles on the rayon thread pool.
    pub parallel_weighing: bool,

    // ---- UPDATE CONTROL ----

    /// Distance the robot must travel before a scan triggers a filter update.
    ///
    /// Units: meters
    pub update_min_dist_m: f64,

    /// Angle the robot must turn before a scan triggers a filter update.
    ///
    /// Units: radians
    pub update_min_angle_rad: f64,

    // ---- HEALTH ----

    /// Number of consecutive degenerate updates after which the localisation is flagged as
    /// suspect.
    pub degenerate_warn_limit: u32,

    /// Seed of the filter's random number generator. When absent the generator is seeded from
    /// the OS.
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("Parameter {name} = {value} is invalid, expected {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for LocParams {
    fn default() -> Self {
        Self {
            num_particles: 300,
            init_linear_sigma_m: 0.2,
            init_angular_sigma_rad: 5f64.to_radians(),
            sample_factor: 0.25,
            fill_strategy: FillStrategy::FreshDraws,
            resample_linear_sigma_m: 0.1,
            resample_angular_sigma_rad: 5f64.to_radians(),
            motion_linear_noise_ratio: 0.2,
            motion_angular_noise_ratio: 0.05,
            model_noise_rate: 0.05,
            model_noise_floor: 0.05,
            max_obstacle_distance_m: 2.0,
            beam_stride: 5,
            parallel_weighing: false,
            update_min_dist_m: 0.2,
            update_min_angle_rad: std::f64::consts::FRAC_PI_6,
            degenerate_warn_limit: 5,
            seed: None,
        }
    }
}

impl LocParams {
    /// Check that every parameter is within its valid range.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.num_particles == 0 {
            return Err(invalid("num_particles", self.num_particles, "at least 1"));
        }
        if self.beam_stride == 0 {
            return Err(invalid("beam_stride", self.beam_stride, "at least 1"));
        }
        if !(0.0..=1.0).contains(&self.sample_factor) {
            return Err(invalid("sample_factor", self.sample_factor, "in [0, 1]"));
        }

        check_positive("model_noise_rate", self.model_noise_rate)?;
        check_positive("max_obstacle_distance_m", self.max_obstacle_distance_m)?;

        for &(name, value) in [
            ("init_linear_sigma_m", self.init_linear_sigma_m),
            ("init_angular_sigma_rad", self.init_angular_sigma_rad),
            ("resample_linear_sigma_m", self.resample_linear_sigma_m),
            ("resample_angular_sigma_rad", self.resample_angular_sigma_rad),
            ("motion_linear_noise_ratio", self.motion_linear_noise_ratio),
            ("motion_angular_noise_ratio", self.motion_angular_noise_ratio),
            ("model_noise_floor", self.model_noise_floor),
            ("update_min_dist_m", self.update_min_dist_m),
            ("update_min_angle_rad", self.update_min_angle_rad),
        ]
        .iter()
        {
            check_non_negative(name, value)?;
        }

        Ok(())
    }

    /// Build a new parameter set by applying `update` to this one.
    ///
    /// The result is validated, on error `self` is left untouched.
    pub fn apply(&self, update: &LocParamsUpdate) -> Result<LocParams, ParamsError> {
        let mut p = self.clone();

        macro_rules! set {
            ($($field:ident),*) => {
                $(
                    if let Some(v) = update.$field {
                        p.$field = v;
                    }
                )*
            };
        }

        set!(
            num_particles,
            sample_factor,
            fill_strategy,
            resample_linear_sigma_m,
            resample_angular_sigma_rad,
            model_noise_rate,
            model_noise_floor,
            init_linear_sigma_m,
            init_angular_sigma_rad,
            motion_linear_noise_ratio,
            motion_angular_noise_ratio,
            update_min_dist_m,
            update_min_angle_rad,
            beam_stride,
            parallel_weighing
        );

        p.validate()?;

        Ok(p)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Check a seed pose spread given with an initialisation command.
pub fn check_spread(linear_sigma_m: f64, angular_sigma_rad: f64) -> Result<(), ParamsError> {
    check_non_negative("spread.linear_sigma_m", linear_sigma_m)?;
    check_non_negative("spread.angular_sigma_rad", angular_sigma_rad)
}

fn invalid<T: ToString>(name: &'static str, value: T, expected: &'static str) -> ParamsError {
    ParamsError::InvalidValue {
        name,
        value: value.to_string(),
        expected,
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "finite and greater than 0"))
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "finite and at least 0"))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
