//! # Telecommand module
//!
//! Telecommands are instructions sent to the localiser from outside: seeding the filter with
//! an initial pose and reconfiguring its tunables at runtime.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Spread of the Gaussian the particle cloud is sampled from on initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitSpread {
    /// Standard deviation of particle positions around the seed
    ///
    /// Units: meters
    pub linear_sigma_m: f64,

    /// Standard deviation of particle headings around the seed
    ///
    /// Units: radians
    pub angular_sigma_rad: f64,
}

/// A partial update to the localiser's parameters. Fields which are `None` keep their current
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocParamsUpdate {
    pub num_particles: Option<usize>,
    pub sample_factor: Option<f64>,
    pub fill_strategy: Option<FillStrategy>,
    pub resample_linear_sigma_m: Option<f64>,
    pub resample_angular_sigma_rad: Option<f64>,
    pub model_noise_rate: Option<f64>,
    pub model_noise_floor: Option<f64>,
    pub init_linear_sigma_m: Option<f64>,
    pub init_angular_sigma_rad: Option<f64>,
    pub motion_linear_noise_ratio: Option<f64>,
    pub motion_angular_noise_ratio: Option<f64>,
    pub update_min_dist_m: Option<f64>,
    pub update_min_angle_rad: Option<f64>,
    pub beam_stride: Option<usize>,
    pub parallel_weighing: Option<bool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Localisation telecommands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocTc {
    /// (Re)initialise the filter around the given pose.
    ///
    /// If `spread` is `None` the configured initialisation sigmas are used.
    SetPose {
        x_m: f64,
        y_m: f64,
        heading_rad: f64,
        #[serde(default)]
        spread: Option<InitSpread>,
    },

    /// Change one or more of the filter's parameters.
    Reconfigure(LocParamsUpdate),
}

/// How the part of a new generation not covered by the sample factor is filled during
/// resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStrategy {
    /// Each remaining particle is an independent weighted draw with its own noise.
    FreshDraws,

    /// Remaining particles are noisy copies of the sampled particles, cycling through them in
    /// order.
    ReuseDraws,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for FillStrategy {
    fn default() -> Self {
        FillStrategy::FreshDraws
    }
}

impl LocParamsUpdate {
    /// Returns `true` if the update doesn't change anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
