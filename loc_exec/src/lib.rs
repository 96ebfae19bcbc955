//! # Localisation library.
//!
//! Monte Carlo localisation of a planar robot in a known occupancy map, from odometry and 2D laser
//! scans. This library allows the executables and benchmarks in this crate to access the filter.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Particle cloud - the weighted pose hypotheses and their double buffer
pub mod cloud;

/// Pose estimator - reduces the cloud to a single weighted mean pose
pub mod estimator;

/// Parameters for the replay executable
pub mod exec_params;

/// Planar geometry - poses and frame transforms
pub mod geom;

/// Localisation manager - the filter's state machine and its worker thread
pub mod loc_mgr;

/// Occupancy grid maps and the nearest obstacle query
pub mod map;

/// Motion model - moves the cloud by odometry with noise
pub mod motion_model;

/// Filter parameters
pub mod params;

/// Resampler - draws the next generation of the cloud
pub mod resampler;

/// Sensor model - weighs particles against a laser scan
pub mod sensor_model;

pub use exec_params::LocExecParams;
