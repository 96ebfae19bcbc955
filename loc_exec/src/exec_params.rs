//! # Localisation Executable Parameters
//!
//! This module provide parameters for the replay executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocExecParams {
    /// Path to the occupancy grid JSON file. Relative paths are relative to the software root.
    pub map_path: String,

    /// Target period of one replay cycle when replaying in real time.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// A snapshot of the weighted particle cloud is saved every this many filter updates.
    pub snapshot_every_n_updates: u64,
}
