//! # Map
//!
//! The filter only needs one thing from a map: the distance from a point to the nearest known
//! obstacle, which is abstracted by [`MapQuery`]. This module also provides the occupancy grid
//! the executables use, along with an occupancy field which precomputes that distance for every
//! cell of the grid.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{fs, path::Path};

use log::debug;
use nalgebra::Vector2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use util::quadtree::{Quad, QuadTree, QuadTreeError};

use crate::geom::Pose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Cell value of an unknown cell
pub const UNKNOWN: i8 = -1;

/// Cell value of a free cell
pub const FREE: i8 = 0;

/// Cell value of a certainly occupied cell. Any value above [`FREE`] counts as occupied.
pub const OCCUPIED: i8 = 100;

/// Ray casting steps this many times per cell.
const RAYCAST_STEPS_PER_CELL: f64 = 4.0;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Read only spatial queries the filter makes against a map.
pub trait MapQuery {
    /// Distance from `point` to the nearest obstacle, or `None` if `point` is outside the known
    /// area of the map.
    ///
    /// Units: meters
    fn nearest_obstacle_distance(&self, point: &Vector2<f64>) -> Option<f64>;
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// A 2D occupancy grid.
///
/// Cells are stored row major starting from the cell at the origin, so the cell at column `x`
/// and row `y` is at index `y * num_cells[0] + x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// Side length of a single cell
    ///
    /// Units: meters
    cell_size_m: f64,

    /// Position of the lower left corner of cell (0, 0) in the map frame
    ///
    /// Units: meters
    origin_m: [f64; 2],

    /// Number of cells along the x and y axes
    num_cells: [usize; 2],

    /// Cell values, [`UNKNOWN`] or an occupancy probability from 0 to 100
    cells: Vec<i8>,
}

/// An occupancy grid along with the precomputed distance from every known cell to the nearest
/// occupied cell.
#[derive(Debug, Clone)]
pub struct OccupancyField {
    grid: OccupancyGrid,

    /// Distances indexed by `[x, y]`, NaN for unknown cells
    distance_m: Array2<f64>,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("An IO operation failed: {0}")]
    IoError(std::io::Error),

    #[error("Couldn't deserialize the map: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Couldn't serialize the map: {0}")]
    SerializeError(serde_json::Error),

    #[error("Expected {expected} cells from the map's dimensions but found {found}")]
    IncompatibleShape { expected: usize, found: usize },

    #[error("The cell size must be finite and positive, found {0}")]
    InvalidCellSize(f64),

    #[error("Couldn't build the obstacle index: {0}")]
    QuadTreeError(QuadTreeError),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl OccupancyGrid {
    pub fn new(
        cell_size_m: f64,
        origin_m: [f64; 2],
        num_cells: [usize; 2],
        cells: Vec<i8>,
    ) -> Result<Self, MapError> {
        let grid = Self {
            cell_size_m,
            origin_m,
            num_cells,
            cells,
        };

        grid.validate()?;

        Ok(grid)
    }

    /// Build a grid by evaluating `f` at the centre of every cell.
    pub fn from_fn<F>(
        cell_size_m: f64,
        origin_m: [f64; 2],
        num_cells: [usize; 2],
        f: F,
    ) -> Result<Self, MapError>
    where
        F: Fn(Vector2<f64>) -> i8,
    {
        let mut grid = Self {
            cell_size_m,
            origin_m,
            num_cells,
            cells: Vec::with_capacity(num_cells[0] * num_cells[1]),
        };

        grid.validate_cell_size()?;

        for y in 0..num_cells[1] {
            for x in 0..num_cells[0] {
                let value = f(grid.cell_centre(x, y));
                grid.cells.push(value);
            }
        }

        Ok(grid)
    }

    /// Load a grid from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let s = fs::read_to_string(path).map_err(MapError::IoError)?;

        let grid: Self = serde_json::from_str(&s).map_err(MapError::DeserializeError)?;
        grid.validate()?;

        Ok(grid)
    }

    /// Save the grid to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MapError> {
        let s = serde_json::to_string(self).map_err(MapError::SerializeError)?;

        fs::write(path, s).map_err(MapError::IoError)
    }

    pub fn cell_size_m(&self) -> f64 {
        self.cell_size_m
    }

    pub fn num_cells(&self) -> [usize; 2] {
        self.num_cells
    }

    /// Get the cell containing `point`, or `None` if it's outside the grid.
    pub fn cell_index(&self, point: &Vector2<f64>) -> Option<(usize, usize)> {
        let fx = ((point[0] - self.origin_m[0]) / self.cell_size_m).floor();
        let fy = ((point[1] - self.origin_m[1]) / self.cell_size_m).floor();

        // Also rejects NaN
        if !(fx >= 0.0 && fy >= 0.0) {
            return None;
        }

        let (x, y) = (fx as usize, fy as usize);
        if x < self.num_cells[0] && y < self.num_cells[1] {
            Some((x, y))
        } else {
            None
        }
    }

    /// Position of the centre of the given cell in the map frame.
    pub fn cell_centre(&self, x: usize, y: usize) -> Vector2<f64> {
        Vector2::new(
            self.origin_m[0] + (x as f64 + 0.5) * self.cell_size_m,
            self.origin_m[1] + (y as f64 + 0.5) * self.cell_size_m,
        )
    }

    /// Value of the given cell.
    ///
    /// # Panics
    /// - If the cell is outside the grid.
    pub fn value(&self, x: usize, y: usize) -> i8 {
        self.cells[y * self.num_cells[0] + x]
    }

    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        self.value(x, y) > FREE
    }

    pub fn is_unknown(&self, x: usize, y: usize) -> bool {
        self.value(x, y) < FREE
    }

    /// Cast a ray from `pose` along `bearing_rad` (relative to the pose's heading) and return the
    /// distance to the first occupied cell.
    ///
    /// Returns `None` if the ray leaves the grid or travels further than `max_range_m` without
    /// hitting anything.
    pub fn raycast(&self, pose: &Pose, bearing_rad: f64, max_range_m: f64) -> Option<f64> {
        let step_m = self.cell_size_m / RAYCAST_STEPS_PER_CELL;
        let num_steps = (max_range_m / step_m).floor() as usize;

        for i in 0..=num_steps {
            let range_m = i as f64 * step_m;
            let (x, y) = self.cell_index(&pose.beam_endpoint(bearing_rad, range_m))?;

            if self.is_occupied(x, y) {
                return Some(range_m);
            }
        }

        None
    }

    fn validate(&self) -> Result<(), MapError> {
        self.validate_cell_size()?;

        let expected = self.num_cells[0] * self.num_cells[1];
        if self.cells.len() != expected {
            return Err(MapError::IncompatibleShape {
                expected,
                found: self.cells.len(),
            });
        }

        Ok(())
    }

    fn validate_cell_size(&self) -> Result<(), MapError> {
        if self.cell_size_m.is_finite() && self.cell_size_m > 0.0 {
            Ok(())
        } else {
            Err(MapError::InvalidCellSize(self.cell_size_m))
        }
    }
}

impl OccupancyField {
    /// Precompute the obstacle distance for every known cell of `grid`.
    ///
    /// If the grid has no occupied cells every known cell gets an infinite distance.
    pub fn new(grid: OccupancyGrid) -> Result<Self, MapError> {
        let [nx, ny] = grid.num_cells;

        // Index the centres of all occupied cells. The index covers the whole grid rather than
        // just the cell centres, so edge cells are half a cell inside it.
        let min = Vector2::new(grid.origin_m[0], grid.origin_m[1]);
        let max = min + Vector2::new(nx as f64, ny as f64) * grid.cell_size_m;
        let mut obstacles = QuadTree::new(Quad::bounding(min, max));

        for y in 0..ny {
            for x in 0..nx {
                if grid.is_occupied(x, y) {
                    obstacles
                        .insert(grid.cell_centre(x, y))
                        .map_err(MapError::QuadTreeError)?;
                }
            }
        }

        let distance_m = Array2::from_shape_fn((nx, ny), |(x, y)| {
            if grid.is_unknown(x, y) {
                std::f64::NAN
            } else {
                obstacles
                    .nearest(&grid.cell_centre(x, y))
                    .map_or(std::f64::INFINITY, |(_, d)| d)
            }
        });

        debug!(
            "Occupancy field built for {}x{} cells with {} obstacles",
            nx,
            ny,
            obstacles.len()
        );

        Ok(Self { grid, distance_m })
    }

    /// Load a grid from a JSON file and build its field.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        Self::new(OccupancyGrid::load(path)?)
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }
}

impl MapQuery for OccupancyField {
    fn nearest_obstacle_distance(&self, point: &Vector2<f64>) -> Option<f64> {
        let (x, y) = self.grid.cell_index(point)?;
        let d = self.distance_m[[x, y]];

        if d.is_nan() {
            None
        } else {
            Some(d)
        }
    }
}

// ---------------------------------------------------------------------------
// TEST UTILITIES
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    /// A 5 x 4 m walled room with 5 cm cells, with a 0.5 m square pillar centred on (3.5, 2.5).
    pub fn box_room() -> OccupancyField {
        let grid = OccupancyGrid::from_fn(0.05, [0.0, 0.0], [100, 80], |c| {
            let wall = c[0] < 0.05 || c[0] > 4.95 || c[1] < 0.05 || c[1] > 3.95;
            let pillar = (c[0] - 3.5).abs() < 0.25 && (c[1] - 2.5).abs() < 0.25;

            if wall || pillar {
                OCCUPIED
            } else {
                FREE
            }
        })
        .unwrap();

        OccupancyField::new(grid).unwrap()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
