//! # Localisation scenario generator
//!
//! Writes a map and a replay script for `loc_exec`. The robot drives laps of a rectangle inside
//! a walled room with a couple of obstacles, producing noisy odometry at 10 Hz and ray cast laser
//! scans at 5 Hz. The true trajectory is saved next to the script for comparison.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Result};
use nalgebra::Vector2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::{f64::consts::PI, fmt::Write, fs, path::PathBuf};
use structopt::StructOpt;

use comms_if::{
    eqpt::{
        lidar::LaserScan,
        odom::{OdomDelta, OdomPose},
    },
    msg::LocMsg,
    tc::LocTc,
};
use loc_lib::{
    geom::{gaussian, Pose},
    map::{OccupancyGrid, FREE, OCCUPIED},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const CELL_SIZE_M: f64 = 0.05;
const ROOM_SIZE_M: [f64; 2] = [8.0, 6.0];
const WALL_THICKNESS_M: f64 = 0.1;

/// Corners of the lap, driven anticlockwise
const LAP: [[f64; 2]; 4] = [[1.5, 1.5], [6.5, 1.5], [6.5, 4.5], [1.5, 4.5]];

const STEP_S: f64 = 0.1;
const SCAN_EVERY_N_STEPS: u64 = 2;

const SPEED_MS: f64 = 0.5;
const TURN_RATE_RADS: f64 = PI / 4.0;

const NUM_BEAMS: usize = 360;
const RANGE_MIN_M: f64 = 0.05;
const RANGE_MAX_M: f64 = 8.0;

const ODOM_LINEAR_NOISE_RATIO: f64 = 0.02;
const ODOM_ANGULAR_NOISE_RAD: f64 = 0.002;
const RANGE_NOISE_M: f64 = 0.01;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "loc_sim", about = "Generate a map and replay script for loc_exec")]
struct Opts {
    /// Directory to write map.json, script.txt and truth.json into
    #[structopt(parse(from_os_str))]
    out_dir: PathBuf,

    /// Seed for the sensor noise
    #[structopt(long, default_value = "0")]
    seed: u64,

    /// Length of the scenario
    #[structopt(long, default_value = "60")]
    duration_s: f64,
}

#[derive(Serialize)]
struct TruePose {
    timestamp_s: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
}

/// What the robot is doing on the current leg of the lap
enum Leg {
    Drive(f64),
    Turn(f64),
}

// ---------------------------------------------------------------------------
// MAIN
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();
    let mut rng = ChaCha8Rng::seed_from_u64(opts.seed);

    fs::create_dir_all(&opts.out_dir).wrap_err("Could not create the output directory")?;

    // ---- MAP ----

    let num_cells = [
        (ROOM_SIZE_M[0] / CELL_SIZE_M).round() as usize,
        (ROOM_SIZE_M[1] / CELL_SIZE_M).round() as usize,
    ];
    let grid = OccupancyGrid::from_fn(CELL_SIZE_M, [0.0, 0.0], num_cells, room)?;
    grid.save(opts.out_dir.join("map.json"))?;

    // ---- SCRIPT ----

    let start = Pose::new(LAP[0][0], LAP[0][1], 0.0);

    let mut script = String::new();
    let set_pose = LocMsg::Tc(LocTc::SetPose {
        x_m: start.x_m(),
        y_m: start.y_m(),
        heading_rad: start.heading_rad,
        spread: None,
    });
    writeln!(script, "{:.3}: {};", 0.0, set_pose.to_json()?)?;

    let mut truth = vec![TruePose::from_pose(0.0, &start)];

    let mut true_pose = start;
    let mut odom_pose = start;
    let mut corner = 0;
    let mut leg = Leg::Drive(side_length(corner));

    let num_steps = (opts.duration_s / STEP_S).round() as u64;

    for step in 1..=num_steps {
        let t = step as f64 * STEP_S;

        // Advance along the lap
        let (forward_m, turn_rad) = match leg {
            Leg::Drive(ref mut remaining) => {
                let d = (SPEED_MS * STEP_S).min(*remaining);
                *remaining -= d;
                (d, 0.0)
            }
            Leg::Turn(ref mut remaining) => {
                let a = (TURN_RATE_RADS * STEP_S).min(*remaining);
                *remaining -= a;
                (0.0, a)
            }
        };
        leg = match leg {
            Leg::Drive(r) if r <= 1e-9 => Leg::Turn(PI / 2.0),
            Leg::Turn(r) if r <= 1e-9 => {
                corner = (corner + 1) % LAP.len();
                Leg::Drive(side_length(corner))
            }
            l => l,
        };

        let true_delta = Pose::new(forward_m, 0.0, turn_rad);
        true_pose = true_pose.compose(&true_delta);
        truth.push(TruePose::from_pose(t, &true_pose));

        // Odometry is the true displacement with some slip
        let odom = OdomDelta {
            seq: step,
            timestamp_s: t,
            forward_m: forward_m + gaussian(&mut rng, ODOM_LINEAR_NOISE_RATIO * forward_m),
            strafe_m: 0.0,
            heading_rad: turn_rad + gaussian(&mut rng, ODOM_ANGULAR_NOISE_RAD),
        };
        odom_pose = odom_pose.compose(&Pose::new(odom.forward_m, 0.0, odom.heading_rad));
        writeln!(script, "{:.3}: {};", t, LocMsg::Odom(odom).to_json()?)?;

        if step % SCAN_EVERY_N_STEPS == 0 {
            let bearing_inc_rad = 2.0 * PI / NUM_BEAMS as f64;
            let ranges: Vec<f64> = (0..NUM_BEAMS)
                .map(|i| {
                    let bearing_rad = -PI + i as f64 * bearing_inc_rad;
                    match grid.raycast(&true_pose, bearing_rad, RANGE_MAX_M) {
                        Some(r) => (r + gaussian(&mut rng, RANGE_NOISE_M)).max(RANGE_MIN_M),
                        None => f64::INFINITY,
                    }
                })
                .collect();

            let mut scan = LaserScan::from_ranges(
                step / SCAN_EVERY_N_STEPS,
                t,
                RANGE_MIN_M,
                RANGE_MAX_M,
                -PI,
                bearing_inc_rad,
                &ranges,
            );
            scan.odom_pose = Some(OdomPose {
                x_m: odom_pose.x_m(),
                y_m: odom_pose.y_m(),
                heading_rad: odom_pose.heading_rad,
            });

            writeln!(script, "{:.3}: {};", t, LocMsg::Scan(scan).to_json()?)?;
        }
    }

    fs::write(opts.out_dir.join("script.txt"), script).wrap_err("Could not write the script")?;
    fs::write(
        opts.out_dir.join("truth.json"),
        serde_json::to_string_pretty(&truth)?,
    )
    .wrap_err("Could not write the true trajectory")?;

    println!(
        "Wrote {} s scenario with {} odometry readings to {:?}",
        opts.duration_s,
        num_steps,
        opts.out_dir
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Occupancy of the room at the given point.
fn room(c: Vector2<f64>) -> i8 {
    let wall = c[0] < WALL_THICKNESS_M
        || c[0] > ROOM_SIZE_M[0] - WALL_THICKNESS_M
        || c[1] < WALL_THICKNESS_M
        || c[1] > ROOM_SIZE_M[1] - WALL_THICKNESS_M;

    // A box in the middle of the lap and a round pillar near one corner
    let block = (c[0] - 4.0).abs() < 0.6 && (c[1] - 3.0).abs() < 0.4;
    let pillar = (c - Vector2::new(7.2, 5.2)).norm() < 0.25;

    if wall || block || pillar {
        OCCUPIED
    } else {
        FREE
    }
}

/// Length of the side of the lap starting at `corner`.
fn side_length(corner: usize) -> f64 {
    let a = LAP[corner];
    let b = LAP[(corner + 1) % LAP.len()];

    (b[0] - a[0]).hypot(b[1] - a[1])
}

impl TruePose {
    fn from_pose(timestamp_s: f64, pose: &Pose) -> Self {
        Self {
            timestamp_s,
            x_m: pose.x_m(),
            y_m: pose.y_m(),
            heading_rad: pose.heading_rad,
        }
    }
}
