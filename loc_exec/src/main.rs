//! Localisation replay executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logger, parameters and map
//!     - Move the localisation manager onto its worker thread
//!     - Main loop:
//!         - Collect the script messages due this cycle
//!         - Submit them to the worker
//!         - Gather the worker's outputs, and periodically a cloud snapshot
//!     - Stop the worker and save the final cloud
//!
//! Scripts are replayed in real time by default, paced by the session clock. With `--fast` every
//! message is submitted as soon as the previous one has been processed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::{
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use comms_if::{msg::LocMsg, tm::CloudSnapshot};
use loc_lib::{
    loc_mgr::{LocMgr, LocWorker, StatusReport, WorkerSignal},
    map::OccupancyField,
    params::LocParams,
    LocExecParams,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingMsgs, ScriptInterpreter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(
    name = "loc_exec",
    about = "Replay odometry and laser scans through the particle filter"
)]
struct Opts {
    /// Process messages as fast as possible instead of at their scripted times
    #[structopt(long)]
    fast: bool,

    /// Log every filter step at trace level
    #[structopt(short, long)]
    verbose: bool,

    /// Path to the replay script
    #[structopt(parse(from_os_str))]
    script: PathBuf,
}

/// Bookkeeping for the outputs coming back from the worker.
#[derive(Default)]
struct ReplayStats {
    num_msgs: u64,
    num_errors: u64,
    num_snapshots: u64,
    last_report: StatusReport,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("loc_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if opts.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Localisation Replay Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS AND MAP ----

    let exec_params: LocExecParams =
        util::params::load("loc_exec.toml").wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    let map_path = host::get_loc_sw_root()
        .wrap_err("The LOC_SW_ROOT environment variable is not set")?
        .join(&exec_params.map_path);

    let map = OccupancyField::load(&map_path)
        .wrap_err_with(|| format!("Could not load the map from {:?}", map_path))?;

    info!(
        "Map loaded from {:?}, {} by {} cells",
        map_path,
        map.grid().num_cells()[0],
        map.grid().num_cells()[1]
    );

    // ---- INITIALISE MODULES ----

    let mut loc_mgr = LocMgr::new(LocParams::default(), Arc::new(map))
        .wrap_err("Failed to create LocMgr")?;
    loc_mgr
        .init("loc_mgr.toml", &session)
        .wrap_err("Failed to initialise LocMgr")?;

    info!("LocMgr init complete");

    let worker = LocWorker::new(loc_mgr).wrap_err("Failed to start the LocMgr worker")?;

    // ---- LOAD SCRIPT ----

    info!("Loading script from {:?}", opts.script);

    let mut script =
        ScriptInterpreter::new(&opts.script).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} messages\n",
        script.get_duration(),
        script.get_num_msgs()
    );

    // ---- MAIN LOOP ----

    info!("Begining replay\n");

    let mut stats = ReplayStats::default();

    if opts.fast {
        while let Some((_, msg)) = script.next_msg() {
            process_msgs(vec![msg], &worker, &session, &exec_params, &mut stats)?;
        }
    } else {
        let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);

        loop {
            // Get cycle start time
            let cycle_start_instant = Instant::now();

            match script.get_pending_msgs() {
                PendingMsgs::Some(msgs) => {
                    process_msgs(msgs, &worker, &session, &exec_params, &mut stats)?
                }
                PendingMsgs::None => (),
                PendingMsgs::EndOfScript => break,
            }

            // ---- CYCLE MANAGEMENT ----

            let cycle_dur = Instant::now() - cycle_start_instant;

            // Get sleep duration
            match cycle_period.checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                ),
            }
        }
    }

    // ---- SHUTDOWN ----

    info!("End of script");

    worker
        .request_snapshot()
        .wrap_err("Could not request the final cloud")?;
    match wait_for_snapshot(&worker, &mut stats)? {
        Some(s) => session::save_with_timestamp("snapshots/final.json", s),
        None => warn!("No final cloud available"),
    }

    let loc_mgr = worker.stop().wrap_err("Failed to stop the LocMgr worker")?;

    info!(
        "Processed {} messages ({} errors) with {} filter updates and {} snapshots saved, {} scans \
         throttled, {} inputs dropped",
        stats.num_msgs,
        stats.num_errors,
        stats.last_report.num_updates,
        stats.num_snapshots,
        stats.last_report.num_throttled_scans,
        stats.last_report.num_dropped_inputs
    );
    match loc_mgr.latest_estimate() {
        Some(e) => info!(
            "Final estimate: ({:.3}, {:.3}, {:.3}), std ({:.3}, {:.3})",
            e.x_m, e.y_m, e.heading_rad, e.std_x_m, e.std_y_m
        ),
        None => warn!("The filter never produced an estimate"),
    }
    if stats.last_report.localisation_suspect {
        warn!("Localisation was suspect at the end of the replay");
    }

    session.exit();

    info!("End of execution");

    Ok(())
}

/// Submit each message to the worker and wait for its result.
///
/// Every `snapshot_every_n_updates` filter updates a snapshot of the cloud is saved to the
/// session.
fn process_msgs(
    msgs: Vec<LocMsg>,
    worker: &LocWorker,
    session: &Session,
    exec_params: &LocExecParams,
    stats: &mut ReplayStats,
) -> Result<(), Report> {
    // One at a time, so that a snapshot request is answered before any later message
    for msg in msgs {
        worker.submit(msg).wrap_err("Could not submit message")?;

        match worker.recv().wrap_err("Lost contact with the LocMgr worker")? {
            WorkerSignal::Output(est, report) => {
                stats.num_msgs += 1;
                stats.last_report = report;

                if est.is_some()
                    && exec_params.snapshot_every_n_updates > 0
                    && report.num_updates % exec_params.snapshot_every_n_updates == 0
                {
                    worker
                        .request_snapshot()
                        .wrap_err("Could not request a cloud snapshot")?;

                    if let Some(s) = wait_for_snapshot(worker, stats)? {
                        session.save(format!("snapshots/cloud_{:06}.json", report.num_updates), s);
                        stats.num_snapshots += 1;
                    }
                }
            }
            WorkerSignal::Error(e) => {
                stats.num_msgs += 1;
                stats.num_errors += 1;
                debug!("Message rejected by LocMgr: {}", e);
            }
            s => return Err(eyre!("Unexpected signal from the worker: {:?}", s)),
        }
    }

    Ok(())
}

/// Wait for the snapshot requested from the worker.
///
/// Returns `None` if the worker couldn't produce one, for example if it isn't initialised.
fn wait_for_snapshot(
    worker: &LocWorker,
    stats: &mut ReplayStats,
) -> Result<Option<CloudSnapshot>, Report> {
    match worker.recv().wrap_err("Lost contact with the LocMgr worker")? {
        WorkerSignal::Snapshot(s) => Ok(Some(s)),
        WorkerSignal::Error(e) => {
            stats.num_errors += 1;
            warn!("Could not get a cloud snapshot: {}", e);
            Ok(None)
        }
        s => Err(eyre!("Expected a snapshot from the worker, got {:?}", s)),
    }
}
