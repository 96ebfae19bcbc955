//! # Localisation manager
//!
//! Owns the particle cloud and drives the filter. Odometry is applied to the cloud as soon as it
//! arrives, while scans only trigger a full update (weigh, normalise, estimate, resample) once the
//! robot has moved far enough since the last update. Scans arriving before that are dropped.
//!
//! The manager is a two state machine:
//!
//! ```text
//! Uninitialised --set_pose--> Tracking --set_pose--> Tracking
//! ```
//!
//! Parameters are held as an immutable snapshot which is swapped out wholesale on
//! reconfiguration, so every update runs against one consistent set.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod worker;
pub use worker::{LocWorker, WorkerSignal};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use log::{debug, info, trace, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use comms_if::{
    eqpt::{lidar::LaserScan, odom::OdomDelta},
    msg::LocMsg,
    tc::{InitSpread, LocParamsUpdate, LocTc},
    tm::{CloudSnapshot, PoseEstimate},
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params::{self, LoadError},
    session::Session,
};

use crate::{
    cloud::{CloudError, Normalisation, ParticleCloud},
    estimator::{self, Estimate},
    geom::Pose,
    map::MapQuery,
    motion_model,
    params::{check_spread, LocParams, ParamsError},
    resampler, sensor_model,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Localisation manager
pub struct LocMgr {
    params: Arc<LocParams>,

    map: Arc<dyn MapQuery + Send + Sync>,

    state: LocState,

    cloud: ParticleCloud,

    rng: ChaCha8Rng,

    /// Linear movement since the last filter update
    ///
    /// Units: meters
    accum_dist_m: f64,

    /// Angular movement since the last filter update
    ///
    /// Units: radians
    accum_angle_rad: f64,

    last_odom_seq: Option<u64>,
    last_scan_seq: Option<u64>,

    /// Timestamp of the last input processed
    last_timestamp_s: f64,

    /// The pose the cloud was last seeded around
    seed_pose: Option<Pose>,

    latest: Option<PoseEstimate>,

    /// Estimate produced since the last archive write
    unarchived: Option<PoseEstimate>,

    report: StatusReport,

    arch: Option<LocArchivers>,
}

struct LocArchivers {
    pose_estimate: Archiver,
    status_report: Archiver,
}

/// Status report for the localisation manager.
///
/// Counters are totals since the manager was created, the remaining fields describe the last
/// filter update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    /// Timestamp of the last input processed
    pub timestamp_s: f64,

    pub num_particles: usize,

    pub num_updates: u64,

    pub num_throttled_scans: u64,

    /// Inputs dropped for arriving out of order
    pub num_dropped_inputs: u64,

    /// All raw weights were zero in the last update and were reset to uniform
    pub degenerate_weights: bool,

    pub consec_degenerate_updates: u32,

    /// Raised once the number of consecutive degenerate updates exceeds the configured limit,
    /// localisation has probably been lost.
    pub localisation_suspect: bool,

    pub valid_beams: usize,

    pub out_of_bounds_beams: usize,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocState {
    /// No seed pose has been given, only `set_pose` and `reconfigure` are accepted.
    Uninitialised,

    Tracking,
}

/// What happened to a scan given to [`LocMgr::on_scan`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanOutcome {
    /// The robot hasn't moved far enough since the last update, the scan was discarded.
    Throttled,

    /// The scan was older than the last one processed and was discarded.
    Dropped,

    /// The filter was updated, giving a new estimate.
    Updated(PoseEstimate),
}

#[derive(Debug, thiserror::Error)]
pub enum LocError {
    #[error("No seed pose has been set, the filter is not initialised")]
    NotInitialised,

    #[error("The particle cloud is empty")]
    EmptyCloud,

    #[error("The particle weights are not normalised (sum = {0})")]
    WeightsNotNormalised(f64),

    #[error("Particle {0} has an invalid weight of {1}")]
    InvalidWeight(usize, f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(ParamsError),

    #[error("Could not load the localisation parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Archive error: {0}")]
    ArchiveError(ArchiveError),

    #[error("Could not spawn the worker thread: {0}")]
    WorkerSpawnError(std::io::Error),

    #[error("The worker thread has stopped unexpectedly")]
    WorkerDisconnected,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl LocMgr {
    /// Create a new uninitialised manager.
    ///
    /// The random number generator is seeded from `params.seed` if given, otherwise from the OS.
    pub fn new(
        params: LocParams,
        map: Arc<dyn MapQuery + Send + Sync>,
    ) -> Result<Self, LocError> {
        params.validate()?;

        let rng = match params.seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            params: Arc::new(params),
            map,
            state: LocState::Uninitialised,
            cloud: ParticleCloud::new(),
            rng,
            accum_dist_m: 0.0,
            accum_angle_rad: 0.0,
            last_odom_seq: None,
            last_scan_seq: None,
            last_timestamp_s: 0.0,
            seed_pose: None,
            latest: None,
            unarchived: None,
            report: StatusReport::default(),
            arch: None,
        })
    }

    /// Seed the cloud around `pose`.
    ///
    /// If `spread` is `None` the configured initialisation sigmas are used. Can be called in any
    /// state, and always leaves the manager tracking.
    pub fn set_pose(&mut self, pose: Pose, spread: Option<InitSpread>) -> Result<(), LocError> {
        let (linear_sigma_m, angular_sigma_rad) = match spread {
            Some(s) => (s.linear_sigma_m, s.angular_sigma_rad),
            None => (
                self.params.init_linear_sigma_m,
                self.params.init_angular_sigma_rad,
            ),
        };
        check_spread(linear_sigma_m, angular_sigma_rad)?;

        self.cloud.init_gaussian(
            self.params.num_particles,
            &pose,
            linear_sigma_m,
            angular_sigma_rad,
            &mut self.rng,
        );

        self.seed_pose = Some(pose);
        self.latest = None;
        self.reset_accumulator();

        self.report.num_particles = self.cloud.len();
        self.report.degenerate_weights = false;
        self.report.consec_degenerate_updates = 0;
        self.report.localisation_suspect = false;

        if self.state == LocState::Uninitialised {
            info!("Localisation initialised at {:?}", pose);
        } else {
            info!("Localisation reinitialised at {:?}", pose);
        }
        self.state = LocState::Tracking;

        Ok(())
    }

    /// Move the cloud by an odometry displacement.
    ///
    /// Readings whose sequence number isn't greater than the last one processed are dropped.
    pub fn on_odom(&mut self, delta: &OdomDelta) -> Result<(), LocError> {
        self.check_tracking()?;

        if !Self::in_order(&mut self.last_odom_seq, delta.seq) {
            warn!("Dropping out of order odometry (seq {})", delta.seq);
            self.report.num_dropped_inputs += 1;
            return Ok(());
        }

        motion_model::propagate(&mut self.cloud, delta, &self.params, &mut self.rng);

        self.accum_dist_m += delta.linear_m();
        self.accum_angle_rad += delta.angular_rad();
        self.set_timestamp(delta.timestamp_s);

        trace!(
            "Odometry {} applied, moved {:.3} m and {:.3} rad since the last update",
            delta.seq,
            self.accum_dist_m,
            self.accum_angle_rad
        );

        Ok(())
    }

    /// Update the filter with a scan, if the robot has moved far enough since the last update.
    pub fn on_scan(&mut self, scan: &LaserScan) -> Result<ScanOutcome, LocError> {
        self.check_tracking()?;

        if !Self::in_order(&mut self.last_scan_seq, scan.seq) {
            warn!("Dropping out of order scan (seq {})", scan.seq);
            self.report.num_dropped_inputs += 1;
            return Ok(ScanOutcome::Dropped);
        }

        self.set_timestamp(scan.timestamp_s);

        let params = Arc::clone(&self.params);

        if self.accum_dist_m <= params.update_min_dist_m
            && self.accum_angle_rad <= params.update_min_angle_rad
        {
            debug!("Scan {} throttled, not moved far enough", scan.seq);
            self.report.num_throttled_scans += 1;
            return Ok(ScanOutcome::Throttled);
        }

        let weigh_report = sensor_model::weigh(&mut self.cloud, scan, &*self.map, &params);
        self.report.valid_beams = weigh_report.valid_beams;
        self.report.out_of_bounds_beams = weigh_report.out_of_bounds_beams;

        match self.cloud.normalise() {
            Normalisation::Normalised => {
                self.report.degenerate_weights = false;
                self.report.consec_degenerate_updates = 0;
                self.report.localisation_suspect = false;
            }
            Normalisation::Degenerate => self.on_degenerate_weights(&params),
        }

        let est = estimator::estimate(&self.cloud)?;

        resampler::resample(&mut self.cloud, &params, &mut self.rng)?;

        self.reset_accumulator();
        self.report.num_updates += 1;
        self.report.num_particles = self.cloud.len();

        let pose_estimate = PoseEstimate {
            timestamp_s: scan.timestamp_s,
            scan_seq: scan.seq,
            x_m: est.pose.x_m(),
            y_m: est.pose.y_m(),
            heading_rad: est.pose.heading_rad,
            std_x_m: est.spread.std_x_m,
            std_y_m: est.spread.std_y_m,
            heading_concentration: est.spread.heading_concentration,
        };
        self.latest = Some(pose_estimate);
        self.unarchived = Some(pose_estimate);

        debug!(
            "Update {} from scan {}: ({:.3}, {:.3}, {:.3}), std ({:.3}, {:.3})",
            self.report.num_updates,
            scan.seq,
            pose_estimate.x_m,
            pose_estimate.y_m,
            pose_estimate.heading_rad,
            pose_estimate.std_x_m,
            pose_estimate.std_y_m
        );

        Ok(ScanOutcome::Updated(pose_estimate))
    }

    /// Apply a runtime parameter update.
    ///
    /// Invalid updates are rejected and the current parameters kept. A change in the number of
    /// particles while tracking reseeds the cloud around the latest estimate.
    pub fn reconfigure(&mut self, update: &LocParamsUpdate) -> Result<(), LocError> {
        if update.is_empty() {
            debug!("Ignoring empty reconfiguration");
            return Ok(());
        }

        let new_params = match self.params.apply(update) {
            Ok(p) => p,
            Err(e) => {
                warn!("Rejected reconfiguration: {}", e);
                return Err(LocError::InvalidConfiguration(e));
            }
        };

        let resized = new_params.num_particles != self.params.num_particles;
        self.params = Arc::new(new_params);

        info!("Localisation parameters reconfigured: {:?}", update);

        if resized && self.state == LocState::Tracking {
            let seed = self
                .latest
                .map(|e| Pose::new(e.x_m, e.y_m, e.heading_rad))
                .or(self.seed_pose)
                .unwrap_or_default();

            info!(
                "Number of particles changed to {}, reinitialising around {:?}",
                self.params.num_particles, seed
            );

            self.cloud.init_gaussian(
                self.params.num_particles,
                &seed,
                self.params.init_linear_sigma_m,
                self.params.init_angular_sigma_rad,
                &mut self.rng,
            );
            self.reset_accumulator();
            self.report.num_particles = self.cloud.len();
        }

        Ok(())
    }

    /// Compute an estimate from the cloud as it is now.
    pub fn estimate(&self) -> Result<Estimate, LocError> {
        self.check_tracking()?;

        Ok(estimator::estimate(&self.cloud)?)
    }

    /// The estimate from the last filter update, if there has been one since the cloud was
    /// seeded.
    pub fn latest_estimate(&self) -> Option<PoseEstimate> {
        self.latest
    }

    /// Copy out the weighted cloud from the last update.
    pub fn cloud_snapshot(&self) -> Result<CloudSnapshot, LocError> {
        self.check_tracking()?;

        Ok(self.cloud.snapshot(self.last_timestamp_s))
    }

    pub fn status_report(&self) -> StatusReport {
        self.report
    }

    pub fn state(&self) -> LocState {
        self.state
    }

    pub fn params(&self) -> &LocParams {
        &self.params
    }

    fn check_tracking(&self) -> Result<(), LocError> {
        match self.state {
            LocState::Tracking => Ok(()),
            LocState::Uninitialised => Err(LocError::NotInitialised),
        }
    }

    /// Returns `true` and records `seq` if it comes after `last`.
    fn in_order(last: &mut Option<u64>, seq: u64) -> bool {
        match *last {
            Some(l) if seq <= l => false,
            _ => {
                *last = Some(seq);
                true
            }
        }
    }

    fn set_timestamp(&mut self, timestamp_s: f64) {
        self.last_timestamp_s = timestamp_s;
        self.report.timestamp_s = timestamp_s;
    }

    fn reset_accumulator(&mut self) {
        self.accum_dist_m = 0.0;
        self.accum_angle_rad = 0.0;
    }

    fn on_degenerate_weights(&mut self, params: &LocParams) {
        self.report.degenerate_weights = true;
        self.report.consec_degenerate_updates += 1;

        warn!(
            "All particle weights were zero, reset to uniform ({} updates in a row)",
            self.report.consec_degenerate_updates
        );

        if self.report.consec_degenerate_updates > params.degenerate_warn_limit {
            self.report.localisation_suspect = true;
            warn!(
                "Localisation may be lost, weights have been degenerate for more than {} updates",
                params.degenerate_warn_limit
            );
        }
    }
}

impl State for LocMgr {
    type InitData = &'static str;
    type InitError = LocError;

    type InputData = LocMsg;
    type OutputData = Option<PoseEstimate>;
    type StatusReport = StatusReport;
    type ProcError = LocError;

    /// Initialise the manager.
    ///
    /// Expected init data is the path to the parameter file. Any existing cloud is discarded.
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        let params: LocParams = params::load(init_data)?;

        *self = Self::new(params, Arc::clone(&self.map))?;

        // Create the arch folder for loc_mgr
        std::fs::create_dir_all(session.arch_root.join("loc_mgr"))
            .map_err(|e| LocError::ArchiveError(ArchiveError::CreateError(e)))?;

        self.arch = Some(LocArchivers {
            pose_estimate: Archiver::from_path(session, "loc_mgr/pose_estimate.csv")?,
            status_report: Archiver::from_path(session, "loc_mgr/status_report.csv")?,
        });

        info!(
            "LocMgr initialised with {} particles",
            self.params.num_particles
        );

        Ok(())
    }

    /// Process a single message.
    ///
    /// The output is the new pose estimate if the message triggered a filter update.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let output = match input_data {
            LocMsg::Odom(delta) => {
                self.on_odom(delta)?;
                None
            }
            LocMsg::Scan(scan) => match self.on_scan(scan)? {
                ScanOutcome::Updated(e) => Some(e),
                ScanOutcome::Throttled | ScanOutcome::Dropped => None,
            },
            LocMsg::Tc(LocTc::SetPose {
                x_m,
                y_m,
                heading_rad,
                spread,
            }) => {
                self.set_pose(Pose::new(*x_m, *y_m, *heading_rad), *spread)?;
                None
            }
            LocMsg::Tc(LocTc::Reconfigure(update)) => {
                self.reconfigure(update)?;
                None
            }
        };

        Ok((output, self.report))
    }
}

impl Archived for LocMgr {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let arch = match self.arch {
            Some(ref mut a) => a,
            None => return Ok(()),
        };

        if let Some(est) = self.unarchived.take() {
            arch.pose_estimate.serialise(est)?;
        }

        arch.status_report.serialise(self.report)
    }
}

impl LocError {
    /// `true` if the error is due to the manager or cloud not being in a state that allows the
    /// operation.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::NotInitialised
                | Self::EmptyCloud
                | Self::WeightsNotNormalised(_)
                | Self::InvalidWeight(_, _)
        )
    }
}

impl From<CloudError> for LocError {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::EmptyCloud => Self::EmptyCloud,
            CloudError::WeightsNotNormalised(s) => Self::WeightsNotNormalised(s),
            CloudError::InvalidWeight(i, w) => Self::InvalidWeight(i, w),
        }
    }
}

impl From<ParamsError> for LocError {
    fn from(e: ParamsError) -> Self {
        Self::InvalidConfiguration(e)
    }
}

impl From<LoadError> for LocError {
    fn from(e: LoadError) -> Self {
        Self::ParamLoadError(e)
    }
}

impl From<ArchiveError> for LocError {
    fn from(e: ArchiveError) -> Self {
        Self::ArchiveError(e)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::test_utils::box_room;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use std::f64::consts::PI;

    fn mgr(params: LocParams) -> LocMgr {
        LocMgr::new(
            LocParams {
                seed: Some(1),
                ..params
            },
            Arc::new(box_room()),
        )
        .unwrap()
    }

    fn odom(seq: u64, forward_m: f64, heading_rad: f64) -> OdomDelta {
        OdomDelta {
            seq,
            timestamp_s: seq as f64 * 0.1,
            forward_m,
            strafe_m: 0.0,
            heading_rad,
        }
    }

    fn scan(seq: u64) -> LaserScan {
        LaserScan::from_ranges(seq, seq as f64 * 0.1, 0.1, 10.0, -PI, PI / 18.0, &[1.0; 36])
    }

    const NO_SPREAD: Option<InitSpread> = Some(InitSpread {
        linear_sigma_m: 0.0,
        angular_sigma_rad: 0.0,
    });

    #[test]
    fn test_dead_reckoning() {
        let mut m = mgr(LocParams {
            num_particles: 100,
            ..Default::default()
        });

        m.set_pose(Pose::default(), NO_SPREAD).unwrap();
        for i in 1..=10 {
            m.on_odom(&odom(i, 1.0, 0.0)).unwrap();
        }

        let est = m.estimate().unwrap();
        assert_relative_eq!(est.pose.x_m(), 10.0, epsilon = 0.3);
        assert_relative_eq!(est.pose.y_m(), 0.0, epsilon = 0.3);
        assert_relative_eq!(est.pose.heading_rad, 0.0, epsilon = 1e-9);
        assert!(m.latest_estimate().is_none());
    }

    #[test]
    fn test_uninitialised() {
        let mut m = mgr(LocParams::default());

        assert_eq!(m.state(), LocState::Uninitialised);
        assert!(m.on_odom(&odom(1, 1.0, 0.0)).unwrap_err().is_invalid_state());
        assert!(m.on_scan(&scan(1)).unwrap_err().is_invalid_state());
        assert!(m.estimate().unwrap_err().is_invalid_state());
        assert!(m.cloud_snapshot().unwrap_err().is_invalid_state());

        m.set_pose(Pose::new(1.0, 1.0, 0.0), None).unwrap();
        assert_eq!(m.state(), LocState::Tracking);
        assert_eq!(m.cloud_snapshot().unwrap().particles.len(), 300);
    }

    #[test]
    fn test_invalid_spread() {
        let mut m = mgr(LocParams::default());

        let spread = Some(InitSpread {
            linear_sigma_m: -1.0,
            angular_sigma_rad: 0.0,
        });
        assert!(matches!(
            m.set_pose(Pose::default(), spread),
            Err(LocError::InvalidConfiguration(_))
        ));
        assert_eq!(m.state(), LocState::Uninitialised);
    }

    #[test]
    fn test_scan_throttling() {
        let mut m = mgr(LocParams {
            num_particles: 50,
            ..Default::default()
        });
        m.set_pose(Pose::new(2.0, 1.5, 0.0), None).unwrap();

        assert_eq!(m.on_scan(&scan(1)).unwrap(), ScanOutcome::Throttled);

        m.on_odom(&odom(1, 0.1, 0.0)).unwrap();
        assert_eq!(m.on_scan(&scan(2)).unwrap(), ScanOutcome::Throttled);

        // Accumulated 0.25 m
        m.on_odom(&odom(2, 0.15, 0.0)).unwrap();
        assert!(matches!(
            m.on_scan(&scan(3)).unwrap(),
            ScanOutcome::Updated(_)
        ));

        // Accumulator was reset by the update
        assert_eq!(m.on_scan(&scan(4)).unwrap(), ScanOutcome::Throttled);

        // Turning far enough also triggers an update
        m.on_odom(&odom(3, 0.0, PI / 6.0 + 0.01)).unwrap();
        assert!(matches!(
            m.on_scan(&scan(5)).unwrap(),
            ScanOutcome::Updated(_)
        ));

        let report = m.status_report();
        assert_eq!(report.num_updates, 2);
        assert_eq!(report.num_throttled_scans, 3);
        assert_eq!(report.valid_beams, 8);
        assert_eq!(report.num_particles, 50);
        assert!(m.latest_estimate().is_some());
    }

    #[test]
    fn test_out_of_order_inputs_dropped() {
        let mut m = mgr(LocParams {
            motion_linear_noise_ratio: 0.0,
            motion_angular_noise_ratio: 0.0,
            ..Default::default()
        });
        m.set_pose(Pose::default(), NO_SPREAD).unwrap();

        m.on_odom(&odom(5, 1.0, 0.0)).unwrap();
        m.on_odom(&odom(5, 1.0, 0.0)).unwrap();
        m.on_odom(&odom(4, 1.0, 0.0)).unwrap();

        let snap = m.cloud_snapshot().unwrap();
        assert!(snap.particles.iter().all(|p| p.x_m == 1.0));

        assert!(matches!(
            m.on_scan(&scan(9)).unwrap(),
            ScanOutcome::Updated(_)
        ));
        assert_eq!(m.on_scan(&scan(9)).unwrap(), ScanOutcome::Dropped);

        assert_eq!(m.status_report().num_dropped_inputs, 3);
    }

    #[test]
    fn test_reconfigure_num_particles() {
        let mut m = mgr(LocParams {
            num_particles: 100,
            ..Default::default()
        });
        m.set_pose(Pose::new(2.0, 1.0, 0.5), None).unwrap();
        assert_eq!(m.cloud_snapshot().unwrap().particles.len(), 100);

        m.reconfigure(&LocParamsUpdate {
            num_particles: Some(50),
            ..Default::default()
        })
        .unwrap();

        let snap = m.cloud_snapshot().unwrap();
        assert_eq!(snap.particles.len(), 50);
        assert_relative_eq!(snap.total_weight(), 1.0, epsilon = 1e-9);
        assert_eq!(m.params().num_particles, 50);
        assert_eq!(m.status_report().num_particles, 50);
        assert_eq!(m.state(), LocState::Tracking);

        // Without a change in size the cloud is left alone
        let before = m.cloud_snapshot().unwrap();
        m.reconfigure(&LocParamsUpdate {
            model_noise_rate: Some(0.1),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(m.cloud_snapshot().unwrap(), before);
        assert_eq!(m.params().model_noise_rate, 0.1);
    }

    #[test]
    fn test_reconfigure_invalid() {
        let mut m = mgr(LocParams::default());

        for update in [
            LocParamsUpdate {
                sample_factor: Some(1.5),
                ..Default::default()
            },
            LocParamsUpdate {
                resample_linear_sigma_m: Some(-0.1),
                ..Default::default()
            },
            LocParamsUpdate {
                num_particles: Some(0),
                sample_factor: Some(0.5),
                ..Default::default()
            },
        ]
        .iter()
        {
            assert!(matches!(
                m.reconfigure(update),
                Err(LocError::InvalidConfiguration(_))
            ));
        }

        let defaults = LocParams::default();
        assert_eq!(m.params().sample_factor, defaults.sample_factor);
        assert_eq!(m.params().num_particles, defaults.num_particles);
    }

    /// A map in which every point is far from any obstacle
    struct EmptyWorld;

    impl MapQuery for EmptyWorld {
        fn nearest_obstacle_distance(&self, _point: &Vector2<f64>) -> Option<f64> {
            Some(100.0)
        }
    }

    #[test]
    fn test_persistent_degenerate_weights() {
        let params = LocParams {
            num_particles: 20,
            model_noise_floor: 0.0,
            degenerate_warn_limit: 3,
            seed: Some(2),
            ..Default::default()
        };
        let mut m = LocMgr::new(params, Arc::new(EmptyWorld)).unwrap();
        m.set_pose(Pose::default(), None).unwrap();

        for i in 1..=4 {
            m.on_odom(&odom(i, 0.3, 0.0)).unwrap();
            assert!(matches!(
                m.on_scan(&scan(i)).unwrap(),
                ScanOutcome::Updated(_)
            ));

            let report = m.status_report();
            assert!(report.degenerate_weights);
            assert_eq!(report.consec_degenerate_updates, i as u32);
            assert_eq!(report.localisation_suspect, i > 3);
        }

        // The filter keeps tracking, and reseeding clears the health flags
        assert_eq!(m.state(), LocState::Tracking);
        m.set_pose(Pose::default(), None).unwrap();
        assert!(!m.status_report().localisation_suspect);
    }

    #[test]
    fn test_proc_messages() {
        let mut m = mgr(LocParams {
            num_particles: 30,
            ..Default::default()
        });

        let msgs = vec![
            LocMsg::Tc(LocTc::SetPose {
                x_m: 2.0,
                y_m: 1.5,
                heading_rad: 0.0,
                spread: None,
            }),
            LocMsg::Odom(odom(1, 0.5, 0.0)),
            LocMsg::Scan(scan(1)),
            LocMsg::Tc(LocTc::Reconfigure(LocParamsUpdate {
                num_particles: Some(40),
                ..Default::default()
            })),
        ];

        let outputs: Vec<Option<PoseEstimate>> = msgs
            .iter()
            .map(|msg| m.proc(msg).unwrap().0)
            .collect();

        assert!(outputs[0].is_none());
        assert!(outputs[1].is_none());
        assert_eq!(outputs[2].map(|e| e.scan_seq), Some(1));
        assert!(outputs[3].is_none());
        assert_eq!(m.status_report().num_particles, 40);

        // Writing without archivers does nothing
        assert!(m.write().is_ok());
    }
}
