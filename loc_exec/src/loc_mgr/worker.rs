//! Worker thread which owns a [`LocMgr`], so that inputs from any thread are processed one at a
//! time, in the order they were submitted.

// ---------------------------------------------------------------------------
// INCLUDES
// ---------------------------------------------------------------------------

use std::{
    sync::mpsc::{channel, Receiver, RecvError, SendError, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use log::{debug, warn};

use comms_if::{
    msg::LocMsg,
    tm::{CloudSnapshot, PoseEstimate},
};
use util::{archive::Archived, module::State};

use super::{LocError, LocMgr, StatusReport};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Handle to a [`LocMgr`] running on its own thread.
pub struct LocWorker {
    worker_jh: JoinHandle<LocMgr>,

    worker_sender: Sender<WorkerSignal>,
    worker_reciever: Receiver<WorkerSignal>,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum WorkerSignal {
    /// The worker should stop and hand back the manager
    Stop,

    /// A new input to process
    Input(LocMsg),

    /// Send back a snapshot of the weighted cloud
    RequestSnapshot,

    /// The result of processing an input
    Output(Option<PoseEstimate>, StatusReport),

    /// The requested cloud snapshot
    Snapshot(CloudSnapshot),

    /// Processing an input or request failed, the worker carries on
    Error(Box<LocError>),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl LocWorker {
    /// Move the manager onto a new worker thread.
    pub fn new(mgr: LocMgr) -> Result<Self, LocError> {
        let (worker_sender, rx) = channel();
        let (tx, worker_reciever) = channel();

        let worker_jh = thread::Builder::new()
            .name("loc_mgr::worker".into())
            .spawn(move || worker_thread(mgr, tx, rx))
            .map_err(LocError::WorkerSpawnError)?;

        Ok(Self {
            worker_jh,
            worker_sender,
            worker_reciever,
        })
    }

    /// Queue an input for processing.
    pub fn submit(&self, msg: LocMsg) -> Result<(), LocError> {
        Ok(self.worker_sender.send(WorkerSignal::Input(msg))?)
    }

    /// Ask for a cloud snapshot, which will arrive as a [`WorkerSignal::Snapshot`] once every
    /// input submitted before it has been processed.
    pub fn request_snapshot(&self) -> Result<(), LocError> {
        Ok(self.worker_sender.send(WorkerSignal::RequestSnapshot)?)
    }

    /// Block until the worker sends a signal.
    pub fn recv(&self) -> Result<WorkerSignal, LocError> {
        Ok(self.worker_reciever.recv()?)
    }

    /// Get the next signal from the worker if there is one.
    pub fn try_recv(&self) -> Result<Option<WorkerSignal>, LocError> {
        match self.worker_reciever.try_recv() {
            Ok(s) => Ok(Some(s)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LocError::WorkerDisconnected),
        }
    }

    /// Stop the worker once it has processed everything already submitted, and get the manager
    /// back.
    ///
    /// Any signals from the worker which haven't been received are discarded.
    pub fn stop(self) -> Result<LocMgr, LocError> {
        self.worker_sender.send(WorkerSignal::Stop)?;

        self.worker_jh
            .join()
            .map_err(|_| LocError::WorkerDisconnected)
    }
}

impl From<SendError<WorkerSignal>> for LocError {
    fn from(_: SendError<WorkerSignal>) -> Self {
        Self::WorkerDisconnected
    }
}

impl From<RecvError> for LocError {
    fn from(_: RecvError) -> Self {
        Self::WorkerDisconnected
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn worker_thread(
    mut mgr: LocMgr,
    main_sender: Sender<WorkerSignal>,
    main_reciever: Receiver<WorkerSignal>,
) -> LocMgr {
    // Wait for signals from main
    while let Ok(signal) = main_reciever.recv() {
        let reply = match signal {
            WorkerSignal::Stop => break,
            WorkerSignal::Input(msg) => {
                let reply = match mgr.proc(&msg) {
                    Ok((output, report)) => WorkerSignal::Output(output, report),
                    Err(e) => {
                        warn!("Could not process {} message: {}", msg.type_str(), e);
                        WorkerSignal::Error(Box::new(e))
                    }
                };

                if let Err(e) = mgr.write() {
                    warn!("Could not archive LocMgr data: {}", e);
                }

                reply
            }
            WorkerSignal::RequestSnapshot => match mgr.cloud_snapshot() {
                Ok(s) => WorkerSignal::Snapshot(s),
                Err(e) => WorkerSignal::Error(Box::new(e)),
            },
            s => {
                warn!("Unexpected signal sent to worker: {:?}", s);
                continue;
            }
        };

        // If main has gone away there's nobody to process for
        if main_sender.send(reply).is_err() {
            break;
        }
    }

    debug!("LocMgr worker stopping");

    mgr
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{loc_mgr::LocState, map::test_utils::box_room, params::LocParams};
    use comms_if::{eqpt::odom::OdomDelta, tc::LocTc};
    use std::sync::Arc;

    #[test]
    fn test_worker_in_order() {
        let params = LocParams {
            num_particles: 20,
            seed: Some(4),
            ..Default::default()
        };
        let mgr = LocMgr::new(params, Arc::new(box_room())).unwrap();
        let worker = LocWorker::new(mgr).unwrap();

        // Odometry before initialisation is rejected, but the worker carries on
        worker
            .submit(LocMsg::Odom(OdomDelta {
                seq: 1,
                forward_m: 1.0,
                ..Default::default()
            }))
            .unwrap();
        worker
            .submit(LocMsg::Tc(LocTc::SetPose {
                x_m: 1.0,
                y_m: 1.0,
                heading_rad: 0.0,
                spread: None,
            }))
            .unwrap();
        for seq in 2..5 {
            worker
                .submit(LocMsg::Odom(OdomDelta {
                    seq,
                    forward_m: 0.1,
                    ..Default::default()
                }))
                .unwrap();
        }
        worker.request_snapshot().unwrap();

        assert!(matches!(
            worker.recv().unwrap(),
            WorkerSignal::Error(e) if matches!(*e, LocError::NotInitialised)
        ));
        for _ in 0..4 {
            assert!(matches!(
                worker.recv().unwrap(),
                WorkerSignal::Output(None, _)
            ));
        }
        match worker.recv().unwrap() {
            WorkerSignal::Snapshot(s) => assert_eq!(s.particles.len(), 20),
            s => panic!("Expected a snapshot, got {:?}", s),
        }

        let mgr = worker.stop().unwrap();
        assert_eq!(mgr.state(), LocState::Tracking);
        assert_eq!(mgr.status_report().timestamp_s, 0.0);
    }
}
