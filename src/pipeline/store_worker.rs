use std::thread::{self, JoinHandle};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::blob_store::{BlobStore, StoreError};
use crate::pipeline::persistence::{self, LoadedProject, SaveRequest};
use crate::pipeline::project::ProjectDoc;

pub enum StoreJob {
    Save(SaveRequest),
    // None loads the newest project
    Load { id: Option<String>, generation: u64 },
}

pub enum StoreOutcome {
    Saved(Result<ProjectDoc, StoreError>),
    Loaded {
        generation: u64,
        result: Result<Option<LoadedProject>, StoreError>,
    },
}

// Project saves and loads on their own thread with their own connection, so blob writes and
// decoding a whole project never hold up the frame loop. Like the sample loader, results
// only take effect once the control loop polls them.
pub struct StoreWorker {
    jobs_tx: Sender<StoreJob>,
    done_rx: Receiver<StoreOutcome>,
    in_flight: usize,
    _worker: JoinHandle<()>,
}

impl StoreWorker {
    pub fn spawn(store: BlobStore, target_rate: u32) -> anyhow::Result<Self> {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<StoreJob>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<StoreOutcome>();

        let worker = thread::Builder::new()
            .name("project-store".into())
            .spawn(move || {
                for job in jobs_rx {
                    let outcome = match job {
                        StoreJob::Save(req) => StoreOutcome::Saved(persistence::write_project(&store, req)),
                        StoreJob::Load { id, generation } => {
                            let result = match id {
                                Some(id) => persistence::gather_project(&store, &id, target_rate).map(Some),
                                None => persistence::gather_latest(&store, target_rate),
                            };
                            StoreOutcome::Loaded { generation, result }
                        }
                    };
                    if done_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })
            .context("failed to spawn project store worker")?;

        Ok(Self { jobs_tx, done_rx, in_flight: 0, _worker: worker })
    }

    pub fn request(&mut self, job: StoreJob) {
        if self.jobs_tx.send(job).is_ok() {
            self.in_flight += 1;
        }
    }

    pub fn poll(&mut self) -> Vec<StoreOutcome> {
        let done: Vec<StoreOutcome> = self.done_rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
