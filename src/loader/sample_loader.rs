use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};

use super::decode::DecodeError;
use super::sample_store::{prepare, PreparedSample, SampleTarget};

pub struct DecodeJob {
    pub target: SampleTarget,
    pub name: String,
    pub bytes: Vec<u8>,
    pub generation: u64, // session generation at request time; stale results get dropped
}

pub struct DecodeOutcome {
    pub target: SampleTarget,
    pub name: String,
    pub generation: u64,
    pub result: Result<PreparedSample, DecodeError>,
}

// Decodes on a background thread so the control loop (and the grid) never stalls on a big file.
// Results only take effect once the control loop polls them and installs them whole.
pub struct SampleLoader {
    jobs_tx: Sender<DecodeJob>,
    done_rx: Receiver<DecodeOutcome>,
    in_flight: usize,
    _worker: JoinHandle<()>,
}

impl SampleLoader {
    pub fn spawn(target_rate: u32) -> anyhow::Result<Self> {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<DecodeJob>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<DecodeOutcome>();

        let worker = thread::Builder::new()
            .name("sample-decode".into())
            .spawn(move || {
                for job in jobs_rx {
                    let result = prepare(job.name.clone(), job.bytes, target_rate);
                    let outcome = DecodeOutcome {
                        target: job.target,
                        name: job.name,
                        generation: job.generation,
                        result,
                    };
                    if done_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })
            .context("failed to spawn decode worker")?;

        Ok(Self { jobs_tx, done_rx, in_flight: 0, _worker: worker })
    }

    pub fn request(&mut self, job: DecodeJob) {
        if self.jobs_tx.send(job).is_ok() {
            self.in_flight += 1;
        }
    }

    pub fn poll(&mut self) -> Vec<DecodeOutcome> {
        let done: Vec<DecodeOutcome> = self.done_rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

// All .wav files directly inside `dir`, sorted by name
pub fn index_wav_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

// Read a sample file from disk; the display name is the file stem
pub fn read_sample_file(path: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sample".to_string());
    Ok((name, bytes))
}
