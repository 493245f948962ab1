// Sits between input and the engine. Owns every piece of sequencer state on the control
// thread; the audio callback only ever hears about it through commands.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::audio::{EqSettings, VoiceGraph, VoiceHandle, VoiceKey, VoiceRequest};
use crate::audio_api::AudioOutput;
use crate::loader::sample_loader::{index_wav_in_dir, read_sample_file};
use crate::loader::{
    prepare, DecodeError, DecodeJob, LoadedSample, PreparedSample, SampleLoader, SampleStore,
    SampleTarget,
};
use crate::pipeline::blob_store::{BlobStore, StoreError};
use crate::pipeline::persistence::{self, LoadedProject, ProjectSummary, SaveRequest};
use crate::pipeline::project::{drop_dangling_assignments, ProjectDoc, ProjectSource};
use crate::pipeline::slices::{SliceId, SliceManager};
use crate::pipeline::store_worker::{StoreJob, StoreOutcome, StoreWorker};
use crate::pipeline::tracks::{band, DrumParam, PadParam, TrackModel};
use crate::shared::{
    DisplayState, InputEvent, RowDisplay, Section, MAX_SAMPLER_SECONDS, NUM_DRUM_ROWS,
};
use crate::transport::{dispatch, plan_step, sampler_rate, StepInputs, Transport};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("sampler sample is {0:.1}s, the limit is 300s")]
    TooLong(f64),
    #[error("no drum row {0}")]
    BadRow(usize),
}

pub struct Middle<O: AudioOutput> {
    tracks: TrackModel,
    slices: SliceManager,
    samples: SampleStore,
    transport: Transport,
    graph: VoiceGraph<O>,
    store: BlobStore,
    loader: Option<SampleLoader>,
    projects: Option<StoreWorker>,
    generation: u64, // bumped by reset/load so late results don't land in a new session
    default_bpm: f32,
    sample_bpm: Option<f32>,
    sample_dir: PathBuf,
    browse: HashMap<SampleTarget, usize>, // next file index per target, for LoadNextSample
    status: String,
}

impl<O: AudioOutput> Middle<O> {
    pub fn new(output: O, store: BlobStore, bpm: f32, sample_dir: PathBuf) -> Self {
        let transport = Transport::new(bpm);
        Self {
            tracks: TrackModel::default(),
            slices: SliceManager::default(),
            samples: SampleStore::default(),
            default_bpm: transport.bpm(),
            transport,
            graph: VoiceGraph::new(output),
            store,
            loader: None,
            projects: None,
            generation: 0,
            sample_dir,
            sample_bpm: None,
            browse: HashMap::new(),
            status: String::new(),
        }
    }

    // decode on a worker thread instead of inline
    pub fn with_loader(mut self, loader: SampleLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    // save and load projects on a worker instead of inline
    pub fn with_store_worker(mut self, worker: StoreWorker) -> Self {
        self.projects = Some(worker);
        self
    }

    pub fn tracks(&self) -> &TrackModel {
        &self.tracks
    }

    pub fn slices(&self) -> &SliceManager {
        &self.slices
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn graph(&self) -> &VoiceGraph<O> {
        &self.graph
    }

    pub fn sample_bpm(&self) -> Option<f32> {
        self.sample_bpm
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    // ── transport ───────────────────────────────────────────────

    pub fn start(&mut self) {
        self.transport.start();
        info!(bpm = self.transport.bpm(), "transport started");
    }

    // Drum hits are left to ring out; sampler voices are cut
    pub fn stop(&mut self) {
        self.transport.stop();
        self.graph.stop_section(Section::Sampler);
        info!("transport stopped");
    }

    pub fn toggle_play(&mut self) {
        if self.transport.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    // A running transport restarts from step 0 at the new tempo, same as stop + start
    pub fn set_bpm(&mut self, bpm: f32) {
        if self.transport.set_bpm(bpm) {
            self.graph.stop_section(Section::Sampler);
            info!(bpm = self.transport.bpm(), "tempo changed, transport restarted");
        }
    }

    // non-positive unsets it
    pub fn set_sample_bpm(&mut self, bpm: Option<f32>) {
        self.sample_bpm = bpm.filter(|b| b.is_finite() && *b > 0.0);
    }

    // Call once per frame with the wall time since the last call.
    pub fn tick(&mut self, dt: f64) {
        self.poll_loads();
        self.poll_store();
        self.graph.poll_finished();

        let dur = self.transport.step_duration();
        let Some(tick) = self.transport.advance(dt) else { return };
        let inputs = StepInputs {
            tracks: &self.tracks,
            slices: &self.slices,
            samples: &self.samples,
            bpm: self.transport.bpm(),
            sample_bpm: self.sample_bpm,
        };
        let mut plan = plan_step(tick.step, dur, &inputs);
        // the loop came round inside the skipped steps; last loop's pad voices still go
        plan.stop_sampler_voices |= tick.passed_loop_start();
        dispatch(plan, &mut self.graph);
    }

    // ── track model ─────────────────────────────────────────────

    pub fn toggle_step(&mut self, section: Section, row: usize, col: usize) {
        self.tracks.toggle_step(section, row, col);
    }

    pub fn clear_row(&mut self, section: Section, row: usize) {
        self.tracks.clear_row(section, row);
    }

    pub fn set_row_param(&mut self, row: usize, param: DrumParam, value: f32) {
        self.tracks.set_row_param(row, param, value);
    }

    pub fn set_pad_param(&mut self, pad: usize, param: PadParam, value: f32) {
        self.tracks.set_pad_param(pad, param, value);
    }

    // ── samples ─────────────────────────────────────────────────

    pub fn load_drum_sample(&mut self, row: usize, name: String, bytes: Vec<u8>) -> Result<(), LoadError> {
        if row >= NUM_DRUM_ROWS {
            return Err(LoadError::BadRow(row));
        }
        let prepared = prepare(name, bytes, self.graph.sample_rate())?;
        self.install(SampleTarget::Drum(row), prepared)
    }

    pub fn load_sampler_sample(&mut self, name: String, bytes: Vec<u8>) -> Result<(), LoadError> {
        let prepared = prepare(name, bytes, self.graph.sample_rate())?;
        self.install(SampleTarget::Sampler, prepared)
    }

    // Queue a decode on the worker; without one this is just the synchronous path.
    pub fn request_load(&mut self, target: SampleTarget, name: String, bytes: Vec<u8>) {
        let generation = self.generation;
        match self.loader.as_mut() {
            Some(loader) => loader.request(DecodeJob { target, name, bytes, generation }),
            None => {
                let result = match target {
                    SampleTarget::Drum(row) => self.load_drum_sample(row, name.clone(), bytes),
                    SampleTarget::Sampler => self.load_sampler_sample(name.clone(), bytes),
                };
                self.report_load(&name, result);
            }
        }
    }

    // sample decodes plus project saves/loads still out on a worker
    pub fn loads_in_flight(&self) -> usize {
        self.loader.as_ref().map_or(0, SampleLoader::in_flight)
            + self.projects.as_ref().map_or(0, StoreWorker::in_flight)
    }

    fn poll_loads(&mut self) {
        let Some(loader) = self.loader.as_mut() else { return };
        for done in loader.poll() {
            if done.generation != self.generation {
                info!(name = %done.name, "dropping decode from before reset/load");
                continue;
            }
            let result = done
                .result
                .map_err(LoadError::from)
                .and_then(|p| self.install(done.target, p));
            self.report_load(&done.name, result);
        }
    }

    fn report_load(&mut self, name: &str, result: Result<(), LoadError>) {
        match result {
            Ok(()) => self.status = format!("loaded {name}"),
            Err(e) => {
                warn!(name, error = %e, "sample load failed");
                self.status = format!("could not load {name}: {e}");
            }
        }
    }

    // Every check happens before anything changes; on error the old buffer stays put.
    fn install(&mut self, target: SampleTarget, prepared: PreparedSample) -> Result<(), LoadError> {
        match target {
            SampleTarget::Drum(row) if row >= NUM_DRUM_ROWS => return Err(LoadError::BadRow(row)),
            SampleTarget::Sampler if prepared.sample.duration() > MAX_SAMPLER_SECONDS => {
                return Err(LoadError::TooLong(prepared.sample.duration()));
            }
            _ => {}
        }

        let PreparedSample { sample, buffer } = prepared;
        self.graph.register_sample(sample.id, buffer);
        let duration = sample.duration();
        if let Some(old) = self.samples.install(target, sample) {
            self.graph.release_sample(old.id);
        }

        if target == SampleTarget::Sampler {
            // slices belong to the old buffer
            self.graph.stop_section(Section::Sampler);
            self.graph.stop(VoiceKey::Preview);
            self.slices.replace_buffer(duration, &mut self.tracks.pads);
        }
        Ok(())
    }

    // Load the next .wav from the sample dir into `target`, cycling through the directory
    pub fn load_next_sample(&mut self, target: SampleTarget) {
        let files = match index_wav_in_dir(&self.sample_dir) {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                self.status = format!("no .wav files in {}", self.sample_dir.display());
                return;
            }
            Err(e) => {
                warn!(error = %e, "could not read sample dir");
                self.status = format!("{e:#}");
                return;
            }
        };
        let idx = self.browse.entry(target).or_insert(0);
        let path = &files[*idx % files.len()];
        *idx = (*idx + 1) % files.len();

        match read_sample_file(path) {
            Ok((name, bytes)) => {
                self.status = format!("loading {name}");
                self.request_load(target, name, bytes);
            }
            Err(e) => {
                warn!(error = %e, "could not read sample file");
                self.status = format!("{e:#}");
            }
        }
    }

    // ── slices ──────────────────────────────────────────────────

    pub fn add_slice(&mut self, start: f64, end: f64) -> Option<SliceId> {
        self.slices.add_slice(start, end)
    }

    pub fn assign_slice_to_pad(&mut self, slice: Option<SliceId>, pad: usize) {
        SliceManager::assign_slice_to_pad(&mut self.tracks.pads, slice, pad);
    }

    pub fn auto_assign_slices(&mut self) {
        self.slices.auto_assign_slices(&mut self.tracks.pads);
    }

    pub fn clear_slices(&mut self) {
        self.slices.clear(&mut self.tracks.pads);
    }

    // Plays straight away and cuts the previous preview
    pub fn preview_slice(&mut self, id: SliceId) -> Option<VoiceHandle> {
        let sampler = self.samples.sampler()?;
        let slice = self.slices.get(id)?;
        Some(self.graph.play_voice(VoiceRequest {
            sample_id: sampler.id,
            range: Some((slice.start, slice.duration())),
            start_delay: 0.0,
            stop_previous: true,
            rate: sampler_rate(self.transport.bpm(), self.sample_bpm),
            gain: 1.0,
            eq: EqSettings::flat(),
            track: None,
        }))
    }

    // ── projects ────────────────────────────────────────────────

    fn source<'a>(&'a self, name: &'a str) -> ProjectSource<'a> {
        ProjectSource {
            name,
            bpm: self.transport.bpm(),
            sample_bpm: self.sample_bpm,
            tracks: &self.tracks,
            slices: &self.slices,
            samples: &self.samples,
        }
    }

    pub fn save(&mut self, name: &str) -> Result<ProjectDoc, StoreError> {
        persistence::save_project(&self.store, &self.source(name))
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        persistence::list_projects(&self.store)
    }

    pub fn delete_project(&mut self, id: &str) -> Result<(), StoreError> {
        persistence::delete_project(&self.store, id)
    }

    // Not while the worker has a save out: both sides rewrite the index.
    fn delete_latest(&mut self) {
        if self.projects.as_ref().is_some_and(|w| w.in_flight() > 0) {
            self.status = "store busy, try again".to_string();
            return;
        }
        let result = self.list_projects().and_then(|list| match list.into_iter().next() {
            Some(p) => self.delete_project(&p.id).map(|()| Some(p)),
            None => Ok(None),
        });
        self.status = match result {
            Ok(Some(p)) => format!("deleted {}", display_name(&p.name, &p.id)),
            Ok(None) => "no saved projects".to_string(),
            Err(e) => {
                error!(error = %e, "delete failed");
                format!("delete failed: {e}")
            }
        };
    }

    // The session is snapshotted now; the write happens on the worker when there is one.
    pub fn request_save(&mut self, name: &str) {
        if self.projects.is_none() {
            let result = self.save(name);
            self.report_save(result);
            return;
        }
        let req = SaveRequest::capture(&self.source(name));
        if let Some(worker) = self.projects.as_mut() {
            worker.request(StoreJob::Save(req));
        }
        self.status = format!("saving {name}");
    }

    // `None` loads the newest project. Everything is fetched and decoded before the session
    // is touched, so a failed load leaves it exactly as it was. A newer load request, a reset
    // or another load landing first makes this one stale, and it is dropped when it comes back.
    pub fn request_project_load(&mut self, id: Option<String>) {
        self.generation += 1;
        let generation = self.generation;
        match self.projects.as_mut() {
            Some(worker) => {
                worker.request(StoreJob::Load { id, generation });
                self.status = "loading project".to_string();
            }
            None => {
                let rate = self.graph.sample_rate();
                let result = match id {
                    Some(id) => persistence::gather_project(&self.store, &id, rate).map(Some),
                    None => persistence::gather_latest(&self.store, rate),
                };
                self.finish_project_load(result);
            }
        }
    }

    fn poll_store(&mut self) {
        let Some(worker) = self.projects.as_mut() else { return };
        for done in worker.poll() {
            match done {
                StoreOutcome::Saved(result) => self.report_save(result),
                StoreOutcome::Loaded { generation, .. } if generation != self.generation => {
                    info!("dropping project load from before reset/load");
                }
                StoreOutcome::Loaded { result, .. } => self.finish_project_load(result),
            }
        }
    }

    fn report_save(&mut self, result: Result<ProjectDoc, StoreError>) {
        match result {
            Ok(doc) => self.status = format!("saved {}", doc.name),
            Err(e) => {
                error!(error = %e, "save failed");
                self.status = format!("save failed: {e}");
            }
        }
    }

    fn finish_project_load(&mut self, result: Result<Option<LoadedProject>, StoreError>) {
        match result {
            Ok(Some(loaded)) => self.install_project(loaded),
            Ok(None) => self.status = "no saved projects".to_string(),
            Err(e) => {
                error!(error = %e, "load failed");
                self.status = format!("load failed: {e}");
            }
        }
    }

    fn install_project(&mut self, loaded: LoadedProject) {
        let LoadedProject { project, drums, sampler } = loaded;
        self.stop();
        self.graph.stop(VoiceKey::Preview);
        self.clear_samples();

        for (row, prepared) in drums.into_iter().enumerate() {
            if let Some(p) = prepared {
                self.register_and_store(SampleTarget::Drum(row), p);
            }
        }
        if let Some(p) = sampler {
            self.register_and_store(SampleTarget::Sampler, p);
        }

        self.tracks = project.tracks;
        self.slices.restore(self.samples.sampler_duration(), project.slices);
        drop_dangling_assignments(&mut self.tracks, &self.slices);
        self.transport.set_bpm(project.bpm);
        self.sample_bpm = project.sample_bpm;
        self.status = format!("loaded project {}", display_name(&project.name, &project.id));
        info!(id = %project.id, name = %project.name, "project loaded");
    }

    fn register_and_store(&mut self, target: SampleTarget, prepared: PreparedSample) {
        let PreparedSample { sample, buffer } = prepared;
        self.graph.register_sample(sample.id, buffer);
        if let Some(old) = self.samples.install(target, sample) {
            self.graph.release_sample(old.id);
        }
    }

    fn clear_samples(&mut self) {
        self.generation += 1;
        let old: Vec<LoadedSample> = self.samples.clear_all();
        for s in old {
            self.graph.release_sample(s.id);
        }
    }

    // Back to an empty session. Saved projects are left alone.
    pub fn reset(&mut self) {
        self.stop();
        self.graph.stop(VoiceKey::Preview);
        self.clear_samples();
        self.tracks.reset();
        self.slices.replace_buffer(0.0, &mut self.tracks.pads);
        self.transport.set_bpm(self.default_bpm);
        self.sample_bpm = None;
        self.status = "reset".to_string();
        info!("session reset");
    }

    // ── input ───────────────────────────────────────────────────

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::TogglePlay => self.toggle_play(),
            InputEvent::ToggleStep { section, row, col } => self.toggle_step(section, row, col),
            InputEvent::ClearRow { section, row } => self.clear_row(section, row),
            InputEvent::AdjustBpm(delta) => self.set_bpm(self.transport.bpm() + delta),
            InputEvent::AdjustSampleBpm(delta) => {
                let current = self.sample_bpm.unwrap_or(self.transport.bpm());
                self.set_sample_bpm(Some(current + delta));
            }
            InputEvent::AdjustVolume { section, row, delta } => match section {
                Section::Drum => {
                    if let Some(r) = self.tracks.drums.get(row) {
                        let v = r.volume + delta;
                        self.set_row_param(row, DrumParam::Volume, v);
                    }
                }
                Section::Sampler => {
                    if let Some(p) = self.tracks.pads.get(row) {
                        let v = p.volume + delta;
                        self.set_pad_param(row, PadParam::Volume, v);
                    }
                }
            },
            InputEvent::AdjustPitch { section, row, delta } => match section {
                Section::Drum => {
                    if let Some(r) = self.tracks.drums.get(row) {
                        let v = (r.pitch + delta) as f32;
                        self.set_row_param(row, DrumParam::Pitch, v);
                    }
                }
                Section::Sampler => {
                    if let Some(p) = self.tracks.pads.get(row) {
                        let v = (p.pitch + delta) as f32;
                        self.set_pad_param(row, PadParam::Pitch, v);
                    }
                }
            },
            InputEvent::AdjustSwing { row, delta } => {
                if let Some(r) = self.tracks.drums.get(row) {
                    let v = r.swing + delta;
                    self.set_row_param(row, DrumParam::Swing, v);
                }
            }
            InputEvent::AdjustEq { section, row, band: b, delta } => match section {
                Section::Drum => {
                    if let Some(r) = self.tracks.drums.get(row) {
                        let v = band(&r.eq, b) + delta;
                        self.set_row_param(row, DrumParam::Eq(b), v);
                    }
                }
                Section::Sampler => {
                    if let Some(p) = self.tracks.pads.get(row) {
                        let v = band(&p.eq, b) + delta;
                        self.set_pad_param(row, PadParam::Eq(b), v);
                    }
                }
            },
            InputEvent::LoadNextSample { section, row } => {
                let target = match section {
                    Section::Drum => SampleTarget::Drum(row),
                    Section::Sampler => SampleTarget::Sampler,
                };
                self.load_next_sample(target);
            }
            InputEvent::AddNextSlice => {
                let added = self.slices.next_span().and_then(|(a, b)| self.add_slice(a, b));
                self.status = match added.and_then(|id| self.slices.get(id)) {
                    Some(s) => format!("{} {:.2}s-{:.2}s", s.label, s.start, s.end),
                    None => "no room for another slice".to_string(),
                };
            }
            InputEvent::AssignNewestSlice { pad } => {
                let newest = self.slices.newest().map(|s| s.id);
                if newest.is_some() {
                    self.assign_slice_to_pad(newest, pad);
                }
            }
            InputEvent::AutoAssignSlices => self.auto_assign_slices(),
            InputEvent::PreviewPad { pad } => {
                if let Some(id) = self.tracks.pads.get(pad).and_then(|p| p.assigned_slice) {
                    self.preview_slice(id);
                }
            }
            InputEvent::ClearSlices => self.clear_slices(),
            InputEvent::Save => {
                let name = chrono::Local::now().format("loop %Y-%m-%d %H:%M").to_string();
                self.request_save(&name);
            }
            InputEvent::LoadLatest => self.request_project_load(None),
            InputEvent::DeleteLatest => self.delete_latest(),
            InputEvent::Reset => self.reset(),
            InputEvent::Quit => {}
        }
    }

    // ── display ─────────────────────────────────────────────────

    pub fn display_state(&self) -> DisplayState {
        let t = &self.tracks;
        let drums = t
            .drums
            .iter()
            .enumerate()
            .map(|(i, r)| RowDisplay {
                name: r.name.to_string(),
                sample: self.samples.drum(i).map(|s| s.name.clone()),
                steps: t.drum_steps.row(i).to_vec(),
                volume: r.volume,
                pitch: r.pitch,
                swing: Some(r.swing),
                eq: (r.eq.low, r.eq.mid, r.eq.high),
                slice: None,
            })
            .collect();
        let pads = t
            .pads
            .iter()
            .enumerate()
            .map(|(i, p)| RowDisplay {
                name: format!("Pad {}", i + 1),
                sample: None,
                steps: t.sampler_steps.row(i).to_vec(),
                volume: p.volume,
                pitch: p.pitch,
                swing: None,
                eq: (p.eq.low, p.eq.mid, p.eq.high),
                slice: p
                    .assigned_slice
                    .and_then(|id| self.slices.get(id))
                    .map(|s| s.label.clone()),
            })
            .collect();

        DisplayState {
            drums,
            pads,
            playing: self.transport.is_running(),
            playhead: self.transport.playhead(),
            bpm: self.transport.bpm(),
            sample_bpm: self.sample_bpm,
            sampler_sample: self.samples.sampler().map(|s| s.name.clone()),
            sampler_duration: self.samples.sampler_duration(),
            slices: self
                .slices
                .slices()
                .iter()
                .map(|s| format!("{} {:.2}-{:.2}", s.label, s.start, s.end))
                .collect(),
            loading: self.loads_in_flight(),
            status: self.status.clone(),
        }
    }
}

fn display_name<'a>(name: &'a str, id: &'a str) -> &'a str {
    if name.is_empty() { id } else { name }
}
