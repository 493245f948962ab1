use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;

use super::frame::StereoFrame;
use super::ids::{SampleId, VoiceHandle};
use super::sample_buffer::SampleBuffer;
use super::voice::Voice;
use crate::audio_api::{AudioCommand, EngineEvent, VoiceParams};

pub const MAX_VOICES: usize = 64; // hard cap so we wont malloc in audio callback

struct Slot {
    handle: VoiceHandle,
    sample_id: SampleId,
    voice: Voice,
}

// Lives inside the output callback. Owns the buffers, the voice pool and the audio clock.
pub struct Engine {
    sample_rate: f32,
    samples: HashMap<SampleId, SampleBuffer>,
    voices: Vec<Option<Slot>>, // fixed pool of voices
    frames_rendered: u64,
    clock: Arc<AtomicU64>,
    events_tx: Sender<EngineEvent>,
}

impl Engine {
    pub fn new(sample_rate: u32, clock: Arc<AtomicU64>, events_tx: Sender<EngineEvent>) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            samples: HashMap::with_capacity(32),
            voices: (0..MAX_VOICES).map(|_| None).collect(),
            frames_rendered: clock.load(Ordering::Relaxed),
            clock,
            events_tx,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample { id, buffer } => {
                self.samples.insert(id, buffer);
            }
            AudioCommand::ReleaseSample(id) => {
                self.samples.remove(&id);
            }
            AudioCommand::Play { handle, params } => self.start_voice(handle, params),
            AudioCommand::Stop(handle) => {
                if let Some(slot) = self.voices.iter_mut().find(|s| matches!(s, Some(s) if s.handle == handle)) {
                    finish(&self.events_tx, slot);
                }
            }
        }
    }

    fn start_voice(&mut self, handle: VoiceHandle, p: VoiceParams) {
        // what slot do we write to? a free one, or else steal the oldest voice
        let idx = match self.voices.iter().position(Option::is_none) {
            Some(idx) => idx,
            None => {
                let oldest = self
                    .voices
                    .iter()
                    .enumerate()
                    .filter_map(|(i, s)| s.as_ref().map(|s| (i, s.handle)))
                    .min_by_key(|&(_, h)| h)
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                finish(&self.events_tx, &mut self.voices[oldest]);
                oldest
            }
        };

        let voice = Voice::new(p.trim_start, p.length, p.start_frame, p.rate, p.gain, p.eq, self.sample_rate);
        self.voices[idx] = Some(Slot { handle, sample_id: p.sample_id, voice });
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::zero());

        for slot in self.voices.iter_mut() {
            let Some(s) = slot else { continue };
            match self.samples.get(&s.sample_id) {
                Some(buffer) => s.voice.render_into(buffer, out, self.frames_rendered),
                None => s.voice.stop(), // buffer was replaced under us
            }
            if !s.voice.active {
                finish(&self.events_tx, slot);
            }
        }

        for f in out.iter_mut() {
            f.left = f.left.clamp(-1.0, 1.0);
            f.right = f.right.clamp(-1.0, 1.0);
        }

        self.frames_rendered += out.len() as u64;
        self.clock.store(self.frames_rendered, Ordering::Relaxed);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|s| s.is_some()).count()
    }
}

// free the slot and tell the control side, once
fn finish(tx: &Sender<EngineEvent>, slot: &mut Option<Slot>) {
    if let Some(s) = slot.take() {
        let _ = tx.try_send(EngineEvent::VoiceFinished(s.handle));
    }
}
