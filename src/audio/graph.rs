use std::collections::HashMap;

use tracing::debug;

use super::eq::EqSettings;
use super::ids::{next_voice_handle, SampleId, VoiceHandle};
use super::sample_buffer::SampleBuffer;
use crate::audio_api::{AudioCommand, AudioOutput, EngineEvent, VoiceParams};
use crate::shared::Section;

/// Where a long-lived voice is tracked. Drum hits are one-shots and stay untracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoiceKey {
    Track(Section, usize),
    Preview,
}

/// One voice to build: a buffer (or a `[start, start + duration)` range of it in seconds),
/// when to start relative to now on the audio clock, and the chain settings.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceRequest {
    pub sample_id: SampleId,
    pub range: Option<(f64, f64)>,
    pub start_delay: f64,
    pub stop_previous: bool,
    pub rate: f32,
    pub gain: f32,
    pub eq: EqSettings,
    pub track: Option<VoiceKey>,
}

/// Control-side gateway to the engine. Every voice goes through here, and the handles of
/// tracked voices live in `live` until the engine reports them finished or they are stopped.
pub struct VoiceGraph<O: AudioOutput> {
    output: O,
    live: HashMap<VoiceKey, VoiceHandle>,
}

impl<O: AudioOutput> VoiceGraph<O> {
    pub fn new(output: O) -> Self {
        Self { output, live: HashMap::new() }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn sample_rate(&self) -> u32 {
        self.output.sample_rate()
    }

    pub fn register_sample(&mut self, id: SampleId, buffer: SampleBuffer) {
        self.output.send(AudioCommand::RegisterSample { id, buffer });
    }

    pub fn release_sample(&mut self, id: SampleId) {
        self.output.send(AudioCommand::ReleaseSample(id));
    }

    pub fn play_voice(&mut self, req: VoiceRequest) -> VoiceHandle {
        if req.stop_previous {
            self.stop(VoiceKey::Preview);
        }

        let sr = self.output.sample_rate() as f64;
        let delay_frames = (req.start_delay.max(0.0) * sr).round() as u64;
        let (trim_start, length) = match req.range {
            Some((start, duration)) => (
                (start.max(0.0) * sr).round() as usize,
                Some(((duration.max(0.0) * sr).round() as usize).max(1)),
            ),
            None => (0, None),
        };

        let handle = next_voice_handle();
        self.output.send(AudioCommand::Play {
            handle,
            params: VoiceParams {
                sample_id: req.sample_id,
                trim_start,
                length,
                start_frame: self.output.clock_frames() + delay_frames,
                rate: req.rate,
                gain: req.gain,
                eq: req.eq,
            },
        });

        let key = if req.stop_previous { Some(VoiceKey::Preview) } else { req.track };
        if let Some(key) = key {
            self.live.insert(key, handle);
        }
        handle
    }

    // Stop whatever is tracked under `key`. Nothing tracked is fine.
    pub fn stop(&mut self, key: VoiceKey) {
        if let Some(handle) = self.live.remove(&key) {
            self.output.send(AudioCommand::Stop(handle));
        }
    }

    pub fn stop_section(&mut self, section: Section) {
        let keys: Vec<VoiceKey> = self
            .live
            .keys()
            .filter(|k| matches!(k, VoiceKey::Track(s, _) if *s == section))
            .copied()
            .collect();
        for key in keys {
            self.stop(key);
        }
    }

    pub fn live_handle(&self, key: VoiceKey) -> Option<VoiceHandle> {
        self.live.get(&key).copied()
    }

    // Drain engine events and forget handles that ended on their own,
    // so a later stop never targets a recycled voice.
    pub fn poll_finished(&mut self) -> usize {
        let mut n = 0;
        while let Some(EngineEvent::VoiceFinished(handle)) = self.output.poll_event() {
            self.live.retain(|_, h| *h != handle);
            n += 1;
        }
        if n > 0 {
            debug!(finished = n, live = self.live.len(), "voices released");
        }
        n
    }
}
