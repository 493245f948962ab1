// Test helpers: wav bytes synthesized in memory, and an AudioOutput that just records.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::Cursor;

use crate::audio_api::{AudioCommand, AudioOutput, EngineEvent, VoiceParams};
use crate::audio::{SampleId, VoiceHandle};

pub fn wav_bytes(sample_rate: u32, samples: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn wav_bytes_stereo_i16(sample_rate: u32, frames: &[(i16, i16)]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &(l, r) in frames {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

// 440 Hz at half scale
pub fn sine_wav(sample_rate: u32, secs: f64) -> Vec<u8> {
    let n = (sample_rate as f64 * secs).round() as usize;
    let samples: Vec<f32> = (0..n)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
        .collect();
    wav_bytes(sample_rate, &samples)
}

/// Stands in for the audio device. Commands are recorded instead of played; the clock
/// only moves when a test moves it.
pub struct RecordingOutput {
    sample_rate: u32,
    clock: Cell<u64>,
    commands: RefCell<Vec<AudioCommand>>,
    events: RefCell<VecDeque<EngineEvent>>,
}

impl RecordingOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            clock: Cell::new(0),
            commands: RefCell::new(Vec::new()),
            events: RefCell::new(VecDeque::new()),
        }
    }

    pub fn set_clock(&self, frames: u64) {
        self.clock.set(frames);
    }

    pub fn push_event(&self, event: EngineEvent) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn commands(&self) -> Vec<AudioCommand> {
        self.commands.borrow().clone()
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }

    pub fn plays(&self) -> Vec<(VoiceHandle, VoiceParams)> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| match c {
                AudioCommand::Play { handle, params } => Some((*handle, params.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn stops(&self) -> Vec<VoiceHandle> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| match c {
                AudioCommand::Stop(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn registered(&self) -> Vec<SampleId> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| match c {
                AudioCommand::RegisterSample { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<SampleId> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| match c {
                AudioCommand::ReleaseSample(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

impl AudioOutput for RecordingOutput {
    fn send(&self, cmd: AudioCommand) {
        self.commands.borrow_mut().push(cmd);
    }

    fn clock_frames(&self) -> u64 {
        self.clock.get()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn poll_event(&self) -> Option<EngineEvent> {
        self.events.borrow_mut().pop_front()
    }
}
