use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{info, warn};

use crate::audio_api::{AudioCommand, AudioOutput, EngineEvent};

pub mod eq;
pub mod graph;
pub mod ids;
mod engine;
mod frame;
mod sample_buffer;
mod voice;

pub use eq::EqSettings;
pub use frame::StereoFrame;
pub use graph::{VoiceGraph, VoiceKey, VoiceRequest};
pub use ids::{next_sample_id, SampleId, VoiceHandle};
pub use sample_buffer::SampleBuffer;

use engine::Engine;

const COMMAND_QUEUE: usize = 1024;
const EVENT_QUEUE: usize = 1024;
const SCRATCH_FRAMES: usize = 4096;

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    events_rx: Receiver<EngineEvent>,
    clock: Arc<AtomicU64>,
    sample_rate: u32,
    stream_errors: Arc<AtomicUsize>,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn stream_errors(&self) -> usize {
        self.stream_errors.load(Ordering::Relaxed)
    }
}

impl AudioOutput for AudioHandle {
    fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            warn!("audio command queue full, dropping command");
        }
    }

    fn clock_frames(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn poll_event(&self) -> Option<EngineEvent> {
        self.events_rx.try_recv().ok()
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);
    let (events_tx, events_rx) = crossbeam_channel::bounded::<EngineEvent>(EVENT_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    let clock = Arc::new(AtomicU64::new(0));
    let stream_errors = Arc::new(AtomicUsize::new(0));

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let engine = Engine::new(sample_rate, clock.clone(), events_tx);
            let output_stream = build_output_stream_f32(
                &device, &config.into(), rx, engine, channels, stream_errors.clone(),
            )?;
            output_stream.play().context("failed to play output stream")?;
            info!(sample_rate, channels, "audio output started");

            Ok(AudioHandle {
                tx,
                events_rx,
                clock,
                sample_rate,
                stream_errors,
                _output_stream: output_stream,
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
    stream_errors: Arc<AtomicUsize>,
) -> anyhow::Result<cpal::Stream> {
    // no logging in here; errors are counted and reported from the control side
    let err_fn = move |_err| {
        stream_errors.fetch_add(1, Ordering::Relaxed);
    };
    let mut scratch = vec![StereoFrame::zero(); SCRATCH_FRAMES];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() { // set up command handling
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            if scratch.len() < n_frames {
                scratch.resize(n_frames, StereoFrame::zero());
            }
            let frames = &mut scratch[..n_frames];
            engine.render_block(frames);

            for (out, f) in data.chunks_exact_mut(channels.max(1)).zip(frames.iter()) {
                match out {
                    [mono] => *mono = (f.left + f.right) * 0.5,
                    [l, r, rest @ ..] => {
                        *l = f.left;
                        *r = f.right;
                        rest.fill(0.0);
                    }
                    [] => {}
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
