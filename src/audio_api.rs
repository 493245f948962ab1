pub use crate::audio::{EqSettings, SampleBuffer, SampleId, VoiceHandle};

// Everything the engine needs to build one voice. Positions are in frames at the device rate.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceParams {
    pub sample_id: SampleId,
    pub trim_start: usize,
    pub length: Option<usize>, // None plays to the end of the buffer
    pub start_frame: u64,      // on the audio clock
    pub rate: f32,
    pub gain: f32,
    pub eq: EqSettings,
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't decode files (interrupts thread), so buffers are decoded and resampled
    // on the control side and handed over ready to play
    RegisterSample { id: SampleId, buffer: SampleBuffer },

    // Voices still reading a released buffer end on their next block
    ReleaseSample(SampleId),

    Play { handle: VoiceHandle, params: VoiceParams },

    // Stopping a handle that already finished (or never started) is a no-op
    Stop(VoiceHandle),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    // sent once per handle, on natural completion, explicit stop, or being stolen
    VoiceFinished(VoiceHandle),
}

// The control side's view of the engine. `AudioHandle` talks to the cpal callback;
// tests swap in a recorder.
pub trait AudioOutput {
    fn send(&self, cmd: AudioCommand);

    // frames rendered so far by the device
    fn clock_frames(&self) -> u64;

    fn sample_rate(&self) -> u32;

    fn poll_event(&self) -> Option<EngineEvent>;
}
