// Constants and the types that cross between the TUI and the middle layer.
//
// Keys (see tui/input.rs):
//   arrows        //  move the cursor around the grid
//   Tab           //  switch between the drum grid and the sampler grid
//   Space         //  toggle the step under the cursor
//   Enter         //  start / stop the transport
//   + / -         //  bpm up / down
//   } / {         //  sample bpm up / down, starting from the project bpm when unset
//   v / V         //  volume down / up for the selected row or pad
//   , / .         //  pitch down / up (semitones)
//   w / W         //  swing down / up (drum rows only)
//   1 2 3 / ! @ # //  eq low / mid / high up, shifted = down
//   l             //  load the next wav from the sample dir into the selected row (or the sampler)
//   k             //  add the next slice (an eighth of the sample after the last slice)
//   a             //  auto-assign slices to pads
//   p             //  assign the newest slice to the selected pad
//   P             //  preview the slice assigned to the selected pad
//   x             //  clear the selected grid row
//   X             //  clear all slices
//   s             //  save project
//   o             //  load the most recent project
//   D             //  delete the most recent project
//   R             //  reset
//   Esc           //  quit
//
// The middle layer owns all the sequencer state; the TUI just renders DisplayState each frame.

pub const NUM_DRUM_ROWS: usize = 10;
pub const NUM_SAMPLER_PADS: usize = 8;
pub const NUM_STEPS: usize = 32;
pub const STEPS_PER_BEAT: usize = 4; // 16th notes

pub const DRUM_ROW_NAMES: [&str; NUM_DRUM_ROWS] = [
    "Kick", "Snare", "Clap", "Closed Hat", "Open Hat",
    "Low Tom", "Mid Tom", "Rim", "Crash", "Perc",
];

// parameter ranges
pub const SWING_RANGE: (f32, f32) = (-60.0, 60.0);
pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);
pub const PITCH_RANGE: (i32, i32) = (-12, 12);
pub const EQ_RANGE: (f32, f32) = (-12.0, 12.0);
pub const BPM_RANGE: (f32, f32) = (40.0, 240.0);
pub const SAMPLER_RATE_RANGE: (f32, f32) = (0.5, 2.0);

pub const DEFAULT_BPM: f32 = 120.0;
pub const DEFAULT_VOLUME: f32 = 0.9;

pub const MIN_SLICE_SECONDS: f64 = 0.01;
pub const MAX_SAMPLER_SECONDS: f64 = 300.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    Drum,
    Sampler,
}

impl Section {
    pub fn rows(self) -> usize {
        match self {
            Section::Drum => NUM_DRUM_ROWS,
            Section::Sampler => NUM_SAMPLER_PADS,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Section::Drum => Section::Sampler,
            Section::Sampler => Section::Drum,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EqBand {
    Low,
    Mid,
    High,
}

// semantic events, already resolved from raw keys by the tui
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    TogglePlay,
    ToggleStep { section: Section, row: usize, col: usize },
    ClearRow { section: Section, row: usize },
    AdjustBpm(f32),
    AdjustSampleBpm(f32),
    AdjustVolume { section: Section, row: usize, delta: f32 },
    AdjustPitch { section: Section, row: usize, delta: i32 },
    AdjustSwing { row: usize, delta: f32 },
    AdjustEq { section: Section, row: usize, band: EqBand, delta: f32 },
    LoadNextSample { section: Section, row: usize },
    AddNextSlice,
    AssignNewestSlice { pad: usize },
    AutoAssignSlices,
    PreviewPad { pad: usize },
    ClearSlices,
    Save,
    LoadLatest,
    DeleteLatest,
    Reset,
    Quit,
}

#[derive(Clone, Debug, Default)]
pub struct RowDisplay {
    pub name: String,
    pub sample: Option<String>, // loaded sample name
    pub steps: Vec<bool>,
    pub volume: f32,
    pub pitch: i32,
    pub swing: Option<f32>, // drums only
    pub eq: (f32, f32, f32),
    pub slice: Option<String>, // sampler pads only, label of assigned slice
}

#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    pub drums: Vec<RowDisplay>,
    pub pads: Vec<RowDisplay>,
    pub playing: bool,
    pub playhead: Option<usize>,
    pub bpm: f32,
    pub sample_bpm: Option<f32>,
    pub sampler_sample: Option<String>,
    pub sampler_duration: f64,
    pub slices: Vec<String>,
    pub loading: usize, // decode and project store jobs in flight
    pub status: String,
}
