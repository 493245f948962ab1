// Step clock and per-step planning.
//
// The control loop feeds `Transport::advance` the wall time since the last frame and gets back
// the step that came due, if any. It is turned into a `StepPlan` by `plan_step` (pure, reads
// the model) and then carried out by `dispatch` against the voice graph. Voice onsets are placed
// on the audio clock relative to now. A late frame never stacks several steps onto one instant;
// the steps it missed are skipped, like a coalescing interval timer.

use tracing::{debug, warn};

use crate::audio::{VoiceGraph, VoiceKey, VoiceRequest};
use crate::audio_api::AudioOutput;
use crate::loader::SampleStore;
use crate::pipeline::slices::SliceManager;
use crate::pipeline::tracks::TrackModel;
use crate::shared::{Section, BPM_RANGE, NUM_STEPS, SAMPLER_RATE_RANGE, STEPS_PER_BEAT};

/// Seconds per step: one 16th note.
pub fn step_duration(bpm: f32) -> f64 {
    (60.0 / bpm as f64) / STEPS_PER_BEAT as f64
}

pub fn pitch_rate(semitones: i32) -> f32 {
    2f32.powf(semitones as f32 / 12.0)
}

// bpm / sample bpm, kept within an octave either way; 1.0 when the sample tempo is unknown
pub fn sampler_rate(bpm: f32, sample_bpm: Option<f32>) -> f32 {
    match sample_bpm {
        Some(sb) if sb > 0.0 && sb.is_finite() => {
            (bpm / sb).clamp(SAMPLER_RATE_RANGE.0, SAMPLER_RATE_RANGE.1)
        }
        _ => 1.0,
    }
}

// Positive swing pushes odd steps late, negative swing pushes even steps late
pub fn swing_delay(swing: f32, step: usize, step_duration: f64) -> f64 {
    let offset = (swing.abs() as f64 / 100.0) * step_duration;
    let odd = step % 2 == 1;
    if (swing >= 0.0 && odd) || (swing < 0.0 && !odd) {
        offset
    } else {
        0.0
    }
}

pub fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_finite() {
        bpm.clamp(BPM_RANGE.0, BPM_RANGE.1)
    } else {
        BPM_RANGE.0
    }
}

/// One step firing, and how many due steps were passed over to get there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepTick {
    pub step: usize,
    pub skipped: usize,
}

impl StepTick {
    // step 0 was among the skipped steps
    pub fn passed_loop_start(&self) -> bool {
        self.skipped > 0 && self.step <= self.skipped
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transport {
    bpm: f32,
    running: bool,
    next_step: usize,
    elapsed: f64, // since the last fired step
    last_fired: Option<usize>,
}

impl Transport {
    pub fn new(bpm: f32) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
            running: false,
            next_step: 0,
            elapsed: 0.0,
            last_fired: None,
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn step_duration(&self) -> f64 {
        step_duration(self.bpm)
    }

    // last step that fired, for the playhead
    pub fn playhead(&self) -> Option<usize> {
        if self.running { self.last_fired } else { None }
    }

    pub fn start(&mut self) {
        self.running = true;
        self.rewind();
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.rewind();
    }

    fn rewind(&mut self) {
        self.next_step = 0;
        self.elapsed = 0.0;
        self.last_fired = None;
    }

    // Returns true when a running transport was restarted from step 0.
    // Phase isn't carried over to the new tempo.
    pub fn set_bpm(&mut self, bpm: f32) -> bool {
        let bpm = clamp_bpm(bpm);
        if bpm == self.bpm {
            return false;
        }
        self.bpm = bpm;
        if self.running {
            self.rewind();
        }
        self.running
    }

    /// Move the clock forward. When more than one step came due only the newest fires;
    /// the rest are counted in `skipped`.
    pub fn advance(&mut self, dt: f64) -> Option<StepTick> {
        if !self.running || !dt.is_finite() || dt <= 0.0 {
            return None;
        }
        let dur = self.step_duration();
        self.elapsed += dt;
        if self.elapsed < dur {
            return None;
        }

        let due = ((self.elapsed / dur).floor() as usize).max(1);
        let skipped = due - 1;
        if skipped > 0 {
            warn!(skipped, "transport fell behind, skipping to the newest step");
        }
        self.next_step = (self.next_step + skipped) % NUM_STEPS;
        self.elapsed = (self.elapsed - due as f64 * dur).max(0.0);
        Some(StepTick { step: self.fire(), skipped })
    }

    fn fire(&mut self) -> usize {
        let step = self.next_step;
        self.last_fired = Some(step);
        self.next_step = (step + 1) % NUM_STEPS;
        step
    }
}

/// Read-only view of everything a step needs.
pub struct StepInputs<'a> {
    pub tracks: &'a TrackModel,
    pub slices: &'a SliceManager,
    pub samples: &'a SampleStore,
    pub bpm: f32,
    pub sample_bpm: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepPlan {
    pub step: usize,
    // step 0: cut every sampler voice left over from the last loop before anything new starts
    pub stop_sampler_voices: bool,
    pub triggers: Vec<VoiceRequest>,
}

pub fn plan_step(step: usize, step_duration: f64, inputs: &StepInputs<'_>) -> StepPlan {
    let t = inputs.tracks;
    let mut triggers = Vec::new();

    for (row, drum) in t.drums.iter().enumerate() {
        if !t.drum_steps.get(row, step) {
            continue;
        }
        let Some(sample) = inputs.samples.drum(row) else { continue };
        triggers.push(VoiceRequest {
            sample_id: sample.id,
            range: None,
            start_delay: swing_delay(drum.swing, step, step_duration),
            stop_previous: false,
            rate: pitch_rate(drum.pitch),
            gain: drum.volume,
            eq: drum.eq,
            track: None, // one-shot, plays out
        });
    }

    if let Some(sampler) = inputs.samples.sampler() {
        let base_rate = sampler_rate(inputs.bpm, inputs.sample_bpm);
        for (pad_idx, pad) in t.pads.iter().enumerate() {
            if !t.sampler_steps.get(pad_idx, step) {
                continue;
            }
            let Some(slice) = pad.assigned_slice.and_then(|id| inputs.slices.get(id)) else {
                continue;
            };
            triggers.push(VoiceRequest {
                sample_id: sampler.id,
                range: Some((slice.start, slice.duration())),
                start_delay: 0.0,
                stop_previous: false,
                rate: base_rate * pitch_rate(pad.pitch),
                gain: pad.volume,
                eq: pad.eq,
                track: Some(VoiceKey::Track(Section::Sampler, pad_idx)),
            });
        }
    }

    StepPlan { step, stop_sampler_voices: step == 0, triggers }
}

pub fn dispatch<O: AudioOutput>(plan: StepPlan, graph: &mut VoiceGraph<O>) {
    if plan.stop_sampler_voices {
        graph.stop_section(Section::Sampler);
    }
    let n = plan.triggers.len();
    for req in plan.triggers {
        // a pad only ever has one voice of its own
        if let Some(key) = req.track {
            graph.stop(key);
        }
        graph.play_voice(req);
    }
    if n > 0 {
        debug!(step = plan.step, voices = n, "step dispatched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::AudioCommand;
    use crate::loader::{prepare, SampleTarget};
    use crate::pipeline::test_fixture::{sine_wav, RecordingOutput};
    use crate::pipeline::tracks::{DrumParam, PadParam};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn step_is_a_sixteenth() {
        assert!(close(step_duration(120.0), 0.125));
        assert!(close(step_duration(60.0), 0.25));
    }

    #[test]
    fn pitch_rate_octaves() {
        assert_eq!(pitch_rate(0), 1.0);
        assert!((pitch_rate(12) - 2.0).abs() < 1e-6);
        assert!((pitch_rate(-12) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sampler_rate_is_clamped_ratio() {
        assert_eq!(sampler_rate(120.0, Some(120.0)), 1.0);
        assert_eq!(sampler_rate(180.0, Some(90.0)), 2.0);
        assert_eq!(sampler_rate(60.0, Some(180.0)), 0.5);
        assert_eq!(sampler_rate(100.0, Some(80.0)), 1.25);
        assert_eq!(sampler_rate(120.0, None), 1.0);
        assert_eq!(sampler_rate(120.0, Some(0.0)), 1.0);
        assert_eq!(sampler_rate(120.0, Some(-90.0)), 1.0);
    }

    #[test]
    fn swing_forty_at_120() {
        let dur = 0.125;
        for step in 0..NUM_STEPS {
            let d = swing_delay(40.0, step, dur);
            if step % 2 == 1 {
                assert!(close(d, 0.05), "step {step}: {d}");
            } else {
                assert_eq!(d, 0.0);
            }
        }
        // negative swing moves the even steps instead
        assert!(close(swing_delay(-40.0, 0, dur), 0.05));
        assert_eq!(swing_delay(-40.0, 1, dur), 0.0);
    }

    #[test]
    fn swing_delay_never_exceeds_its_share() {
        for bpm in [40.0, 97.0, 120.0, 240.0] {
            let dur = step_duration(bpm);
            let mut swing = -60.0f32;
            while swing <= 60.0 {
                for step in 0..NUM_STEPS {
                    let d = swing_delay(swing, step, dur);
                    assert!(d >= 0.0);
                    assert!(d <= (swing.abs() as f64 / 100.0) * dur + 1e-12);
                }
                swing += 2.5;
            }
        }
    }

    #[test]
    fn first_tick_comes_one_step_after_start() {
        let mut t = Transport::new(120.0);
        assert_eq!(t.advance(1.0), None); // stopped
        t.start();
        assert_eq!(t.advance(0.1), None);
        assert_eq!(t.advance(0.03), Some(StepTick { step: 0, skipped: 0 }));
        assert_eq!(t.playhead(), Some(0));
        assert_eq!(t.advance(0.125), Some(StepTick { step: 1, skipped: 0 }));
    }

    #[test]
    fn index_wraps_at_thirty_two() {
        let mut t = Transport::new(120.0);
        t.start();
        let mut fired = Vec::new();
        for _ in 0..40 {
            fired.extend(t.advance(0.125).map(|tick| tick.step));
        }
        assert_eq!(fired.len(), 40);
        assert_eq!(fired[31], 31);
        assert_eq!(fired[32], 0);
        assert_eq!(fired[39], 7);
    }

    #[test]
    fn stop_rewinds() {
        let mut t = Transport::new(120.0);
        t.start();
        t.advance(0.5);
        t.stop();
        assert!(!t.is_running());
        assert_eq!(t.playhead(), None);
        t.start();
        assert_eq!(t.advance(0.125).map(|tick| tick.step), Some(0));
    }

    #[test]
    fn tempo_change_restarts_from_zero() {
        let mut t = Transport::new(120.0);
        t.start();
        t.advance(0.6);
        assert!(t.set_bpm(60.0));
        assert_eq!(t.advance(0.2), None);
        assert_eq!(t.advance(0.06).map(|tick| tick.step), Some(0));

        // stopped: tempo just changes
        t.stop();
        assert!(!t.set_bpm(90.0));
        assert_eq!(t.bpm(), 90.0);
        assert!(!t.set_bpm(90.0));
    }

    #[test]
    fn bpm_is_clamped() {
        assert_eq!(Transport::new(10.0).bpm(), 40.0);
        assert_eq!(Transport::new(999.0).bpm(), 240.0);
        assert_eq!(clamp_bpm(f32::NAN), 40.0);
    }

    #[test]
    fn late_frame_fires_only_the_newest_step() {
        let mut t = Transport::new(120.0);
        t.start();
        t.advance(0.125);
        // three steps came due at once
        assert_eq!(t.advance(0.4), Some(StepTick { step: 3, skipped: 2 }));
        assert_eq!(t.playhead(), Some(3));
        // the leftover 0.025s still counts toward the next one
        assert_eq!(t.advance(0.11), Some(StepTick { step: 4, skipped: 0 }));
    }

    #[test]
    fn long_stall_drops_the_backlog() {
        let mut t = Transport::new(120.0);
        t.start();
        let tick = t.advance(10.0).unwrap(); // 80 steps worth
        assert_eq!(tick, StepTick { step: 79 % NUM_STEPS, skipped: 79 });
        assert!(tick.passed_loop_start());
        assert_eq!(t.advance(0.125).map(|tick| tick.step), Some(80 % NUM_STEPS));
    }

    #[test]
    fn skipping_over_step_zero_is_noticed() {
        assert!(StepTick { step: 1, skipped: 3 }.passed_loop_start()); // 30, 31, 0 skipped
        assert!(StepTick { step: 2, skipped: 2 }.passed_loop_start()); // 0, 1 skipped
        assert!(!StepTick { step: 5, skipped: 3 }.passed_loop_start());
        assert!(!StepTick { step: 0, skipped: 0 }.passed_loop_start());
    }

    struct Fixture {
        tracks: TrackModel,
        slices: SliceManager,
        samples: SampleStore,
    }

    fn fixture() -> Fixture {
        let mut tracks = TrackModel::default();
        let mut slices = SliceManager::default();
        let mut samples = SampleStore::default();
        let kick = prepare("kick".into(), sine_wav(8000, 0.05), 8000).unwrap();
        let chop = prepare("chop".into(), sine_wav(8000, 2.0), 8000).unwrap();
        samples.install(SampleTarget::Drum(0), kick.sample);
        samples.install(SampleTarget::Sampler, chop.sample);
        slices.replace_buffer(samples.sampler_duration(), &mut tracks.pads);
        slices.add_slice(0.5, 1.0);
        slices.auto_assign_slices(&mut tracks.pads);
        Fixture { tracks, slices, samples }
    }

    fn inputs<'a>(f: &'a Fixture, bpm: f32, sample_bpm: Option<f32>) -> StepInputs<'a> {
        StepInputs { tracks: &f.tracks, slices: &f.slices, samples: &f.samples, bpm, sample_bpm }
    }

    #[test]
    fn plan_applies_swing_pitch_and_volume_to_drums() {
        let mut f = fixture();
        f.tracks.toggle_step(Section::Drum, 0, 3);
        f.tracks.set_row_param(0, DrumParam::Swing, 40.0);
        f.tracks.set_row_param(0, DrumParam::Pitch, 12.0);
        f.tracks.set_row_param(0, DrumParam::Volume, 0.3);
        // row 1 is on but has nothing loaded
        f.tracks.toggle_step(Section::Drum, 1, 3);

        let plan = plan_step(3, 0.125, &inputs(&f, 120.0, None));
        assert!(!plan.stop_sampler_voices);
        assert_eq!(plan.triggers.len(), 1);
        let t = &plan.triggers[0];
        assert!(close(t.start_delay, 0.05));
        assert!((t.rate - 2.0).abs() < 1e-6);
        assert_eq!(t.gain, 0.3);
        assert_eq!(t.range, None);
        assert_eq!(t.track, None);
    }

    #[test]
    fn plan_plays_pad_slices_at_the_tempo_ratio() {
        let mut f = fixture();
        f.tracks.toggle_step(Section::Sampler, 0, 4);
        f.tracks.toggle_step(Section::Sampler, 1, 4); // pad 1 has no slice
        f.tracks.set_pad_param(0, PadParam::Pitch, -12.0);

        let plan = plan_step(4, 0.125, &inputs(&f, 180.0, Some(90.0)));
        assert_eq!(plan.triggers.len(), 1);
        let t = &plan.triggers[0];
        assert_eq!(t.range, Some((0.5, 0.5)));
        assert!((t.rate - 1.0).abs() < 1e-6); // 2.0 * 0.5
        assert_eq!(t.start_delay, 0.0);
        assert_eq!(t.track, Some(VoiceKey::Track(Section::Sampler, 0)));
    }

    #[test]
    fn pads_stay_silent_without_a_sampler_buffer() {
        let mut f = fixture();
        f.samples.clear(SampleTarget::Sampler);
        f.tracks.toggle_step(Section::Sampler, 0, 2);
        assert!(plan_step(2, 0.125, &inputs(&f, 120.0, None)).triggers.is_empty());
    }

    #[test]
    fn step_zero_cuts_old_pad_voices_before_new_triggers() {
        let mut f = fixture();
        f.tracks.toggle_step(Section::Sampler, 0, 31);
        f.tracks.toggle_step(Section::Sampler, 0, 0);
        f.tracks.toggle_step(Section::Drum, 0, 0);
        let mut graph = VoiceGraph::new(RecordingOutput::new(8000));

        dispatch(plan_step(31, 0.125, &inputs(&f, 120.0, None)), &mut graph);
        let old = graph.live_handle(VoiceKey::Track(Section::Sampler, 0)).unwrap();
        graph.output().clear();

        dispatch(plan_step(0, 0.125, &inputs(&f, 120.0, None)), &mut graph);
        let cmds = graph.output().commands();
        assert!(matches!(cmds[0], AudioCommand::Stop(h) if h == old));
        assert!(cmds[1..].iter().all(|c| matches!(c, AudioCommand::Play { .. })));
        assert_eq!(cmds.len(), 3);
        assert_ne!(graph.live_handle(VoiceKey::Track(Section::Sampler, 0)), Some(old));
    }

    #[test]
    fn retriggering_a_pad_stops_its_previous_voice() {
        let mut f = fixture();
        f.tracks.toggle_step(Section::Sampler, 0, 5);
        f.tracks.toggle_step(Section::Sampler, 0, 6);
        let mut graph = VoiceGraph::new(RecordingOutput::new(8000));

        dispatch(plan_step(5, 0.125, &inputs(&f, 120.0, None)), &mut graph);
        let first = graph.live_handle(VoiceKey::Track(Section::Sampler, 0)).unwrap();
        dispatch(plan_step(6, 0.125, &inputs(&f, 120.0, None)), &mut graph);
        assert_eq!(graph.output().stops(), vec![first]);
    }
}
