use serde::{Deserialize, Serialize};

use crate::pipeline::tracks::SamplePad;
use crate::shared::{MIN_SLICE_SECONDS, NUM_SAMPLER_PADS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SliceId(pub u32);

/// A `[start, end)` range of the sampler buffer, in seconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Slice {
    pub id: SliceId,
    pub start: f64,
    pub end: f64,
    pub label: String,
}

impl Slice {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Slices of whatever is loaded into the sampler. They only make sense against that
/// one buffer, so a new buffer means starting over.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SliceManager {
    slices: Vec<Slice>,
    duration: f64,
    next_id: u32,
}

impl SliceManager {
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn get(&self, id: SliceId) -> Option<&Slice> {
        self.slices.iter().find(|s| s.id == id)
    }

    pub fn newest(&self) -> Option<&Slice> {
        self.slices.last()
    }

    // Clamp into the buffer, order the ends, and reject anything shorter than the minimum.
    pub fn add_slice(&mut self, start: f64, end: f64) -> Option<SliceId> {
        if !start.is_finite() || !end.is_finite() {
            return None;
        }
        let a = start.clamp(0.0, self.duration);
        let b = end.clamp(0.0, self.duration);
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        if end - start < MIN_SLICE_SECONDS {
            return None;
        }

        let id = SliceId(self.next_id);
        self.next_id += 1;
        let label = format!("Slice {}", self.slices.len() + 1);
        self.slices.push(Slice { id, start, end, label });
        Some(id)
    }

    // Overwrites unconditionally; None clears the pad
    pub fn assign_slice_to_pad(pads: &mut [SamplePad; NUM_SAMPLER_PADS], slice: Option<SliceId>, pad: usize) {
        if let Some(p) = pads.get_mut(pad) {
            p.assigned_slice = slice;
        }
    }

    // Pad k gets slice k. Pads past the end of the list keep what they had.
    pub fn auto_assign_slices(&self, pads: &mut [SamplePad; NUM_SAMPLER_PADS]) {
        for (pad, slice) in pads.iter_mut().zip(&self.slices) {
            pad.assigned_slice = Some(slice.id);
        }
    }

    pub fn clear(&mut self, pads: &mut [SamplePad; NUM_SAMPLER_PADS]) {
        self.slices.clear();
        self.next_id = 0;
        for p in pads.iter_mut() {
            p.assigned_slice = None;
        }
    }

    // New sampler buffer: nothing carries over
    pub fn replace_buffer(&mut self, duration: f64, pads: &mut [SamplePad; NUM_SAMPLER_PADS]) {
        self.clear(pads);
        self.duration = duration.max(0.0);
    }

    // Install slices recovered from a saved project. Entries that don't fit the buffer are dropped.
    pub fn restore(&mut self, duration: f64, slices: Vec<Slice>) {
        self.duration = duration.max(0.0);
        self.slices = slices
            .into_iter()
            .filter(|s| {
                s.start.is_finite()
                    && s.end.is_finite()
                    && s.start >= 0.0
                    && s.end <= self.duration
                    && s.end - s.start >= MIN_SLICE_SECONDS
            })
            .collect();
        self.next_id = self.slices.iter().map(|s| s.id.0 + 1).max().unwrap_or(0);
    }

    // the next eighth of the buffer after the last slice, for quick chopping from the keyboard
    pub fn next_span(&self) -> Option<(f64, f64)> {
        if self.duration <= 0.0 {
            return None;
        }
        let step = self.duration / 8.0;
        let start = self.slices.last().map_or(0.0, |s| s.end);
        if start >= self.duration {
            return None;
        }
        Some((start, (start + step).min(self.duration)))
    }
}
