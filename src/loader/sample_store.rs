use std::sync::Arc;

use super::decode::{decode, DecodeError, SampleData};
use crate::audio::{next_sample_id, SampleBuffer, SampleId};
use crate::shared::NUM_DRUM_ROWS;

/// Which slot a sample is headed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleTarget {
    Drum(usize),
    Sampler,
}

/// A decoded sample plus the bytes it came from. The bytes are what Save writes back out.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    pub id: SampleId,
    pub name: String,
    pub data: Arc<SampleData>,
    pub source: Arc<Vec<u8>>,
}

impl LoadedSample {
    pub fn duration(&self) -> f64 {
        self.data.duration_secs
    }
}

/// Decoded and resampled, ready to hand to the engine and install.
#[derive(Clone, Debug)]
pub struct PreparedSample {
    pub sample: LoadedSample,
    pub buffer: SampleBuffer,
}

// Decode and resample without touching any state. Safe to run on a worker thread.
pub fn prepare(name: String, bytes: Vec<u8>, target_rate: u32) -> Result<PreparedSample, DecodeError> {
    let data = decode(&bytes)?;
    let buffer = SampleBuffer::from_sample_data(&data, target_rate);
    Ok(PreparedSample {
        sample: LoadedSample {
            id: next_sample_id(),
            name,
            data: Arc::new(data),
            source: Arc::new(bytes),
        },
        buffer,
    })
}

/// One buffer per drum row and one shared sampler buffer.
#[derive(Debug, Default)]
pub struct SampleStore {
    drums: [Option<LoadedSample>; NUM_DRUM_ROWS],
    sampler: Option<LoadedSample>,
}

impl SampleStore {
    pub fn get(&self, target: SampleTarget) -> Option<&LoadedSample> {
        match target {
            SampleTarget::Drum(row) => self.drums.get(row)?.as_ref(),
            SampleTarget::Sampler => self.sampler.as_ref(),
        }
    }

    pub fn drum(&self, row: usize) -> Option<&LoadedSample> {
        self.get(SampleTarget::Drum(row))
    }

    pub fn sampler(&self) -> Option<&LoadedSample> {
        self.sampler.as_ref()
    }

    pub fn sampler_duration(&self) -> f64 {
        self.sampler.as_ref().map_or(0.0, LoadedSample::duration)
    }

    // Returns whatever was there before so the caller can release it from the engine.
    // An out-of-range row hands the sample straight back.
    pub fn install(&mut self, target: SampleTarget, sample: LoadedSample) -> Option<LoadedSample> {
        match target {
            SampleTarget::Drum(row) => match self.drums.get_mut(row) {
                Some(slot) => slot.replace(sample),
                None => Some(sample),
            },
            SampleTarget::Sampler => self.sampler.replace(sample),
        }
    }

    pub fn clear(&mut self, target: SampleTarget) -> Option<LoadedSample> {
        match target {
            SampleTarget::Drum(row) => self.drums.get_mut(row)?.take(),
            SampleTarget::Sampler => self.sampler.take(),
        }
    }

    pub fn clear_all(&mut self) -> Vec<LoadedSample> {
        self.drums
            .iter_mut()
            .filter_map(Option::take)
            .chain(self.sampler.take())
            .collect()
    }
}
