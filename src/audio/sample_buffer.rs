use super::frame::StereoFrame;
use crate::loader::decode::SampleData;

// Engine-side copy of a decoded sample: interleaved stereo at the device rate
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // the audio data array
}

impl SampleBuffer {
    // Fold decoded channel data down to stereo and resample to the device rate
    pub fn from_sample_data(sample: &SampleData, target_rate: u32) -> Self {
        let left = sample.channels.first().map(Vec::as_slice).unwrap_or(&[]);
        let right = sample.channels.get(1).map(Vec::as_slice).unwrap_or(left); // mono, duplicate

        let mut frames: Vec<StereoFrame> = left
            .iter()
            .zip(right.iter())
            .map(|(&l, &r)| StereoFrame { left: l, right: r })
            .collect();

        if sample.sample_rate != target_rate {
            frames = resample_linear(&frames, sample.sample_rate, target_rate);
        }

        Self { data: frames }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || source_rate == 0 {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        // fractional position in the source buffer
        let src_pos = i as f64 / ratio; // ex. 3.7
        let idx = src_pos.floor() as usize; // ex. 3
        let frac = (src_pos - idx as f64) as f32; // ex. 0.7
        if idx >= frames.len().saturating_sub(1) { // edge case
            out.push(frames.last().copied().unwrap_or_default());
        } else {
            out.push(StereoFrame::lerp(frames[idx], frames[idx + 1], frac));
        }
    }
    out
}
