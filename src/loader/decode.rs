use std::io::Cursor;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a readable wav file: {0}")]
    Wav(#[from] hound::Error),
    #[error("audio has no frames")]
    Empty,
    #[error("unsupported wav layout: {0}")]
    Unsupported(String),
}

/// Decoded audio as the rest of the app sees it: one vec per channel, at the file's own rate.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleData {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
    pub duration_secs: f64,
}

impl SampleData {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.first().map_or(0, Vec::len);
        let duration_secs = if sample_rate == 0 { 0.0 } else { frames as f64 / sample_rate as f64 };
        Self { sample_rate, channels, duration_secs }
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

// Decode raw file bytes. Nothing is installed anywhere on failure; the caller keeps what it had.
pub fn decode(bytes: &[u8]) -> Result<SampleData, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(DecodeError::Unsupported(format!(
            "{} channels at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    // Read the samples from the WAV file
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader // float, just pass it through
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => { // int, convert to float
            if !(1..=32).contains(&spec.bits_per_sample) {
                return Err(DecodeError::Unsupported(format!("{}-bit pcm", spec.bits_per_sample)));
            }
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let n_channels = spec.channels as usize;
    let frames = samples.len() / n_channels;
    if frames == 0 {
        return Err(DecodeError::Empty);
    }

    let mut channels = vec![Vec::with_capacity(frames); n_channels];
    for frame in samples.chunks_exact(n_channels) {
        for (ch, &x) in channels.iter_mut().zip(frame) {
            ch.push(x);
        }
    }

    Ok(SampleData::new(spec.sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_fixture::{wav_bytes, wav_bytes_stereo_i16};

    #[test]
    fn decodes_float_mono() {
        let bytes = wav_bytes(22050, &[0.0, 0.5, -0.5, 1.0]);
        let data = decode(&bytes).unwrap();
        assert_eq!(data.sample_rate, 22050);
        assert_eq!(data.channels.len(), 1);
        assert_eq!(data.channels[0], vec![0.0, 0.5, -0.5, 1.0]);
        assert!((data.duration_secs - 4.0 / 22050.0).abs() < 1e-12);
    }

    #[test]
    fn decodes_int_stereo_and_deinterleaves() {
        let bytes = wav_bytes_stereo_i16(44100, &[(16384, -16384), (0, 32767)]);
        let data = decode(&bytes).unwrap();
        assert_eq!(data.channels.len(), 2);
        assert_eq!(data.frames(), 2);
        assert!((data.channels[0][0] - 0.5).abs() < 1e-4);
        assert!((data.channels[1][0] + 0.5).abs() < 1e-4);
        assert!((data.channels[1][1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode(b"definitely not audio"), Err(DecodeError::Wav(_))));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn zero_frames_is_empty() {
        let bytes = wav_bytes(44100, &[]);
        assert!(matches!(decode(&bytes), Err(DecodeError::Empty)));
    }
}
