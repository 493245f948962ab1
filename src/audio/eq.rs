use serde::{Deserialize, Serialize};

use super::frame::StereoFrame;

pub const LOW_SHELF_HZ: f32 = 120.0;
pub const MID_PEAK_HZ: f32 = 1000.0;
pub const MID_PEAK_Q: f32 = 1.0;
pub const HIGH_SHELF_HZ: f32 = 8000.0;

/// Gains in dB for the three bands every voice runs through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqSettings {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl EqSettings {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.low == 0.0 && self.mid == 0.0 && self.high == 0.0
    }

    pub fn clamped(self, min: f32, max: f32) -> Self {
        Self {
            low: self.low.clamp(min, max),
            mid: self.mid.clamp(min, max),
            high: self.high.clamp(min, max),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum BiquadKind {
    LowShelf,
    Peaking { q: f32 },
    HighShelf,
}

#[derive(Clone, Copy, Debug, Default)]
struct ChannelState {
    z1: f32,
    z2: f32,
}

/// RBJ cookbook biquad, transposed direct form II, one state per channel.
#[derive(Clone, Copy, Debug)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    left: ChannelState,
    right: ChannelState,
}

impl Biquad {
    fn new(kind: BiquadKind, freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        // keep the corner below nyquist so low device rates don't blow the filter up
        let freq = freq.min(sample_rate * 0.45);
        let w0 = std::f32::consts::TAU * freq / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let a = 10.0_f32.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            BiquadKind::LowShelf => {
                // shelf slope S = 1
                let alpha = sin / 2.0 * std::f32::consts::SQRT_2;
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                    a * ((a + 1.0) - (a - 1.0) * cos - k),
                    (a + 1.0) + (a - 1.0) * cos + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                    (a + 1.0) + (a - 1.0) * cos - k,
                )
            }
            BiquadKind::HighShelf => {
                let alpha = sin / 2.0 * std::f32::consts::SQRT_2;
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                    a * ((a + 1.0) + (a - 1.0) * cos - k),
                    (a + 1.0) - (a - 1.0) * cos + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos),
                    (a + 1.0) - (a - 1.0) * cos - k,
                )
            }
            BiquadKind::Peaking { q } => {
                let alpha = sin / (2.0 * q);
                (
                    1.0 + alpha * a,
                    -2.0 * cos,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos,
                    1.0 - alpha / a,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            left: ChannelState::default(),
            right: ChannelState::default(),
        }
    }

    #[inline]
    fn run(&self, s: &mut ChannelState, x: f32) -> f32 {
        let y = self.b0 * x + s.z1;
        s.z1 = self.b1 * x - self.a1 * y + s.z2;
        s.z2 = self.b2 * x - self.a2 * y;
        y
    }

    #[inline]
    pub fn process(&mut self, frame: StereoFrame) -> StereoFrame {
        let mut left = self.left;
        let mut right = self.right;
        let out = StereoFrame {
            left: self.run(&mut left, frame.left),
            right: self.run(&mut right, frame.right),
        };
        self.left = left;
        self.right = right;
        out
    }
}

/// lowshelf -> peaking -> highshelf, built fresh for every voice.
#[derive(Clone, Debug)]
pub struct ThreeBandEq {
    // None when every band is at 0 dB; the chain is then a pass-through
    bands: Option<[Biquad; 3]>,
}

impl ThreeBandEq {
    pub fn new(settings: EqSettings, sample_rate: f32) -> Self {
        if settings.is_flat() {
            return Self { bands: None };
        }
        Self {
            bands: Some([
                Biquad::new(BiquadKind::LowShelf, LOW_SHELF_HZ, settings.low, sample_rate),
                Biquad::new(BiquadKind::Peaking { q: MID_PEAK_Q }, MID_PEAK_HZ, settings.mid, sample_rate),
                Biquad::new(BiquadKind::HighShelf, HIGH_SHELF_HZ, settings.high, sample_rate),
            ]),
        }
    }

    #[inline]
    pub fn process(&mut self, frame: StereoFrame) -> StereoFrame {
        match &mut self.bands {
            Some(bands) => bands.iter_mut().fold(frame, |f, b| b.process(f)),
            None => frame,
        }
    }
}
