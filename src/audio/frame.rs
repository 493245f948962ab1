// The smallest unit of audio; one stereo frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn mono(x: f32) -> Self {
        Self { left: x, right: x }
    }

    #[inline]
    pub fn lerp(a: StereoFrame, b: StereoFrame, t: f32) -> Self {
        Self {
            left: a.left * (1.0 - t) + b.left * t,
            right: a.right * (1.0 - t) + b.right * t,
        }
    }

    #[inline]
    pub fn scaled(self, gain: f32) -> Self {
        Self { left: self.left * gain, right: self.right * gain }
    }
}
