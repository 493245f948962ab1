use super::eq::{EqSettings, ThreeBandEq};
use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

const MIN_RATE: f32 = 0.01;

// One playing instance of a buffer (or a slice of it) with its own filter chain.
// source -> lowshelf -> peaking -> highshelf -> gain -> mix bus
#[derive(Clone, Debug)]
pub struct Voice {
    pub pos: f64, // frames since trim_start
    pub rate: f32,
    pub gain: f32,
    pub active: bool,
    start_frame: u64,
    trim_start: usize,
    length: usize,
    eq: ThreeBandEq,
}

impl Voice {
    pub fn new(
        trim_start: usize,
        length: Option<usize>,
        start_frame: u64,
        rate: f32,
        gain: f32,
        eq: EqSettings,
        sample_rate: f32,
    ) -> Self {
        Self {
            pos: 0.0,
            rate: rate.max(MIN_RATE),
            gain,
            active: true,
            start_frame,
            trim_start,
            length: length.unwrap_or(usize::MAX),
            eq: ThreeBandEq::new(eq, sample_rate),
        }
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    // Mix this voice into `out`, whose first frame sits at `block_start` on the audio clock.
    // A voice scheduled past the end of this block stays silent and keeps waiting.
    pub fn render_into(&mut self, buffer: &SampleBuffer, out: &mut [StereoFrame], block_start: u64) {
        if !self.active {
            return;
        }
        let available = buffer.data.len().saturating_sub(self.trim_start);
        self.length = self.length.min(available);
        if self.length == 0 {
            self.active = false;
            return;
        }

        let offset = self.start_frame.saturating_sub(block_start);
        if offset >= out.len() as u64 {
            return;
        }

        let data = &buffer.data;
        for frame in out[offset as usize..].iter_mut() {
            if self.pos >= self.length as f64 {
                self.active = false;
                break;
            }

            // read sample at current position
            let i = self.pos as usize;
            let frac = (self.pos - i as f64) as f32;
            let idx = self.trim_start + i;
            let s0 = data[idx];
            // don't interpolate past the end of a slice into the next one
            let s1 = if i + 1 < self.length { data[idx + 1] } else { s0 };
            let sample = self.eq.process(StereoFrame::lerp(s0, s1, frac)).scaled(self.gain);

            frame.left += sample.left;
            frame.right += sample.right;

            self.pos += self.rate as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> SampleBuffer {
        SampleBuffer {
            data: (0..n).map(|i| StereoFrame::mono(i as f32)).collect(),
        }
    }

    fn voice(trim: usize, len: Option<usize>, start: u64, rate: f32) -> Voice {
        Voice::new(trim, len, start, rate, 1.0, EqSettings::flat(), 48000.0)
    }

    #[test]
    fn plays_whole_buffer_then_goes_idle() {
        let buf = ramp(4);
        let mut v = voice(0, None, 0, 1.0);
        let mut out = vec![StereoFrame::zero(); 6];
        v.render_into(&buf, &mut out, 0);
        let lefts: Vec<f32> = out.iter().map(|f| f.left).collect();
        assert_eq!(lefts, vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
        assert!(!v.active);
    }

    #[test]
    fn waits_for_its_start_frame() {
        let buf = ramp(8);
        let mut v = voice(0, None, 10, 1.0);
        let mut out = vec![StereoFrame::zero(); 8];
        v.render_into(&buf, &mut out, 0);
        assert!(out.iter().all(|f| f.left == 0.0));
        assert!(v.active);

        let mut out = vec![StereoFrame::zero(); 8];
        v.render_into(&buf, &mut out, 8);
        assert_eq!(out[2].left, 0.0); // first frame of the sample lands at clock frame 10
        assert_eq!(out[3].left, 1.0);
    }

    #[test]
    fn slice_range_stays_inside_its_bounds() {
        let buf = ramp(10);
        let mut v = voice(4, Some(3), 0, 1.0);
        let mut out = vec![StereoFrame::zero(); 5];
        v.render_into(&buf, &mut out, 0);
        let lefts: Vec<f32> = out.iter().map(|f| f.left).collect();
        assert_eq!(lefts, vec![4.0, 5.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn double_rate_skips_every_other_frame() {
        let buf = ramp(8);
        let mut v = voice(0, None, 0, 2.0);
        let mut out = vec![StereoFrame::zero(); 4];
        v.render_into(&buf, &mut out, 0);
        let lefts: Vec<f32> = out.iter().map(|f| f.left).collect();
        assert_eq!(lefts, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn stopped_voice_renders_nothing() {
        let buf = ramp(4);
        let mut v = voice(0, None, 0, 1.0);
        v.stop();
        v.stop(); // twice is fine
        let mut out = vec![StereoFrame::zero(); 4];
        v.render_into(&buf, &mut out, 0);
        assert!(out.iter().all(|f| f.left == 0.0));
    }
}
