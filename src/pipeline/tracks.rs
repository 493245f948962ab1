// The sequencer's model: fixed drum rows and sampler pads, each set with its own step grid.
// Grids sit apart from the row/pad params; the ROWS const generic keeps them index-aligned.

use crate::audio::EqSettings;
use crate::pipeline::slices::SliceId;
use crate::shared::{
    EqBand, Section, DEFAULT_VOLUME, DRUM_ROW_NAMES, EQ_RANGE, NUM_DRUM_ROWS, NUM_SAMPLER_PADS,
    NUM_STEPS, PITCH_RANGE, SWING_RANGE, VOLUME_RANGE,
};

#[derive(Clone, Debug, PartialEq)]
pub struct StepGrid<const ROWS: usize> {
    cells: [[bool; NUM_STEPS]; ROWS],
}

impl<const ROWS: usize> Default for StepGrid<ROWS> {
    fn default() -> Self {
        Self { cells: [[false; NUM_STEPS]; ROWS] }
    }
}

impl<const ROWS: usize> StepGrid<ROWS> {
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells.get(row).and_then(|r| r.get(col)).copied().unwrap_or(false)
    }

    pub fn set(&mut self, row: usize, col: usize, on: bool) {
        if let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = on;
        }
    }

    // flips exactly one cell; returns the new value (None when out of range)
    pub fn toggle(&mut self, row: usize, col: usize) -> Option<bool> {
        let cell = self.cells.get_mut(row)?.get_mut(col)?;
        *cell = !*cell;
        Some(*cell)
    }

    pub fn row(&self, row: usize) -> &[bool] {
        self.cells.get(row).map_or(&[], |r| r.as_slice())
    }

    pub fn clear_row(&mut self, row: usize) {
        if let Some(r) = self.cells.get_mut(row) {
            *r = [false; NUM_STEPS];
        }
    }

    // Build from stored rows of any shape: missing rows/cells are off, extras are dropped
    pub fn from_rows(rows: &[Vec<bool>]) -> Self {
        let mut grid = Self::default();
        for (r, stored) in rows.iter().take(ROWS).enumerate() {
            for (c, &on) in stored.iter().take(NUM_STEPS).enumerate() {
                grid.cells[r][c] = on;
            }
        }
        grid
    }

    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        self.cells.iter().map(|r| r.to_vec()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrumParam {
    Swing,
    Volume,
    Pitch,
    Eq(EqBand),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadParam {
    Volume,
    Pitch,
    Eq(EqBand),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrumRow {
    pub name: &'static str,
    pub swing: f32,
    pub volume: f32,
    pub pitch: i32, // semitones
    pub eq: EqSettings,
}

impl DrumRow {
    pub fn new(index: usize) -> Self {
        Self {
            name: DRUM_ROW_NAMES.get(index).copied().unwrap_or("Drum"),
            swing: 0.0,
            volume: DEFAULT_VOLUME,
            pitch: 0,
            eq: EqSettings::flat(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SamplePad {
    pub volume: f32,
    pub pitch: i32,
    pub eq: EqSettings,
    pub assigned_slice: Option<SliceId>,
}

impl Default for SamplePad {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            pitch: 0,
            eq: EqSettings::flat(),
            assigned_slice: None,
        }
    }
}

pub fn clamp_swing(v: f32) -> f32 {
    v.clamp(SWING_RANGE.0, SWING_RANGE.1)
}

pub fn clamp_volume(v: f32) -> f32 {
    v.clamp(VOLUME_RANGE.0, VOLUME_RANGE.1)
}

// pitch is whole semitones; fractional input is rounded first
pub fn clamp_pitch(v: f32) -> i32 {
    (v.round() as i32).clamp(PITCH_RANGE.0, PITCH_RANGE.1)
}

pub fn clamp_eq(v: f32) -> f32 {
    v.clamp(EQ_RANGE.0, EQ_RANGE.1)
}

fn set_band(eq: &mut EqSettings, band: EqBand, value: f32) {
    let v = clamp_eq(value);
    match band {
        EqBand::Low => eq.low = v,
        EqBand::Mid => eq.mid = v,
        EqBand::High => eq.high = v,
    }
}

pub fn band(eq: &EqSettings, band: EqBand) -> f32 {
    match band {
        EqBand::Low => eq.low,
        EqBand::Mid => eq.mid,
        EqBand::High => eq.high,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackModel {
    pub drums: [DrumRow; NUM_DRUM_ROWS],
    pub drum_steps: StepGrid<NUM_DRUM_ROWS>,
    pub pads: [SamplePad; NUM_SAMPLER_PADS],
    pub sampler_steps: StepGrid<NUM_SAMPLER_PADS>,
}

impl Default for TrackModel {
    fn default() -> Self {
        Self {
            drums: std::array::from_fn(DrumRow::new),
            drum_steps: StepGrid::default(),
            pads: std::array::from_fn(|_| SamplePad::default()),
            sampler_steps: StepGrid::default(),
        }
    }
}

impl TrackModel {
    pub fn toggle_step(&mut self, section: Section, row: usize, col: usize) -> Option<bool> {
        match section {
            Section::Drum => self.drum_steps.toggle(row, col),
            Section::Sampler => self.sampler_steps.toggle(row, col),
        }
    }

    pub fn step(&self, section: Section, row: usize, col: usize) -> bool {
        match section {
            Section::Drum => self.drum_steps.get(row, col),
            Section::Sampler => self.sampler_steps.get(row, col),
        }
    }

    pub fn clear_row(&mut self, section: Section, row: usize) {
        match section {
            Section::Drum => self.drum_steps.clear_row(row),
            Section::Sampler => self.sampler_steps.clear_row(row),
        }
    }

    // Out-of-range rows are ignored
    pub fn set_row_param(&mut self, row: usize, param: DrumParam, value: f32) {
        let Some(r) = self.drums.get_mut(row) else { return };
        match param {
            DrumParam::Swing => r.swing = clamp_swing(value),
            DrumParam::Volume => r.volume = clamp_volume(value),
            DrumParam::Pitch => r.pitch = clamp_pitch(value),
            DrumParam::Eq(b) => set_band(&mut r.eq, b, value),
        }
    }

    pub fn set_pad_param(&mut self, pad: usize, param: PadParam, value: f32) {
        let Some(p) = self.pads.get_mut(pad) else { return };
        match param {
            PadParam::Volume => p.volume = clamp_volume(value),
            PadParam::Pitch => p.pitch = clamp_pitch(value),
            PadParam::Eq(b) => set_band(&mut p.eq, b, value),
        }
    }

    pub fn clear_pad_assignments(&mut self) {
        for p in self.pads.iter_mut() {
            p.assigned_slice = None;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let m = TrackModel::default();
        assert_eq!(m.drums.len(), NUM_DRUM_ROWS);
        assert_eq!(m.pads.len(), NUM_SAMPLER_PADS);
        for r in &m.drums {
            assert_eq!(r.volume, 0.9);
            assert_eq!(r.pitch, 0);
            assert_eq!(r.swing, 0.0);
            assert!(r.eq.is_flat());
        }
        assert_eq!(m.drums[0].name, "Kick");
        assert!(m.pads.iter().all(|p| p.assigned_slice.is_none() && p.volume == 0.9));
        assert!(m.drum_steps.to_rows().iter().flatten().all(|on| !on));
    }

    #[test]
    fn toggle_twice_restores_every_cell() {
        let mut m = TrackModel::default();
        m.toggle_step(Section::Drum, 4, 7);
        for section in [Section::Drum, Section::Sampler] {
            for row in 0..section.rows() {
                for col in 0..NUM_STEPS {
                    let before = m.step(section, row, col);
                    m.toggle_step(section, row, col);
                    assert_ne!(m.step(section, row, col), before);
                    m.toggle_step(section, row, col);
                    assert_eq!(m.step(section, row, col), before);
                }
            }
        }
    }

    #[test]
    fn toggle_flips_exactly_one_cell() {
        let mut m = TrackModel::default();
        assert_eq!(m.toggle_step(Section::Sampler, 2, 31), Some(true));
        let on: usize = m.sampler_steps.to_rows().iter().flatten().filter(|c| **c).count();
        assert_eq!(on, 1);
        assert!(m.drum_steps.to_rows().iter().flatten().all(|c| !c));
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut m = TrackModel::default();
        assert_eq!(m.toggle_step(Section::Sampler, 8, 0), None);
        assert_eq!(m.toggle_step(Section::Drum, 0, 32), None);
        m.set_row_param(10, DrumParam::Volume, 0.1);
        m.set_pad_param(8, PadParam::Volume, 0.1);
        assert_eq!(m, TrackModel::default());
    }

    #[test]
    fn params_are_clamped() {
        let mut m = TrackModel::default();
        m.set_row_param(0, DrumParam::Swing, 99.0);
        m.set_row_param(1, DrumParam::Swing, -99.0);
        m.set_row_param(0, DrumParam::Volume, 1.5);
        m.set_row_param(0, DrumParam::Pitch, 13.7);
        m.set_row_param(1, DrumParam::Pitch, 2.6);
        m.set_row_param(0, DrumParam::Eq(EqBand::High), -40.0);
        m.set_pad_param(3, PadParam::Volume, -1.0);
        m.set_pad_param(3, PadParam::Pitch, -20.0);
        m.set_pad_param(3, PadParam::Eq(EqBand::Mid), 5.5);

        assert_eq!(m.drums[0].swing, 60.0);
        assert_eq!(m.drums[1].swing, -60.0);
        assert_eq!(m.drums[0].volume, 1.0);
        assert_eq!(m.drums[0].pitch, 12);
        assert_eq!(m.drums[1].pitch, 3);
        assert_eq!(m.drums[0].eq.high, -12.0);
        assert_eq!(m.pads[3].volume, 0.0);
        assert_eq!(m.pads[3].pitch, -12);
        assert_eq!(m.pads[3].eq.mid, 5.5);
    }

    #[test]
    fn grid_from_short_rows_fills_with_off() {
        let stored: Vec<Vec<bool>> = (0..6).map(|_| vec![true; 16]).collect();
        let grid = StepGrid::<NUM_DRUM_ROWS>::from_rows(&stored);
        let rows = grid.to_rows();
        assert_eq!(rows.len(), NUM_DRUM_ROWS);
        assert!(rows.iter().all(|r| r.len() == NUM_STEPS));
        assert!(rows[0][..16].iter().all(|c| *c));
        assert!(rows[0][16..].iter().all(|c| !c));
        for r in &rows[6..] {
            assert!(r.iter().all(|c| !c));
        }
    }

    #[test]
    fn reset_restores_defaults() {
        let mut m = TrackModel::default();
        m.toggle_step(Section::Drum, 0, 0);
        m.set_row_param(2, DrumParam::Swing, 30.0);
        m.pads[1].assigned_slice = Some(SliceId(4));
        m.reset();
        assert_eq!(m, TrackModel::default());
    }
}
