// The saved project document, plus the conversions between it and the live model.
// Reading is forgiving: every field may be missing, arrays may be short or hold nulls,
// and whatever is absent comes back as the default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::audio::EqSettings;
use crate::loader::SampleStore;
use crate::pipeline::slices::{Slice, SliceId, SliceManager};
use crate::pipeline::tracks::{clamp_pitch, clamp_swing, clamp_volume, StepGrid, TrackModel};
use crate::shared::{BPM_RANGE, DEFAULT_BPM, EQ_RANGE, NUM_DRUM_ROWS};

pub fn drum_key(project_id: &str, row: usize) -> String {
    format!("{project_id}:drum:{row}")
}

pub fn sampler_key(project_id: &str) -> String {
    format!("{project_id}:sampler")
}

/// One grid cell. Older saves wrote 0/1 instead of booleans; anything else reads as off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StepCell(pub bool);

impl<'de> Deserialize<'de> for StepCell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(StepCell(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
            _ => false,
        }))
    }
}

type GridDoc = Vec<Option<Vec<Option<StepCell>>>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectDoc {
    pub id: String,
    pub name: String,
    pub bpm: Option<f32>,
    pub sample_bpm: Option<f32>,
    pub created_at: Option<DateTime<Utc>>,

    pub drum_steps: GridDoc,
    pub sampler_steps: GridDoc,
    pub slices: Vec<Option<Slice>>,
    pub pad_assignments: Vec<Option<SliceId>>,

    // blob store keys; null where nothing was loaded
    pub drum_keys: Vec<Option<String>>,
    pub sampler_key: Option<String>,
    pub drum_names: Vec<Option<String>>,
    pub sampler_name: Option<String>,

    pub drum_swing: Vec<Option<f32>>,
    pub drum_volumes: Vec<Option<f32>>,
    pub drum_pitch: Vec<Option<f32>>,
    pub drum_eq: Vec<Option<EqSettings>>,
    pub sampler_volumes: Vec<Option<f32>>,
    pub sampler_pitch: Vec<Option<f32>>,
    pub sampler_eq: Vec<Option<EqSettings>>,
}

/// A document read back and fitted to the fixed model shape, ready to install.
#[derive(Clone, Debug, PartialEq)]
pub struct RestoredProject {
    pub id: String,
    pub name: String,
    pub bpm: f32,
    pub sample_bpm: Option<f32>,
    pub tracks: TrackModel,
    pub slices: Vec<Slice>,
    pub drum_keys: [Option<String>; NUM_DRUM_ROWS],
    pub sampler_key: Option<String>,
    pub drum_names: [Option<String>; NUM_DRUM_ROWS],
    pub sampler_name: Option<String>,
}

// The live session as of save time
pub struct ProjectSource<'a> {
    pub name: &'a str,
    pub bpm: f32,
    pub sample_bpm: Option<f32>,
    pub tracks: &'a TrackModel,
    pub slices: &'a SliceManager,
    pub samples: &'a SampleStore,
}

fn grid_doc(rows: Vec<Vec<bool>>) -> GridDoc {
    rows.into_iter()
        .map(|r| Some(r.into_iter().map(|c| Some(StepCell(c))).collect()))
        .collect()
}

fn grid_from_doc<const ROWS: usize>(doc: &GridDoc) -> StepGrid<ROWS> {
    let rows: Vec<Vec<bool>> = doc
        .iter()
        .map(|r| {
            r.as_deref()
                .unwrap_or_default()
                .iter()
                .map(|c| c.is_some_and(|c| c.0))
                .collect()
        })
        .collect();
    StepGrid::from_rows(&rows)
}

fn entry<T: Clone>(v: &[Option<T>], i: usize) -> Option<T> {
    v.get(i).cloned().flatten()
}

fn finite(v: Option<f32>) -> Option<f32> {
    v.filter(|x| x.is_finite())
}

impl ProjectDoc {
    pub fn capture(id: String, src: &ProjectSource<'_>) -> Self {
        let t = src.tracks;
        let drum_loaded = |row: usize| src.samples.drum(row);

        Self {
            name: src.name.to_string(),
            bpm: Some(src.bpm),
            sample_bpm: src.sample_bpm,
            created_at: Some(Utc::now()),

            drum_steps: grid_doc(t.drum_steps.to_rows()),
            sampler_steps: grid_doc(t.sampler_steps.to_rows()),
            slices: src.slices.slices().iter().cloned().map(Some).collect(),
            pad_assignments: t.pads.iter().map(|p| p.assigned_slice).collect(),

            drum_keys: (0..NUM_DRUM_ROWS)
                .map(|row| drum_loaded(row).map(|_| drum_key(&id, row)))
                .collect(),
            sampler_key: src.samples.sampler().map(|_| sampler_key(&id)),
            drum_names: (0..NUM_DRUM_ROWS)
                .map(|row| drum_loaded(row).map(|s| s.name.clone()))
                .collect(),
            sampler_name: src.samples.sampler().map(|s| s.name.clone()),

            drum_swing: t.drums.iter().map(|r| Some(r.swing)).collect(),
            drum_volumes: t.drums.iter().map(|r| Some(r.volume)).collect(),
            drum_pitch: t.drums.iter().map(|r| Some(r.pitch as f32)).collect(),
            drum_eq: t.drums.iter().map(|r| Some(r.eq)).collect(),
            sampler_volumes: t.pads.iter().map(|p| Some(p.volume)).collect(),
            sampler_pitch: t.pads.iter().map(|p| Some(p.pitch as f32)).collect(),
            sampler_eq: t.pads.iter().map(|p| Some(p.eq)).collect(),

            id,
        }
    }

    // Fit to 10 rows / 8 pads / 32 steps, default what's missing and clamp what's out of range
    pub fn restore(&self) -> RestoredProject {
        let mut tracks = TrackModel::default();
        tracks.drum_steps = grid_from_doc(&self.drum_steps);
        tracks.sampler_steps = grid_from_doc(&self.sampler_steps);

        for (i, row) in tracks.drums.iter_mut().enumerate() {
            if let Some(v) = finite(entry(&self.drum_swing, i)) {
                row.swing = clamp_swing(v);
            }
            if let Some(v) = finite(entry(&self.drum_volumes, i)) {
                row.volume = clamp_volume(v);
            }
            if let Some(v) = finite(entry(&self.drum_pitch, i)) {
                row.pitch = clamp_pitch(v);
            }
            if let Some(eq) = entry(&self.drum_eq, i) {
                row.eq = sanitize_eq(eq);
            }
        }

        for (i, pad) in tracks.pads.iter_mut().enumerate() {
            if let Some(v) = finite(entry(&self.sampler_volumes, i)) {
                pad.volume = clamp_volume(v);
            }
            if let Some(v) = finite(entry(&self.sampler_pitch, i)) {
                pad.pitch = clamp_pitch(v);
            }
            if let Some(eq) = entry(&self.sampler_eq, i) {
                pad.eq = sanitize_eq(eq);
            }
            pad.assigned_slice = entry(&self.pad_assignments, i);
        }

        let bpm = finite(self.bpm)
            .map_or(DEFAULT_BPM, |b| b.clamp(BPM_RANGE.0, BPM_RANGE.1));
        let sample_bpm = finite(self.sample_bpm).filter(|b| *b > 0.0);

        RestoredProject {
            id: self.id.clone(),
            name: self.name.clone(),
            bpm,
            sample_bpm,
            tracks,
            slices: self.slices.iter().flatten().cloned().collect(),
            drum_keys: std::array::from_fn(|i| entry(&self.drum_keys, i)),
            sampler_key: self.sampler_key.clone(),
            drum_names: std::array::from_fn(|i| entry(&self.drum_names, i)),
            sampler_name: self.sampler_name.clone(),
        }
    }

    // every blob this document points at
    pub fn blob_keys(&self) -> Vec<String> {
        self.drum_keys
            .iter()
            .flatten()
            .chain(self.sampler_key.as_ref())
            .cloned()
            .collect()
    }
}

fn sanitize_eq(eq: EqSettings) -> EqSettings {
    let fix = |v: f32| if v.is_finite() { v } else { 0.0 };
    EqSettings { low: fix(eq.low), mid: fix(eq.mid), high: fix(eq.high) }
        .clamped(EQ_RANGE.0, EQ_RANGE.1)
}

// Pads can't point at slices that didn't survive the load
pub fn drop_dangling_assignments(tracks: &mut TrackModel, slices: &SliceManager) {
    for pad in tracks.pads.iter_mut() {
        if pad.assigned_slice.is_some_and(|id| slices.get(id).is_none()) {
            pad.assigned_slice = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{EqBand, NUM_STEPS, Section};
    use crate::pipeline::tracks::{DrumParam, PadParam};

    #[test]
    fn legacy_six_row_grid_is_padded() {
        let json = r#"{
            "id": "old",
            "bpm": 98,
            "drumSteps": [
                [true, false, true], [true], [], [false, true], [true], [true]
            ]
        }"#;
        let doc: ProjectDoc = serde_json::from_str(json).unwrap();
        let p = doc.restore();
        let rows = p.tracks.drum_steps.to_rows();
        assert_eq!(rows.len(), NUM_DRUM_ROWS);
        assert!(rows.iter().all(|r| r.len() == NUM_STEPS));
        assert!(rows[0][0] && !rows[0][1] && rows[0][2]);
        for r in &rows[6..] {
            assert!(r.iter().all(|c| !c));
        }
        assert_eq!(p.bpm, 98.0);
        assert_eq!(p.sample_bpm, None);
    }

    #[test]
    fn numeric_grid_cells_read_as_steps() {
        let json = r#"{"drumSteps": [[1, 0, 1], [0, "x", 2.5]], "samplerSteps": [[{"on": true}, true]]}"#;
        let p = serde_json::from_str::<ProjectDoc>(json).unwrap().restore();
        assert!(p.tracks.drum_steps.get(0, 0));
        assert!(!p.tracks.drum_steps.get(0, 1));
        assert!(p.tracks.drum_steps.get(0, 2));
        assert!(!p.tracks.drum_steps.get(1, 1));
        assert!(p.tracks.drum_steps.get(1, 2));
        assert!(!p.tracks.sampler_steps.get(0, 0));
        assert!(p.tracks.sampler_steps.get(0, 1));
    }

    #[test]
    fn empty_document_restores_defaults() {
        let doc: ProjectDoc = serde_json::from_str("{}").unwrap();
        let p = doc.restore();
        assert_eq!(p.tracks, TrackModel::default());
        assert_eq!(p.bpm, DEFAULT_BPM);
        assert!(p.slices.is_empty());
        assert!(p.drum_keys.iter().all(Option::is_none));
        assert!(p.sampler_key.is_none());
    }

    #[test]
    fn nulls_and_out_of_range_values_are_fixed_up() {
        let json = r#"{
            "bpm": 900,
            "sampleBpm": -5,
            "drumSwing": [null, 80, -10],
            "drumVolumes": [2.0],
            "drumPitch": [null, 4.4, -30],
            "drumEq": [null, {"low": 40}, {"mid": -3}],
            "samplerVolumes": [null, 0.25],
            "samplerEq": [{"high": 6}],
            "padAssignments": [null, 3],
            "drumKeys": [null, "p:drum:1"],
            "drumSteps": [null, [null, true]]
        }"#;
        let p = serde_json::from_str::<ProjectDoc>(json).unwrap().restore();
        assert_eq!(p.bpm, 240.0);
        assert_eq!(p.sample_bpm, None);
        assert_eq!(p.tracks.drums[0].swing, 0.0);
        assert_eq!(p.tracks.drums[1].swing, 60.0);
        assert_eq!(p.tracks.drums[2].swing, -10.0);
        assert_eq!(p.tracks.drums[0].volume, 1.0);
        assert_eq!(p.tracks.drums[1].volume, 0.9);
        assert_eq!(p.tracks.drums[1].pitch, 4);
        assert_eq!(p.tracks.drums[2].pitch, -12);
        assert_eq!(p.tracks.drums[1].eq, EqSettings { low: 12.0, mid: 0.0, high: 0.0 });
        assert_eq!(p.tracks.drums[2].eq.mid, -3.0);
        assert_eq!(p.tracks.pads[1].volume, 0.25);
        assert_eq!(p.tracks.pads[0].eq.high, 6.0);
        assert_eq!(p.tracks.pads[1].assigned_slice, Some(SliceId(3)));
        assert_eq!(p.drum_keys[1].as_deref(), Some("p:drum:1"));
        assert!(p.tracks.drum_steps.get(1, 1));
        assert!(!p.tracks.drum_steps.get(0, 0));
    }

    #[test]
    fn capture_then_restore_keeps_the_model() {
        let mut tracks = TrackModel::default();
        tracks.toggle_step(Section::Drum, 9, 31);
        tracks.toggle_step(Section::Sampler, 7, 0);
        tracks.set_row_param(3, DrumParam::Swing, -25.0);
        tracks.set_row_param(3, DrumParam::Eq(EqBand::Low), 4.5);
        tracks.set_pad_param(2, PadParam::Pitch, 7.0);

        let mut slices = SliceManager::default();
        slices.replace_buffer(2.0, &mut tracks.pads);
        slices.add_slice(0.0, 0.5);
        slices.auto_assign_slices(&mut tracks.pads);

        let samples = SampleStore::default();
        let src = ProjectSource {
            name: "demo",
            bpm: 133.0,
            sample_bpm: Some(90.0),
            tracks: &tracks,
            slices: &slices,
            samples: &samples,
        };
        let doc = ProjectDoc::capture("abc".into(), &src);
        assert!(doc.blob_keys().is_empty());

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"drumSteps\""));
        assert!(json.contains("\"padAssignments\""));
        let p = serde_json::from_str::<ProjectDoc>(&json).unwrap().restore();

        assert_eq!(p.tracks, tracks);
        assert_eq!(p.slices, slices.slices());
        assert_eq!(p.bpm, 133.0);
        assert_eq!(p.sample_bpm, Some(90.0));
        assert_eq!(p.name, "demo");
    }

    #[test]
    fn dangling_assignments_are_cleared() {
        let mut tracks = TrackModel::default();
        tracks.pads[0].assigned_slice = Some(SliceId(0));
        tracks.pads[1].assigned_slice = Some(SliceId(5));
        let mut slices = SliceManager::default();
        slices.restore(1.0, vec![Slice { id: SliceId(0), start: 0.0, end: 0.5, label: "Slice 1".into() }]);
        drop_dangling_assignments(&mut tracks, &slices);
        assert_eq!(tracks.pads[0].assigned_slice, Some(SliceId(0)));
        assert_eq!(tracks.pads[1].assigned_slice, None);
    }
}
