use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::shared::{EqBand, InputEvent, Section};
use super::mode::TuiState;

const BPM_STEP: f32 = 1.0;
const VOLUME_STEP: f32 = 0.05;
const SWING_STEP: f32 = 5.0;
const EQ_STEP: f32 = 1.0;

// poll for input from tui, moves the cursor in tuistate,
// resolves keys to semantic input events for the middle layer to handle
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    let (section, row) = (ts.section, ts.row);
    match code {
        KeyCode::Esc => vec![InputEvent::Quit],

        // cursor
        KeyCode::Up => { ts.move_by(-1, 0); vec![] }
        KeyCode::Down => { ts.move_by(1, 0); vec![] }
        KeyCode::Left => { ts.move_by(0, -1); vec![] }
        KeyCode::Right => { ts.move_by(0, 1); vec![] }
        KeyCode::Tab => { ts.switch_section(); vec![] }

        KeyCode::Char(' ') => vec![InputEvent::ToggleStep { section, row, col: ts.col }],
        KeyCode::Enter => vec![InputEvent::TogglePlay],
        KeyCode::Char('x') => vec![InputEvent::ClearRow { section, row }],

        // tempo
        KeyCode::Char('+') | KeyCode::Char('=') => vec![InputEvent::AdjustBpm(BPM_STEP)],
        KeyCode::Char('-') => vec![InputEvent::AdjustBpm(-BPM_STEP)],
        KeyCode::Char('}') => vec![InputEvent::AdjustSampleBpm(BPM_STEP)],
        KeyCode::Char('{') => vec![InputEvent::AdjustSampleBpm(-BPM_STEP)],

        // row / pad params, lowercase = down and shifted = up
        KeyCode::Char('v') => vec![InputEvent::AdjustVolume { section, row, delta: -VOLUME_STEP }],
        KeyCode::Char('V') => vec![InputEvent::AdjustVolume { section, row, delta: VOLUME_STEP }],
        KeyCode::Char(',') => vec![InputEvent::AdjustPitch { section, row, delta: -1 }],
        KeyCode::Char('.') => vec![InputEvent::AdjustPitch { section, row, delta: 1 }],
        KeyCode::Char('w') if section == Section::Drum => vec![InputEvent::AdjustSwing { row, delta: -SWING_STEP }],
        KeyCode::Char('W') if section == Section::Drum => vec![InputEvent::AdjustSwing { row, delta: SWING_STEP }],
        KeyCode::Char(c @ ('1' | '2' | '3' | '!' | '@' | '#')) => {
            let (band, delta) = match c {
                '1' => (EqBand::Low, EQ_STEP),
                '2' => (EqBand::Mid, EQ_STEP),
                '3' => (EqBand::High, EQ_STEP),
                '!' => (EqBand::Low, -EQ_STEP),
                '@' => (EqBand::Mid, -EQ_STEP),
                _ => (EqBand::High, -EQ_STEP),
            };
            vec![InputEvent::AdjustEq { section, row, band, delta }]
        }

        // samples and slices
        KeyCode::Char('l') => vec![InputEvent::LoadNextSample { section, row }],
        KeyCode::Char('k') => vec![InputEvent::AddNextSlice],
        KeyCode::Char('a') => vec![InputEvent::AutoAssignSlices],
        KeyCode::Char('p') if section == Section::Sampler => vec![InputEvent::AssignNewestSlice { pad: row }],
        KeyCode::Char('P') if section == Section::Sampler => vec![InputEvent::PreviewPad { pad: row }],
        KeyCode::Char('X') => vec![InputEvent::ClearSlices],

        // project
        KeyCode::Char('s') => vec![InputEvent::Save],
        KeyCode::Char('o') => vec![InputEvent::LoadLatest],
        KeyCode::Char('D') => vec![InputEvent::DeleteLatest],
        KeyCode::Char('R') => vec![InputEvent::Reset],

        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_toggles_under_the_cursor() {
        let mut ts = TuiState::default();
        handle_key(KeyCode::Down, &mut ts);
        handle_key(KeyCode::Right, &mut ts);
        handle_key(KeyCode::Right, &mut ts);
        assert_eq!(
            handle_key(KeyCode::Char(' '), &mut ts),
            vec![InputEvent::ToggleStep { section: Section::Drum, row: 1, col: 2 }]
        );
    }

    #[test]
    fn pad_keys_only_work_in_the_sampler_grid() {
        let mut ts = TuiState::default();
        assert!(handle_key(KeyCode::Char('P'), &mut ts).is_empty());
        handle_key(KeyCode::Tab, &mut ts);
        assert_eq!(handle_key(KeyCode::Char('P'), &mut ts), vec![InputEvent::PreviewPad { pad: 0 }]);
        assert!(handle_key(KeyCode::Char('w'), &mut ts).is_empty());
    }

    #[test]
    fn shifted_eq_keys_cut() {
        let mut ts = TuiState::default();
        assert_eq!(
            handle_key(KeyCode::Char('@'), &mut ts),
            vec![InputEvent::AdjustEq { section: Section::Drum, row: 0, band: EqBand::Mid, delta: -1.0 }]
        );
    }
}
