use crate::shared::{DisplayState, Section, NUM_DRUM_ROWS, NUM_SAMPLER_PADS};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use super::grid::draw_step_grid;
use super::mode::TuiState;

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                           // transport
            Constraint::Length(NUM_DRUM_ROWS as u16 + 2),    // drums
            Constraint::Length(NUM_SAMPLER_PADS as u16 + 2), // sampler
            Constraint::Min(3),                              // slices + status
        ])
        .split(area);

    draw_transport(frame, sections[0], state);

    let cursor = |section: Section| (ts.section == section).then_some((ts.row, ts.col));
    draw_step_grid(frame, sections[1], "drums", &state.drums, cursor(Section::Drum), state.playhead);
    let sampler_title = match &state.sampler_sample {
        Some(name) => format!("sampler: {name} ({:.2}s)", state.sampler_duration),
        None => "sampler: (empty)".to_string(),
    };
    draw_step_grid(frame, sections[2], &sampler_title, &state.pads, cursor(Section::Sampler), state.playhead);

    draw_footer(frame, sections[3], state);
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let play = if state.playing { "▶ playing" } else { "■ stopped" };
    let sample_bpm = state
        .sample_bpm
        .map_or("-".to_string(), |b| format!("{b:.0}"));
    let mut text = format!("{play}   bpm {:.0}   sample bpm {sample_bpm}", state.bpm);
    if state.loading > 0 {
        text.push_str(&format!("   loading {}…", state.loading));
    }
    let style = if state.playing { Style::default().fg(Color::LightGreen) } else { Style::default() };
    let widget = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("loopdeck"));
    frame.render_widget(widget, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let slices = if state.slices.is_empty() {
        "no slices".to_string()
    } else {
        state.slices.join("  ")
    };
    let lines = vec![
        Line::from(slices),
        Line::styled(state.status.clone(), Style::default().fg(Color::Yellow)),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("slices")),
        area,
    );
}
