use crate::shared::RowDisplay;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

const NAME_WIDTH: usize = 11;

// one line per row: name, 32 cells (beats grouped by 4), then the row's params
pub fn draw_step_grid(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    rows: &[RowDisplay],
    cursor: Option<(usize, usize)>,
    playhead: Option<usize>,
) {
    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let loaded = row.sample.is_some() || row.slice.is_some();
            let name_style = if loaded {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let mut spans = vec![Span::styled(format!("{:<w$.w$}", row.name, w = NAME_WIDTH), name_style)];

            for (c, &on) in row.steps.iter().enumerate() {
                if c % 4 == 0 {
                    spans.push(Span::raw(" "));
                }
                let mut style = match (on, playhead == Some(c)) {
                    (true, true) => Style::default().fg(Color::Black).bg(Color::LightMagenta),
                    (true, false) => Style::default().fg(Color::LightMagenta),
                    (false, true) => Style::default().fg(Color::Black).bg(Color::DarkGray),
                    (false, false) => Style::default().fg(Color::DarkGray),
                };
                if cursor == Some((r, c)) {
                    style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
                }
                spans.push(Span::styled(if on { "■" } else { "·" }, style));
            }

            spans.push(Span::styled(param_text(row), Style::default().fg(Color::Gray)));
            Line::from(spans)
        })
        .collect();

    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn param_text(row: &RowDisplay) -> String {
    let mut s = format!("  vol {:.2} pit {:+} eq {:+.0}/{:+.0}/{:+.0}", row.volume, row.pitch, row.eq.0, row.eq.1, row.eq.2);
    if let Some(swing) = row.swing {
        s.push_str(&format!(" sw {:+.0}", swing));
    }
    if let Some(name) = row.sample.as_ref().or(row.slice.as_ref()) {
        s.push_str(&format!("  [{name}]"));
    }
    s
}
