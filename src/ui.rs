use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::{app::App, clock::Clock, keymap::Button, session::bounce_intervals_ms};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
/// Most recent bounces listed under the readouts
const MAX_LISTED_BOUNCES: usize = 8;

struct Areas {
    title: Rect,
    elapsed: Rect,
    buttons: [Rect; 3],
    readouts: Rect,
    bounces: Rect,
    footer: Rect,
}

fn areas(area: Rect) -> Areas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(
            [
                Constraint::Length(1), // Title
                Constraint::Length(3), // Elapsed
                Constraint::Length(3), // Buttons
                Constraint::Length(4), // Total / interval / estimate
                Constraint::Min(0),    // Bounces
                Constraint::Length(2), // Status + help
            ]
            .as_ref(),
        )
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3].as_ref())
        .split(rows[2]);

    Areas {
        title: rows[0],
        elapsed: rows[1],
        buttons: [columns[0], columns[1], columns[2]],
        readouts: rows[3],
        bounces: rows[4],
        footer: rows[5],
    }
}

/// Screen area of each button, for mouse hit-testing
pub fn button_areas(area: Rect) -> Vec<(Button, Rect)> {
    Button::ALL
        .iter()
        .copied()
        .zip(areas(area).buttons)
        .collect()
}

fn button_style(button: Button, enabled: bool) -> Style {
    if !enabled {
        return Style::default().add_modifier(Modifier::DIM);
    }
    let color = match button {
        Button::Start => Color::Green,
        Button::Stop => Color::Red,
        Button::RecordBounce => Color::Yellow,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

impl<C: Clock> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let fields = self.fields();
        let layout = areas(area);

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let magenta_style = Style::default().fg(Color::Magenta);

        Paragraph::new(Span::styled("bounce timer", bold_style))
            .alignment(Alignment::Center)
            .render(layout.title, buf);

        let running = self.stopwatch.is_running();
        let elapsed_style = if running {
            Style::default().patch(bold_style).fg(Color::Cyan)
        } else {
            bold_style
        };
        Paragraph::new(Line::from(vec![
            Span::raw("Elapsed Time: "),
            Span::styled(fields.elapsed.clone(), elapsed_style),
            Span::raw(" seconds"),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
        .render(layout.elapsed, buf);

        for (button, rect) in Button::ALL.iter().zip(layout.buttons) {
            let enabled = button.is_enabled(&fields.controls);
            let style = button_style(*button, enabled);
            Paragraph::new(Line::from(vec![
                Span::styled(button.label(), style),
                Span::styled(format!(" ({})", button.hint()), dim_style),
            ]))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).border_style(style))
            .render(rect, buf);
        }

        let unit = self.stopwatch.total_unit();
        let total = fields
            .total
            .as_ref()
            .map(|t| format!("{} {}", t, unit.suffix()))
            .unwrap_or_else(|| "-".to_string());
        let mut readouts = vec![
            Line::from(vec![
                Span::raw("Total Time: "),
                Span::styled(total, bold_style),
            ]),
            Line::from(vec![
                Span::raw("Last Interval: "),
                Span::styled(format!("{} ms", fields.interval_ms), bold_style),
            ]),
        ];
        if let Some(cm) = self.estimate_cm() {
            readouts.push(Line::from(vec![
                Span::raw("Estimated Height: "),
                Span::styled(format!("{:.1} cm", cm), magenta_style),
            ]));
        }
        if let Some(run) = self.finished_run() {
            readouts.push(Line::from(Span::styled(
                format!(
                    "bounce-timer record --height <cm> --total-ms {} --interval-ms {} --bounce {}",
                    run.total_ms, run.interval_ms, run.bounces
                ),
                dim_style,
            )));
        }
        Paragraph::new(readouts)
            .alignment(Alignment::Center)
            .render(layout.readouts, buf);

        if let Some(session) = self.stopwatch.session() {
            let deltas = std::iter::once(None)
                .chain(bounce_intervals_ms(&session.bounces).into_iter().map(Some));
            let lines = session
                .bounces
                .iter()
                .zip(deltas)
                .enumerate()
                .map(|(idx, (at, delta))| {
                    let mut spans = vec![
                        Span::styled(format!("#{:<3}", idx + 1), dim_style),
                        Span::raw(format!("{:>8.2} s", at.as_secs_f64())),
                    ];
                    if let Some(ms) = delta {
                        spans.push(Span::styled(format!("  +{} ms", ms), dim_style));
                    }
                    Line::from(spans)
                })
                .collect::<Vec<Line>>();
            let skip = lines.len().saturating_sub(MAX_LISTED_BOUNCES);

            Paragraph::new(lines.into_iter().skip(skip).collect::<Vec<Line>>())
                .alignment(Alignment::Center)
                .block(
                    Block::default()
                        .borders(Borders::TOP)
                        .title(format!("Bounces ({})", session.bounces.len())),
                )
                .render(layout.bounces, buf);
        }

        let mut footer = Vec::new();
        if let Some(status) = &self.status {
            footer.push(Line::from(Span::styled(
                status.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            )));
        } else {
            footer.push(Line::from(""));
        }
        footer.push(Line::from(Span::styled(
            "(enter) start / (space) bounce / (esc) stop / (q) quit",
            Style::default().add_modifier(Modifier::ITALIC),
        )));
        Paragraph::new(footer)
            .alignment(Alignment::Center)
            .render(layout.footer, buf);
    }
}
