use crate::app::App;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(3),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.area());

    render_entries(f, app, chunks[0]);
    render_status_bar(f, app, chunks[1]);
    render_help(f, chunks[2]);
}

fn render_entries(f: &mut Frame, app: &mut App, area: ratatui::layout::Rect) {
    let rows = app.rows.iter().map(|entry| {
        Row::new([
            Cell::from(entry.display_name.clone()),
            Cell::from(entry.kind.clone()),
            Cell::from(entry.class_id.clone()),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(30),
            Constraint::Length(18),
            Constraint::Length(40),
        ],
    )
    .header(
        Row::new(["Display Name", "Type", "Moniker CLSID"])
            .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Running Objects "),
    )
    .row_highlight_style(
        Style::default()
            .add_modifier(Modifier::BOLD)
            .bg(Color::Blue)
            .fg(Color::White),
    )
    .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_status_bar(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let mut spans = vec![Span::raw(format!("{} objects", app.rows.len()))];

    if let Some(refreshed) = app.last_refresh {
        spans.push(Span::raw(format!(
            " | refreshed {}",
            refreshed.format("%H:%M:%S")
        )));
    }
    spans.push(Span::raw(format!(" | every {} ms", app.interval_ms)));
    if app.paused {
        spans.push(Span::styled(
            " | PAUSED",
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(error) = &app.last_error {
        spans.push(Span::styled(
            format!(" | {error}"),
            Style::default().fg(Color::Red),
        ));
    }

    let status = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" Status "));
    f.render_widget(status, area);
}

fn render_help(f: &mut Frame, area: ratatui::layout::Rect) {
    let msg = "↑/↓: Nav | p: Pause | r: Refresh | q/Esc: Quit";
    let span = Span::styled(msg, Style::default().fg(Color::DarkGray));
    f.render_widget(Paragraph::new(span), area);
}
