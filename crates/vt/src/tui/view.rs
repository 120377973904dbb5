use crate::tui::app::{Monitor, Phase, TargetRow, ToastKind};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const INFO_HEIGHT: u16 = 9;

pub fn draw_ui(frame: &mut Frame, monitor: &Monitor) {
    let info_height = if monitor.show_info { INFO_HEIGHT } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(info_height),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, chunks[0], monitor);
    draw_content(frame, chunks[1], monitor);
    if monitor.show_info {
        draw_info(frame, chunks[2], monitor);
    }
    draw_status_line(frame, chunks[3], monitor);
    draw_footer(frame, chunks[4]);

    if monitor.show_help {
        draw_help(frame, centered_rect(60, 60, frame.area()));
    }
}

fn spinner(monitor: &Monitor) -> &'static str {
    SPINNER[monitor.spinner % SPINNER.len()]
}

fn draw_header(frame: &mut Frame, area: Rect, monitor: &Monitor) {
    let mode = if monitor.watch { "watch" } else { "one-shot" };
    let updated = monitor
        .last_updated
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "Status Monitor",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  [{}]  最終更新: {}", mode, updated),
            Style::default().fg(Color::Gray),
        ),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, area);
}

fn draw_content(frame: &mut Frame, area: Rect, monitor: &Monitor) {
    if monitor.rows.is_empty() {
        let text = if monitor.phase == Phase::Loading {
            vec![Line::from(format!("{} 状態を取得中...", spinner(monitor)))]
        } else {
            vec![
                Line::from(Span::styled(
                    "No vulnerable targets",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "vt start --id <template-id> --provider docker-compose",
                    Style::default().fg(Color::Yellow),
                )),
            ]
        };
        let paragraph = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec!["Template", "Name", "Prov", "Status", "Ctr", "Ports"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = monitor
        .rows
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.template_id.clone()),
                Cell::from(row.template_name.clone()),
                Cell::from(row.provider_short().to_string()),
                Cell::from(row.status_label()).style(status_style(row)),
                Cell::from(row.containers.to_string()),
                Cell::from(row.ports.join(", ")),
            ])
        })
        .collect();

    let title = if monitor.phase == Phase::Loading {
        format!(" Targets {} ", spinner(monitor))
    } else {
        " Targets ".to_string()
    };

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(20),
            Constraint::Percentage(25),
            Constraint::Length(6),
            Constraint::Length(20),
            Constraint::Length(4),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title))
    .row_highlight_style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▶ ");

    let mut state = TableState::default().with_selected(Some(monitor.selected));
    frame.render_stateful_widget(table, area, &mut state);
}

fn status_style(row: &TargetRow) -> Style {
    if row.error.is_some() {
        return Style::default().fg(Color::Yellow);
    }
    match row.status_label().as_str() {
        "Running (healthy)" | "Running" => Style::default().fg(Color::Green),
        "Stopped" => Style::default().fg(Color::Gray),
        _ => Style::default().fg(Color::Red),
    }
}

fn draw_info(frame: &mut Frame, area: Rect, monitor: &Monitor) {
    let Some(row) = monitor.selected_row() else {
        return;
    };

    let label = Style::default().add_modifier(Modifier::BOLD);
    let mut text = vec![
        Line::from(vec![
            Span::styled("Template: ", label),
            Span::raw(format!("{} ({})", row.template_name, row.template_id)),
        ]),
        Line::from(vec![
            Span::styled("Author: ", label),
            Span::raw(row.author.clone()),
        ]),
        Line::from(vec![
            Span::styled("Provider: ", label),
            Span::raw(row.provider.clone()),
        ]),
        Line::from(vec![
            Span::styled("Status: ", label),
            Span::styled(row.status_label(), status_style(row)),
        ]),
    ];

    if row.is_running() {
        let endpoints = row.endpoints();
        if !endpoints.is_empty() {
            text.push(Line::from(vec![
                Span::styled("Endpoints: ", label),
                Span::styled(endpoints.join(", "), Style::default().fg(Color::Cyan)),
            ]));
        }
    }
    if let Some(error) = &row.error {
        text.push(Line::from(vec![
            Span::styled("Error: ", label),
            Span::styled(error.clone(), Style::default().fg(Color::Red)),
        ]));
    }
    text.push(Line::from(vec![
        Span::styled("Tech: ", label),
        Span::raw(row.technologies.join(", ")),
    ]));
    text.push(Line::from(vec![
        Span::styled("Tags: ", label),
        Span::raw(row.tags.join(", ")),
    ]));

    let paragraph =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" Info "));
    frame.render_widget(paragraph, area);
}

fn draw_status_line(frame: &mut Frame, area: Rect, monitor: &Monitor) {
    let line = if let Some(toast) = &monitor.toast {
        let color = match toast.kind {
            ToastKind::Info => Color::Blue,
            ToastKind::Success => Color::Green,
            ToastKind::Error => Color::Red,
        };
        Line::from(Span::styled(toast.text.clone(), Style::default().fg(color)))
    } else if let Some(pending) = &monitor.pending {
        Line::from(format!("{} {}", spinner(monitor), pending))
    } else if let Some(error) = &monitor.last_error {
        Line::from(Span::styled(
            format!("最後のエラー: {}", error),
            Style::default().fg(Color::Red).add_modifier(Modifier::DIM),
        ))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_footer(frame: &mut Frame, area: Rect) {
    let footer = Paragraph::new(
        "enter=toggle a=start s=stop r=restart i=info ctrl+r=refresh ?=help q=quit",
    )
    .style(Style::default().fg(Color::Gray))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let keys = [
        ("↑/k ↓/j", "選択を移動"),
        ("enter / space", "起動中なら停止、それ以外は起動"),
        ("a", "起動"),
        ("s", "停止"),
        ("r", "再起動（停止してから起動）"),
        ("i", "詳細パネルの表示切り替え"),
        ("ctrl+r", "状態を再取得"),
        ("?", "ヘルプの表示切り替え"),
        ("q / esc / ctrl+c", "終了"),
    ];

    let text: Vec<Line> = keys
        .iter()
        .map(|(key, desc)| {
            Line::from(vec![
                Span::styled(
                    format!("{:<18}", key),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(*desc),
            ])
        })
        .collect();

    let paragraph =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" Help "));
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::app::Msg;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use vt_config::MonitorSettings;

    fn render(monitor: &Monitor) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw_ui(f, monitor)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_empty_state_shows_hint() {
        let mut monitor = Monitor::new(false, &MonitorSettings::default());
        monitor.init();
        monitor.update(Msg::Snapshot(Vec::new()));

        let screen = render(&monitor);
        assert!(screen.contains("No vulnerable targets"));
        assert!(screen.contains("--provider docker-compose"));
    }

    #[test]
    fn test_help_overlay() {
        let mut monitor = Monitor::new(true, &MonitorSettings::default());
        monitor.show_help = true;

        let screen = render(&monitor);
        assert!(screen.contains("Help"));
        assert!(screen.contains("watch"));
    }
}
