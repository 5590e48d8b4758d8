use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};

use crate::app::{App, ChatRole, FocusPane, InputMode, PerformanceView, MONTHS};

/// Parse a line of text and convert **bold** markdown to styled spans. The
/// backend may send formatted answers; everything else (including any HTML)
/// is rendered as literal text, never interpreted.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut current_text = String::new();

    while let Some((_, c)) = chars.next() {
        if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
            // Consume the second *
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some((_, c)) = chars.next() {
                if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [chat_side, report_side] = Layout::horizontal([
        Constraint::Percentage(60),
        Constraint::Percentage(40),
    ])
    .areas(body_area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_side);

    let [months_area, report_area] = Layout::vertical([
        Constraint::Length(MONTHS.len() as u16 + 2),
        Constraint::Min(0),
    ])
    .areas(report_side);

    // Store areas for mouse hit-testing
    app.chat_area = Some(chat_area);
    app.months_area = Some(months_area);

    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_months(app, frame, months_area);
    render_report(app, frame, report_area);

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Revenue Console ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(app.backend_url().to_string(), Style::default().fg(Color::DarkGray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let chat_focused = app.focus == FocusPane::Chat;
    let border_color = if chat_focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Assistant ");

    let inner = block.inner(area);
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    let chat_text = if app.chat_messages.is_empty() && !app.chat_pending() {
        Text::from(Span::styled(
            "Ask about revenue, trends, or a company...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.chat_messages {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                    lines.push(Line::default());
                }
                ChatRole::Bot => {
                    lines.push(Line::from(Span::styled(
                        "Assistant:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                    lines.push(Line::default());
                }
            }
        }

        if app.chat_pending() {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        if app.chart_pending() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                "Fetching chart...",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else if let Some(chart) = &app.chart {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                format!(
                    "Chart saved to {} (fetched {})",
                    chart.path.display(),
                    chart.fetched_at.format("%H:%M:%S"),
                ),
                Style::default().fg(Color::Green),
            )));
            lines.push(Line::from(Span::styled(
                format!("source {}", chart.source),
                Style::default().fg(Color::DarkGray),
            )));
        }

        Text::from(lines)
    };

    let total_lines = chat_text.lines.len() as u16;

    let paragraph = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(paragraph, area);

    if total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_lines as usize).position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing {
        Color::Yellow
    } else if app.focus == FocusPane::Input {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    if editing {
        frame.set_cursor_position((area.x + app.cursor as u16 + 1, area.y + 1));
    }
}

fn render_months(app: &mut App, frame: &mut Frame, area: Rect) {
    let months_focused = app.focus == FocusPane::Months;
    let border_color = if months_focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Month ");

    let items: Vec<ListItem> = MONTHS
        .iter()
        .map(|m| ListItem::new(format!(" {} ", m)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.month_state);
}

/// Lines for the performance pane. Split out so tests can assert on the
/// rendered text without a terminal.
pub fn performance_lines(view: &PerformanceView, animation_frame: u8) -> Vec<Line<'static>> {
    match view {
        PerformanceView::Empty => vec![Line::from(Span::styled(
            "Select a month and press Enter",
            Style::default().fg(Color::DarkGray),
        ))],
        PerformanceView::Loading { month } => {
            let dots = ".".repeat((animation_frame as usize) + 1);
            vec![Line::from(Span::styled(
                format!("Fetching {}{}", month, dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ))]
        }
        PerformanceView::Error(message) => vec![Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        ))],
        PerformanceView::Results { month, rows } => {
            let mut lines = vec![
                Line::from(Span::styled(
                    format!("Results for {}", month),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )),
                Line::default(),
            ];

            for row in rows {
                let classification_color = if row.performance == "overperforming" {
                    Color::Green
                } else {
                    Color::Red
                };
                lines.push(Line::from(vec![
                    Span::styled(row.company.clone(), Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw("  "),
                    Span::styled(
                        row.performance.to_uppercase(),
                        Style::default().fg(classification_color),
                    ),
                ]));
            }

            lines
        }
    }
}

fn render_report(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Performance ");

    let lines = performance_lines(&app.performance, app.animation_frame);

    let report = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(report, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " TYPING ",
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Normal => {
            let mut hints = vec![
                Span::styled(" Tab ", key_style),
                Span::styled(" focus ", label_style),
            ];
            match app.focus {
                FocusPane::Input => hints.extend(vec![
                    Span::styled(" i/Enter ", key_style),
                    Span::styled(" type ", label_style),
                ]),
                FocusPane::Months => hints.extend(vec![
                    Span::styled(" j/k ", key_style),
                    Span::styled(" month ", label_style),
                    Span::styled(" Enter ", key_style),
                    Span::styled(" report ", label_style),
                ]),
                FocusPane::Chat => hints.extend(vec![
                    Span::styled(" j/k ", key_style),
                    Span::styled(" scroll ", label_style),
                    Span::styled(" g/G ", key_style),
                    Span::styled(" top/bottom ", label_style),
                ]),
            }
            hints.extend(vec![
                Span::styled(" r ", key_style),
                Span::styled(" report ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ]);
            hints
        }
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
