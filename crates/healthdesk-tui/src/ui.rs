use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{BarChart, Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

use healthdesk_core::pharmacy::format_rupees;
use healthdesk_core::video::{jitsi_room, jitsi_url};
use healthdesk_core::DISCLAIMER;

use crate::app::{App, InputMode, PaneFocus, Screen, StatusLevel, Tab, F_VIDEO_DOCTOR};
use crate::form::Form;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        if end > 0 {
            spans.push(Span::styled(
                after[..end].to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        rest = &after[end + 2..];
    }

    // Gemini bullets come through as "* item"
    let rest = match (spans.is_empty(), rest.strip_prefix("* ")) {
        (true, Some(item)) => format!("• {}", item),
        _ => rest.to_string(),
    };
    if !rest.is_empty() {
        spans.push(Span::raw(rest));
    }
    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, status, footer, disclaimer
    let [header_area, body_area, status_area, footer_area, disclaimer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Login | Screen::Signup => render_auth(app, frame, body_area),
        Screen::Main => {
            let [tabs_area, tab_body] =
                Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(body_area);
            render_tabs(app, frame, tabs_area);
            match app.tab {
                Tab::Consult => render_consult(app, frame, tab_body),
                Tab::Imaging => render_imaging(app, frame, tab_body),
                Tab::Reports => render_reports(app, frame, tab_body),
                Tab::Appointments => render_appointments(app, frame, tab_body),
                Tab::Pharmacy => render_pharmacy(app, frame, tab_body),
                Tab::Dashboard => render_dashboard(app, frame, tab_body),
            }
        }
    }

    render_status(app, frame, status_area);
    render_footer(app, frame, footer_area);
    frame.render_widget(
        Paragraph::new(format!(" ⚠ {}", DISCLAIMER)).style(Style::default().fg(Color::Yellow)),
        disclaimer_area,
    );

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let user = match &app.session {
        Some(session) => format!(" Logged in as {} ", session.username),
        None => String::new(),
    };
    let key_state = match app.config.key_source() {
        Some(_) => Span::styled(format!(" {} ", app.selected_model), Style::default().fg(Color::Green)),
        None => Span::styled(" no API key (K) ", Style::default().fg(Color::Red)),
    };

    let title = Line::from(vec![
        Span::styled(" HealthDesk ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(user, Style::default().fg(Color::White)),
        key_state,
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let titles: Vec<String> = Tab::all()
        .iter()
        .enumerate()
        .map(|(i, tab)| format!("{} {}", i + 1, tab.title()))
        .collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL))
        .select(app.tab.index())
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let line = if let Some(task) = &app.pending {
        let dots = ".".repeat(app.animation_frame as usize + 1);
        Line::from(Span::styled(
            format!(" {}{}", task.label, dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else if let Some(status) = &app.status {
        let color = match status.level {
            StatusLevel::Info => Color::Cyan,
            StatusLevel::Success => Color::Green,
            StatusLevel::Warning => Color::Yellow,
            StatusLevel::Error => Color::Red,
        };
        Line::from(Span::styled(format!(" {}", status.text), Style::default().fg(color)))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match (app.screen, app.input_mode) {
        (Screen::Login, _) => " LOGIN ",
        (Screen::Signup, _) => " SIGN UP ",
        (Screen::Main, InputMode::Editing) => " EDIT ",
        (Screen::Main, InputMode::Normal) => " NORMAL ",
    };

    let keys: Vec<(&str, &str)> = match (app.screen, app.input_mode, app.tab) {
        (Screen::Login | Screen::Signup, _, _) => vec![
            ("Tab", "field"),
            ("Enter", "submit"),
            ("^N", if app.screen == Screen::Login { "sign up" } else { "login" }),
            ("Esc", "quit"),
        ],
        (Screen::Main, InputMode::Editing, _) => vec![
            ("↑/↓", "field"),
            ("←/→", "change"),
            ("Space", "toggle"),
            ("Enter", "submit"),
            ("Esc", "done"),
        ],
        (Screen::Main, InputMode::Normal, tab) => {
            let mut keys = match tab {
                Tab::Consult => vec![
                    ("i", "edit"),
                    ("r", "record"),
                    ("+/-", "secs"),
                    ("u", "transcribe file"),
                    ("s", "ask"),
                    ("v", "voice"),
                    ("c", "clear"),
                ],
                Tab::Imaging => vec![("i", "edit"), ("s", "analyze")],
                Tab::Reports => vec![("i", "edit"), ("s", "save"), ("Tab", "focus"), ("j/k", "nav"), ("e", "export")],
                Tab::Appointments => vec![("i", "edit"), ("s", "book")],
                Tab::Pharmacy => match app.focus {
                    PaneFocus::Records => vec![("Tab", "focus"), ("j/k", "nav"), ("e", "export"), ("d", "delete")],
                    PaneFocus::Catalog => {
                        vec![("Tab", "focus"), ("j/k", "nav"), ("+/-", "qty"), ("a", "add"), ("o", "checkout")]
                    }
                    PaneFocus::Form => vec![("i", "edit"), ("s", "suggest"), ("Tab", "focus")],
                },
                Tab::Dashboard => vec![("t", "health tip"), ("g", "refresh")],
            };
            keys.extend([("1-6", "tab"), ("M", "model"), ("K", "API key"), ("L", "logout"), ("q", "quit")]);
            keys
        }
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Draw a form; the focused field is highlighted only while it receives input.
fn render_form(frame: &mut Frame, area: Rect, form: &Form, title: &str, active: bool) {
    let border = if active { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(format!(" {} ", title));
    let inner = block.inner(area);

    let label_width = form.fields.iter().map(|f| f.label.chars().count()).max().unwrap_or(0);
    let lines: Vec<Line> = form
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let focused = active && i == form.focused;
            let label_style = if focused {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(vec![
                Span::styled(format!("{:width$}  ", field.label, width = label_width), label_style),
                Span::raw(field.display()),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);

    if active {
        if let Some(field) = form.fields.get(form.focused) {
            if field.accepts_text() && (form.focused as u16) < inner.height {
                let x = (label_width + 2 + field.display().chars().count()) as u16;
                frame.set_cursor_position((
                    inner.x + x.min(inner.width.saturating_sub(1)),
                    inner.y + form.focused as u16,
                ));
            }
        }
    }
}

fn form_height(form: &Form) -> u16 {
    form.fields.len() as u16 + 2
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(title)
}

fn list_highlight() -> Style {
    Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

fn hint_text(text: &str) -> Paragraph<'_> {
    Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray))).wrap(Wrap { trim: true })
}

fn render_auth(app: &App, frame: &mut Frame, area: Rect) {
    let width = 56.min(area.width.saturating_sub(4));
    let height = form_height(&app.auth_form) + 4;
    let popup = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height.min(area.height),
    );

    let [welcome_area, form_area, hint_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(form_height(&app.auth_form)),
        Constraint::Min(0),
    ])
    .areas(popup);

    frame.render_widget(
        Paragraph::new("Welcome to AI Healthcare Assistant").style(Style::default().fg(Color::Cyan).bold()),
        welcome_area,
    );
    let title = if app.screen == Screen::Login { "Login" } else { "Sign Up" };
    render_form(frame, form_area, &app.auth_form, title, true);
    let hint = if app.screen == Screen::Login {
        "No account yet? Press Ctrl-N to sign up."
    } else {
        "Already registered? Press Ctrl-N to log in."
    };
    frame.render_widget(hint_text(hint), hint_area);
}

fn render_consult(app: &App, frame: &mut Frame, area: Rect) {
    let [left, chat_area] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);
    let [form_area, voice_area, video_area] = Layout::vertical([
        Constraint::Length(form_height(&app.consult_form)),
        Constraint::Length(6),
        Constraint::Min(0),
    ])
    .areas(left);

    let editing = app.input_mode == InputMode::Editing;
    render_form(frame, form_area, &app.consult_form, "Ask the AI Doctor", editing);

    // Voice input state
    let mic = if app.mic_available {
        format!("Microphone ready, {} second recording (r, +/-)", app.record_seconds)
    } else {
        "Recording via microphone not available. Use an audio file.".to_string()
    };
    let mut voice_lines = vec![Line::from(mic)];
    if let Some(text) = &app.recorded_transcript {
        voice_lines.push(Line::from(vec![Span::styled("You said: ", Style::default().fg(Color::Cyan)), Span::raw(text.clone())]));
    }
    if let Some(text) = &app.uploaded_transcript {
        voice_lines.push(Line::from(vec![
            Span::styled("Transcribed file: ", Style::default().fg(Color::Cyan)),
            Span::raw(text.clone()),
        ]));
    }
    voice_lines.push(Line::from(Span::styled(
        format!("Voice replies: {}", if app.speak_answers { "on" } else { "off" }),
        Style::default().fg(Color::DarkGray),
    )));
    frame.render_widget(
        Paragraph::new(voice_lines)
            .block(Block::default().borders(Borders::ALL).title(" Voice Input "))
            .wrap(Wrap { trim: true }),
        voice_area,
    );

    // Video consultation link
    let video_text = match jitsi_room(app.consult_form.value(F_VIDEO_DOCTOR)) {
        Some(room) => Text::from(vec![
            Line::from("Join the video call in your browser:"),
            Line::from(Span::styled(jitsi_url(&room), Style::default().fg(Color::Cyan).underlined())),
        ]),
        None => Text::from(Span::styled(
            "Enter a doctor's name to get a video call link.",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(
        Paragraph::new(video_text)
            .block(Block::default().borders(Borders::ALL).title(" Video Consultation "))
            .wrap(Wrap { trim: true }),
        video_area,
    );

    // Chat history, newest last
    let mut lines: Vec<Line> = Vec::new();
    for exchange in app.visible_history() {
        lines.push(Line::from(vec![
            Span::styled("You: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw(exchange.question.clone()),
        ]));
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.extend(exchange.answer.lines().map(parse_markdown_line));
        lines.push(Line::from(Span::styled(
            format!("⚠ {}", DISCLAIMER),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::default());
    }
    let chat = if lines.is_empty() {
        Text::from(Span::styled(
            "Ask a health question by voice, audio file or text...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(lines)
    };

    // Keep the latest exchange in view
    let inner_width = chat_area.width.saturating_sub(2).max(1) as usize;
    let inner_height = chat_area.height.saturating_sub(2) as usize;
    let total: usize = chat
        .lines
        .iter()
        .map(|l| (l.width().max(1) + inner_width - 1) / inner_width)
        .sum();
    let scroll = total.saturating_sub(inner_height) as u16;

    let title = format!(" Conversation ({}, {}) ", app.selected_mode().display_name(), app.selected_model);
    frame.render_widget(
        Paragraph::new(chat)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        chat_area,
    );
}

fn render_imaging(app: &App, frame: &mut Frame, area: Rect) {
    let [form_area, result_area] =
        Layout::vertical([Constraint::Length(form_height(&app.image_form)), Constraint::Min(0)]).areas(area);
    let editing = app.input_mode == InputMode::Editing;
    render_form(frame, form_area, &app.image_form, "Upload Medical Image", editing);

    let (title, body) = match &app.image_result {
        Some((file_name, text)) => (
            format!(" Analysis of {} ", file_name),
            Text::from(text.lines().map(parse_markdown_line).collect::<Vec<_>>()),
        ),
        None => (
            " Analysis ".to_string(),
            Text::from(Span::styled(
                "Enter the path to an X-ray, scan or photo (jpg/png) and press s to analyze.",
                Style::default().fg(Color::DarkGray),
            )),
        ),
    };
    frame.render_widget(
        Paragraph::new(body)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false }),
        result_area,
    );
}

fn render_reports(app: &mut App, frame: &mut Frame, area: Rect) {
    let [left, right] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);
    let [form_area, _] =
        Layout::vertical([Constraint::Length(form_height(&app.report_form)), Constraint::Min(0)]).areas(left);
    let [list_area, detail_area] =
        Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(right);

    let editing = app.input_mode == InputMode::Editing;
    render_form(frame, form_area, &app.report_form, "Upload Report", editing);

    let items: Vec<ListItem> = app
        .reports
        .iter()
        .map(|r| ListItem::new(format!("{} ({}) - {}", r.name, r.report_type, r.date)))
        .collect();
    let focused = app.focus == PaneFocus::Records;
    let title = format!(" Your Reports ({}) ", app.reports.len());
    if items.is_empty() {
        frame.render_widget(
            hint_text("No reports uploaded yet.").block(pane_block(title, focused)),
            list_area,
        );
    } else {
        let list = List::new(items)
            .block(pane_block(title, focused))
            .highlight_style(list_highlight())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, list_area, &mut app.reports_state);
    }

    let detail = match app.reports_state.selected().and_then(|i| app.reports.get(i)) {
        Some(report) => {
            let notes = if report.notes.is_empty() { "-" } else { report.notes.as_str() };
            Text::from(vec![
                Line::from(format!("Type: {}", report.report_type)),
                Line::from(format!("Date: {}", report.date)),
                Line::from(format!("Notes: {}", notes)),
                Line::from(format!("Uploaded: {}", report.uploaded_at)),
                Line::from(Span::styled(format!("File: {}", report.file_name), Style::default().fg(Color::DarkGray))),
            ])
        }
        None => Text::default(),
    };
    frame.render_widget(
        Paragraph::new(detail)
            .block(Block::default().borders(Borders::ALL).title(" Details "))
            .wrap(Wrap { trim: true }),
        detail_area,
    );
}

fn render_appointments(app: &App, frame: &mut Frame, area: Rect) {
    let [form_area, list_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);
    let [form_area, _] =
        Layout::vertical([Constraint::Length(form_height(&app.appointment_form)), Constraint::Min(0)])
            .areas(form_area);

    let editing = app.input_mode == InputMode::Editing;
    render_form(frame, form_area, &app.appointment_form, "Book an Appointment", editing);

    let block = Block::default().borders(Borders::ALL).title(" Your Appointments ");
    if app.appointments.is_empty() {
        frame.render_widget(hint_text("No appointments found.").block(block), list_area);
        return;
    }
    let items: Vec<ListItem> = app
        .appointments
        .iter()
        .map(|a| {
            ListItem::new(vec![
                Line::from(Span::styled(a.doctor.clone(), Style::default().bold())),
                Line::from(format!("{} at {} - {}", a.date, a.time, a.status)),
            ])
        })
        .collect();
    frame.render_widget(List::new(items).block(block), list_area);
}

fn render_pharmacy(app: &mut App, frame: &mut Frame, area: Rect) {
    let [left, right] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);
    let [form_area, list_area, detail_area] = Layout::vertical([
        Constraint::Length(form_height(&app.symptom_form)),
        Constraint::Percentage(40),
        Constraint::Min(0),
    ])
    .areas(left);
    let [catalog_area, cart_area] =
        Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(right);

    let editing = app.input_mode == InputMode::Editing;
    render_form(frame, form_area, &app.symptom_form, "AI Prescription Helper (educational)", editing);

    // Saved prescriptions
    let focused = app.focus == PaneFocus::Records;
    let title = format!(" Your Prescriptions ({}) ", app.prescriptions.len());
    if app.prescriptions.is_empty() {
        frame.render_widget(hint_text("No saved prescriptions.").block(pane_block(title, focused)), list_area);
    } else {
        let items: Vec<ListItem> = app.prescriptions.iter().map(|p| ListItem::new(p.title())).collect();
        let list = List::new(items)
            .block(pane_block(title, focused))
            .highlight_style(list_highlight())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, list_area, &mut app.prescriptions_state);
    }

    let detail = app
        .selected_prescription()
        .map(|p| Text::from(p.suggestion.lines().map(parse_markdown_line).collect::<Vec<_>>()))
        .unwrap_or_default();
    frame.render_widget(
        Paragraph::new(detail)
            .block(Block::default().borders(Borders::ALL).title(" Suggestion "))
            .wrap(Wrap { trim: false }),
        detail_area,
    );

    // Catalog with pending quantities
    let items: Vec<ListItem> = app
        .catalog
        .iter()
        .zip(&app.pending_qty)
        .map(|(m, qty)| {
            ListItem::new(format!("{} {} - {}  qty ◀ {} ▶", m.name, m.dosage, format_rupees(m.price), qty))
        })
        .collect();
    let list = List::new(items)
        .block(pane_block(" Medicine Store (demo) ".to_string(), app.focus == PaneFocus::Catalog))
        .highlight_style(list_highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, catalog_area, &mut app.catalog_state);

    // Cart
    let mut lines: Vec<Line> = app
        .cart
        .lines()
        .map(|(name, line)| Line::from(format!("{} x{} = {}", name, line.qty, format_rupees(line.total))))
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled("Cart is empty.", Style::default().fg(Color::DarkGray))));
    } else {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Total: {}", format_rupees(app.cart.total())),
            Style::default().bold(),
        )));
    }
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Cart ")),
        cart_area,
    );
}

fn render_dashboard(app: &App, frame: &mut Frame, area: Rect) {
    let [stats_area, charts_area, bottom_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(8),
        Constraint::Length(9),
    ])
    .areas(area);

    // Counters
    let stat_areas: [Rect; 3] = Layout::horizontal([Constraint::Ratio(1, 3); 3]).areas(stats_area);
    let stats = [
        ("Appointments", app.stats.appointments),
        ("Reports", app.stats.reports),
        ("Prescriptions", app.stats.prescriptions),
    ];
    for ((label, count), stat_area) in stats.into_iter().zip(stat_areas) {
        frame.render_widget(
            Paragraph::new(Span::styled(count.to_string(), Style::default().fg(Color::Cyan).bold()))
                .centered()
                .block(Block::default().borders(Borders::ALL).title(format!(" {} ", label))),
            stat_area,
        );
    }

    let [bars_area, shares_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(charts_area);

    // Appointments per month
    let block = Block::default().borders(Borders::ALL).title(" Appointments per Month ");
    if app.per_month.is_empty() {
        frame.render_widget(hint_text("No appointments booked yet.").block(block), bars_area);
    } else {
        let bars: Vec<(&str, u64)> = app
            .per_month
            .iter()
            .map(|(month, count)| (month.as_str(), *count as u64))
            .collect();
        let chart = BarChart::default()
            .block(block)
            .data(bars.as_slice())
            .bar_width(7)
            .bar_gap(2)
            .bar_style(Style::default().fg(Color::Cyan))
            .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
        frame.render_widget(chart, bars_area);
    }

    // Report type distribution
    let block = Block::default().borders(Borders::ALL).title(" Reports by Type ");
    if app.distribution.is_empty() {
        frame.render_widget(hint_text("No reports uploaded yet.").block(block), shares_area);
    } else {
        let inner = block.inner(shares_area);
        frame.render_widget(block, shares_area);
        for (i, share) in app.distribution.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            let row = Rect::new(inner.x, inner.y + i as u16, inner.width, 1);
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
                .ratio((share.percent / 100.0).clamp(0.0, 1.0))
                .label(format!("{} {} ({:.0}%)", share.label, share.count, share.percent));
            frame.render_widget(gauge, row);
        }
    }

    let [activity_area, tip_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(bottom_area);

    let block = Block::default().borders(Borders::ALL).title(" Recent Activity ");
    if app.recent_activity.is_empty() {
        frame.render_widget(hint_text("No recent activity.").block(block), activity_area);
    } else {
        let items: Vec<ListItem> = app
            .recent_activity
            .iter()
            .map(|a| ListItem::new(format!("{}  {} ({})", a.date, a.doctor, a.consultation_type)))
            .collect();
        frame.render_widget(List::new(items).block(block), activity_area);
    }

    let tip = match &app.tip {
        Some(tip) => Paragraph::new(Text::from(tip.lines().map(parse_markdown_line).collect::<Vec<_>>())),
        None => hint_text("Press t for today's health tip."),
    };
    frame.render_widget(
        tip.block(Block::default().borders(Borders::ALL).title(" Daily Health Tip "))
            .wrap(Wrap { trim: true }),
        tip_area,
    );
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect::new(
        area.width.saturating_sub(width) / 2,
        area.height.saturating_sub(height) / 2,
        width,
        height,
    )
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 40, app.available_models.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(list_highlight())
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 60, 7);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Enter Gemini API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Mask the key, showing only the last 4 chars
    let len = app.api_key_input.chars().count();
    let display_text = if len <= 4 {
        "*".repeat(len)
    } else {
        let last_four: String = app.api_key_input.chars().skip(len - 4).collect();
        format!("{}...{}", "*".repeat((len - 4).min(20)), last_four)
    };
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let cursor_x = display_text.chars().count().min(input_area.width as usize) as u16;
    frame.render_widget(Paragraph::new(display_text).style(Style::default().fg(Color::Cyan)), input_area);
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(format!("{} characters", len)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_bold_spans() {
        let line = parse_markdown_line("Drink **plenty** of water");
        let parts: Vec<(&str, bool)> = line
            .spans
            .iter()
            .map(|s| (s.content.as_ref(), s.style.add_modifier.contains(Modifier::BOLD)))
            .collect();
        assert_eq!(parts, vec![("Drink ", false), ("plenty", true), (" of water", false)]);
    }

    #[test]
    fn test_markdown_unclosed_and_bullets() {
        let line = parse_markdown_line("a **b");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "a **b");

        let line = parse_markdown_line("* Rest well");
        assert_eq!(line.spans[0].content, "• Rest well");
    }

    #[test]
    fn test_centered_popup_fits() {
        let area = Rect::new(0, 0, 100, 30);
        let popup = centered_popup(area, 40, 6);
        assert_eq!(popup, Rect::new(30, 12, 40, 6));

        let tiny = centered_popup(Rect::new(0, 0, 20, 5), 40, 6);
        assert_eq!(tiny.width, 16);
        assert_eq!(tiny.height, 1);
    }
}
