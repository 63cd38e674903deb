use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use gemini_chat::{ChatRole, Theme};
use crate::app::{App, InputMode};

/// Colors for one theme.
struct Palette {
    base: Style,
    muted: Color,
    bar: Color,
    user: Color,
    agent: Color,
    error: Color,
    accent: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                base: Style::default().bg(Color::Black).fg(Color::White),
                muted: Color::DarkGray,
                bar: Color::DarkGray,
                user: Color::Cyan,
                agent: Color::Yellow,
                error: Color::LightRed,
                accent: Color::LightBlue,
            },
            Theme::Light => Self {
                base: Style::default().bg(Color::White).fg(Color::Black),
                muted: Color::Gray,
                bar: Color::Gray,
                user: Color::Blue,
                agent: Color::Magenta,
                error: Color::Red,
                accent: Color::Blue,
            },
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(app.session.theme());

    frame.render_widget(Block::default().style(palette.base), area);

    // Main layout: header, body, input, footer
    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &palette, frame, header_area);

    if app.session.header_hidden() {
        render_chat(app, &palette, frame, body_area);
    } else {
        render_greeting(app, &palette, frame, body_area);
    }

    render_input(app, &palette, frame, input_area);
    render_footer(app, &palette, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, &palette, frame, area);
    } else if app.show_delete_confirm {
        render_delete_confirm(&palette, frame, area);
    }
}

fn render_header(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let model = if app.session.has_client() {
        app.config.model.clone()
    } else {
        "no API key".to_string()
    };

    let title = Line::from(vec![
        Span::styled(" Gemini Chat ", Style::default().fg(palette.accent).bold()),
        Span::styled(format!("[{}] ", model), Style::default().fg(Color::White)),
        Span::styled(
            format!("t: {} ", app.session.theme().toggle_label()),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Black),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(palette.bar));
    frame.render_widget(header, area);
}

/// Greeting and suggestion presets, shown until the first turn.
fn render_greeting(app: &mut App, palette: &Palette, frame: &mut Frame, area: Rect) {
    app.chat_area = None;

    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "Hello, there",
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "How can I help you today?",
            Style::default().fg(palette.muted).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];

    for (i, suggestion) in app.config.suggestions.iter().take(9).enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", i + 1), Style::default().bg(palette.bar).fg(Color::White)),
            Span::raw(" "),
            Span::raw(suggestion.as_str()),
        ]));
        lines.push(Line::default());
    }

    let greeting = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::NONE))
        .wrap(Wrap { trim: false });
    frame.render_widget(greeting, area);
}

fn render_chat(app: &mut App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let border_color = if app.input_mode == InputMode::Normal {
        palette.accent
    } else {
        palette.muted
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    // Store chat area for mouse hit-testing and dimensions for scroll math
    app.chat_area = Some(area);
    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);
    let resized = inner_height != app.chat_height || inner_width != app.chat_width;
    app.chat_height = inner_height;
    app.chat_width = inner_width;
    if resized {
        app.scroll_to_bottom();
    }

    let mut lines: Vec<Line> = Vec::new();
    for (idx, msg) in app.session.messages().iter().enumerate() {
        let selected = app.selected_message == Some(idx);
        let (label, color) = match msg.role {
            ChatRole::User => ("You:", palette.user),
            ChatRole::Agent => ("Gemini:", palette.agent),
        };

        let mut label_line = vec![
            Span::raw(if selected { "> " } else { "" }),
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ];
        if app.is_copied(idx) {
            label_line.push(Span::styled(" copied", Style::default().fg(Color::Green)));
        } else if selected && !msg.loading && !app.session.is_typing(idx) {
            label_line.push(Span::styled(" (c to copy)", Style::default().fg(palette.muted)));
        }
        lines.push(Line::from(label_line));

        if msg.loading {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
            )));
        } else {
            let style = if msg.error {
                Style::default().fg(palette.error)
            } else {
                Style::default()
            };
            for line in wrap_message(&msg.text, inner_width as usize) {
                lines.push(Line::from(Span::styled(line, style)));
            }
        }
        lines.push(Line::default());
    }

    // Bodies are pre-wrapped; `App::total_chat_lines` counts the same lines.
    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Wrap text to fit within a given width, returning multiple lines.
/// Breaks at word boundaries; a word wider than the pane is split across lines.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        while chars.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current_line));
                current_len = 0;
            }
            let rest = chars.split_off(width);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }

        let word_len = chars.len();
        let word: String = chars.into_iter().collect();

        if current_len == 0 {
            // First word on line
            current_line = word;
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(&word);
            current_len += 1 + word_len;
        } else {
            // Word doesn't fit, start new line
            lines.push(std::mem::replace(&mut current_line, word));
            current_len = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Lines a message body takes up in a chat pane `width` columns wide.
/// Hard line breaks in the text are kept.
pub fn wrap_message(text: &str, width: usize) -> Vec<String> {
    text.split('\n')
        .flat_map(|line| wrap_text_to_width(line, width))
        .collect()
}

fn render_input(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { palette.muted };
    let title = if app.session.is_busy() {
        " Enter a prompt here (waiting for reply) "
    } else {
        " Enter a prompt here "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(palette.user))
        .block(input_block);
    frame.render_widget(input, area);

    // Show cursor when editing with no popup on top
    if editing && !app.show_api_key_input && !app.show_delete_confirm {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both themes
    let key_style = Style::default().bg(palette.bar).fg(Color::White);
    let label_style = palette.base;

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];

    if let Some(status) = &app.status {
        spans.push(Span::styled(format!(" {} ", status), Style::default().fg(palette.accent)));
    } else {
        let hints: &[(&str, &str)] = match app.input_mode {
            InputMode::Editing => &[("Enter", "send"), ("Esc", "normal mode"), ("Ctrl-C", "quit")],
            InputMode::Normal if !app.session.header_hidden() => &[
                ("1-4", "suggestion"),
                ("i", "type"),
                ("t", "theme"),
                ("K", "API key"),
                ("q", "quit"),
            ],
            InputMode::Normal => &[
                ("j/k", "select"),
                ("c", "copy"),
                ("t", "theme"),
                ("D", "delete all"),
                ("i", "type"),
                ("q", "quit"),
            ],
        };
        for (key, label) in hints {
            spans.push(Span::styled(format!(" {} ", key), key_style));
            spans.push(Span::styled(format!(" {} ", label), label_style));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).style(palette.base), area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_delete_confirm(palette: &Palette, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 52, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.error))
        .title(" Delete chats ")
        .style(palette.base);

    let text = Text::from(vec![
        Line::from("Are you sure you want to delete all messages?"),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(palette.error).fg(Color::White)),
            Span::raw(" delete   "),
            Span::styled(" n ", Style::default().bg(palette.bar).fg(Color::White)),
            Span::raw(" cancel"),
        ]),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), popup_area);
}

fn render_api_key_input(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 60, 6);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Gemini API key (Enter to save, Esc to skip) ")
        .style(palette.base);

    // Mask everything but the last four characters
    let count = app.api_key_input.chars().count();
    let masked: String = app
        .api_key_input
        .chars()
        .enumerate()
        .map(|(i, c)| if i + 4 < count { '*' } else { c })
        .collect();

    let text = Text::from(vec![
        Line::from(Span::styled(
            "Get a key at https://aistudio.google.com/app/apikey",
            Style::default().fg(palette.muted),
        )),
        Line::default(),
        Line::from(Span::styled(masked, Style::default().fg(palette.user))),
    ]);
    frame.render_widget(Paragraph::new(text).block(block), popup_area);

    let inner_width = popup_area.width.saturating_sub(2);
    let cursor_x = (app.api_key_input_cursor as u16).min(inner_width.saturating_sub(1));
    frame.set_cursor_position((popup_area.x + 1 + cursor_x, popup_area.y + 3));
}
