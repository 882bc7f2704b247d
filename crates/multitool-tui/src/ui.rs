use multitool_core::{ChatRole, RequestState};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, ImageField, InputMode, Tab};
use crate::input::TextInput;

/// Convert `**bold**` and `` `code` `` markdown in one line to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();

                let mut bold_text = String::new();
                let mut found_close = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'*') {
                        chars.next();
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                }
            }
            '`' => {
                let mut code_text = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '`' {
                        found_close = true;
                        break;
                    }
                    code_text.push(c);
                }

                if found_close && !code_text.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(code_text, Style::default().fg(Color::Green)));
                } else {
                    current_text.push('`');
                    current_text.push_str(&code_text);
                }
            }
            _ => current_text.push(c),
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

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.tab {
        Tab::Tasks => render_tasks(app, frame, body_area),
        Tab::Chat => render_chat(app, frame, body_area),
        Tab::Image => render_image_editor(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let [tabs_area, version_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(24)]).areas(area);

    let titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, tab)| Line::from(format!("{} {}", i + 1, tab.title())))
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Cyan).bold())
        .divider("|");

    let header = Paragraph::new("").style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
    frame.render_widget(tabs, tabs_area);

    let version = Line::from(vec![
        Span::styled(" Gemini Multi-Tool ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Black),
        ),
    ]);
    frame.render_widget(Paragraph::new(version).alignment(Alignment::Right), version_area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &'static str, label: &'static str| {
        vec![
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let pairs: Vec<(&'static str, &'static str)> = match (app.tab, app.input_mode) {
        (Tab::Tasks, InputMode::Normal) => vec![
            ("j/k", "nav"),
            ("Space", "toggle"),
            ("d", "delete"),
            ("a", "add"),
        ],
        (Tab::Chat, InputMode::Normal) => {
            vec![("i", "type"), ("j/k", "scroll"), ("M", "model")]
        }
        (Tab::Image, InputMode::Normal) => vec![
            ("j/k", "field"),
            ("i", "type"),
            ("g", "edit"),
            ("s", "save"),
        ],
        (Tab::Tasks, InputMode::Editing) => vec![("Enter", "add"), ("Esc", "stop typing")],
        (Tab::Chat, InputMode::Editing) => vec![("Enter", "send"), ("Esc", "stop typing")],
        (Tab::Image, InputMode::Editing) => {
            let enter = match app.image_field {
                ImageField::Path => "load",
                ImageField::Instruction => "edit",
            };
            vec![("Enter", enter), ("Tab", "field"), ("Esc", "stop typing")]
        }
    };

    let mut hints: Vec<Span> = pairs
        .into_iter()
        .flat_map(|(key, label)| hint(key, label))
        .collect();

    if app.input_mode == InputMode::Normal {
        hints.extend(hint("Tab", "switch"));
        hints.extend(hint("K", "API key"));
        hints.extend(hint("q", "quit"));
    }

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

/// Render a single-line input box, placing the cursor when it has focus
fn render_input(
    frame: &mut Frame,
    area: Rect,
    input: &TextInput,
    title: &str,
    focused: bool,
    editing: bool,
) {
    let border_color = if editing {
        Color::Yellow
    } else if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", title));

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let paragraph = Paragraph::new(input.visible(inner_width))
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if editing {
        let cursor_x = (input.cursor() - input.scroll_offset(inner_width)) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_tasks(app: &mut App, frame: &mut Frame, area: Rect) {
    let [list_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    let title = format!(
        " Tasks ({} of {} remaining) ",
        app.tasks.remaining(),
        app.tasks.len()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(title);

    if app.tasks.is_empty() {
        let empty = Paragraph::new(Span::styled(
            "No tasks yet. Press 'a' to add one.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(empty, list_area);
    } else {
        let items: Vec<ListItem> = app
            .tasks
            .items()
            .iter()
            .map(|task| {
                if task.completed {
                    ListItem::new(format!(" [x] {}", task.text)).style(
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::CROSSED_OUT),
                    )
                } else {
                    ListItem::new(format!(" [ ] {}", task.text))
                }
            })
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

        frame.render_stateful_widget(list, list_area, &mut app.task_state);
    }

    render_input(
        frame,
        input_area,
        &app.task_input,
        "New task",
        false,
        app.input_mode == InputMode::Editing,
    );
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    app.chat_area = Some(chat_area);
    // Inner size minus borders, used for scroll calculations
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let title = match &app.gateway_error {
        Some(_) => " Chat (no API key, press K) ".to_string(),
        None => format!(" Chat: {} ", app.config.text_model()),
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(title);

    let mut lines: Vec<Line> = Vec::new();
    for msg in app.chat.messages() {
        let color = match msg.role {
            ChatRole::User => Color::Cyan,
            ChatRole::Model => Color::Yellow,
        };
        lines.push(Line::from(Span::styled(
            App::chat_role_label(msg.role),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        match msg.role {
            ChatRole::User => {
                for line in msg.text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            ChatRole::Model => {
                for line in msg.text.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
        }
        lines.push(Line::default());
    }

    if app.chat.is_loading() {
        lines.push(Line::from(Span::styled(
            App::chat_role_label(ChatRole::Model),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let input_title = if app.chat.is_loading() {
        "Message (waiting for reply)"
    } else {
        "Message"
    };
    render_input(
        frame,
        input_area,
        &app.chat_input,
        input_title,
        false,
        app.input_mode == InputMode::Editing,
    );
}

fn render_image_editor(app: &mut App, frame: &mut Frame, area: Rect) {
    let [path_area, instruction_area, panes_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let editing = app.input_mode == InputMode::Editing;
    render_input(
        frame,
        path_area,
        &app.image_path_input,
        "Image path (PNG, JPEG, WEBP, HEIC, HEIF)",
        app.image_field == ImageField::Path,
        editing && app.image_field == ImageField::Path,
    );
    render_input(
        frame,
        instruction_area,
        &app.image_instruction_input,
        "Instruction, e.g. \"Add a retro filter\"",
        app.image_field == ImageField::Instruction,
        editing && app.image_field == ImageField::Instruction,
    );

    let [original_area, result_area] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
            .areas(panes_area);

    render_original_pane(app, frame, original_area);
    render_result_pane(app, frame, result_area);
}

fn render_original_pane(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Original ");

    let mut lines: Vec<Line> = Vec::new();
    match app.image_editor.original() {
        Some(original) => {
            lines.push(Line::from(Span::styled(
                original.file_name(),
                Style::default().fg(Color::Cyan).bold(),
            )));
            lines.push(Line::from(format!(
                "{}, {}",
                original.image.mime_type,
                format_size(original.image.byte_len())
            )));
            lines.push(Line::from(Span::styled(
                original.path.display().to_string(),
                Style::default().fg(Color::DarkGray),
            )));
        }
        None => lines.push(Line::from(Span::styled(
            "No image loaded. Type a path above and press Enter.",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    if let Some(message) = app.image_editor.message() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(note) = app.image_editor.provider_note() {
        lines.push(Line::from(Span::styled(
            format!("Gemini said: {}", note),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_result_pane(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Edited: {} ", app.config.image_model()));

    let mut lines: Vec<Line> = Vec::new();
    match (app.image_editor.request(), app.image_editor.edited()) {
        (RequestState::InFlight, _) => {
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Editing{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        (_, Some(edited)) => {
            lines.push(Line::from(Span::styled(
                "Edited image ready",
                Style::default().fg(Color::Green).bold(),
            )));
            lines.push(Line::from(format!(
                "{}, {}",
                edited.mime_type,
                format_size(edited.byte_len())
            )));
            match app.image_editor.saved_path() {
                Some(path) => lines.push(Line::from(format!("Saved to {}", path.display()))),
                None => lines.push(Line::from(Span::styled(
                    "Press 's' to save it.",
                    Style::default().fg(Color::DarkGray),
                ))),
            }
        }
        _ => lines.push(Line::from(Span::styled(
            "Your edited image will appear here.",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Centered rectangle of the given size, clamped to `area`
fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 44, app.available_models.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let current = app.config.text_model();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
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

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

/// Asterisks for all but the last four characters
fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        "*".repeat(len)
    } else {
        let masked_len = len - 4;
        let last_four: String = key.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 60, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Enter Gemini API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions =
        Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
            .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let display_text = mask_key(app.api_key_input.value());
    let cursor_x = display_text.chars().count().min(input_area.width as usize) as u16;
    frame.render_widget(
        Paragraph::new(display_text).style(Style::default().fg(Color::Cyan)),
        input_area,
    );
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let source = match app.config.api_key_source() {
        Some("env") => "current key: environment",
        Some(_) => "current key: config file",
        None => "no key configured",
    };
    let status = format!(
        "{} characters, {}",
        app.api_key_input.char_count(),
        source
    );
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::DarkGray)),
        Rect::new(inner.x, inner.y + 4, inner.width, 1),
    );
}
