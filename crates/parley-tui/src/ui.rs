use parley_core::format::{parse_reply, Block as ReplyBlock, Inline};
use parley_core::{ChatMessage, ChatRole, PendingImage};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};
use crate::input::{ChatInput, QUICK_PROMPTS};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let attachment_height = if app.input.image().is_some() { 3 } else { 0 };

    let [header_area, chat_area, attachment_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(attachment_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if let Some(image) = app.input.image() {
        render_attachment(image, frame, attachment_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Parley ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{}: {} ", app.settings.provider.display_name(), app.settings.model),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let snapshot = app.snapshot();
    let busy = app.is_busy();

    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let lines: Vec<Line<'static>> = if snapshot.messages.is_empty() && !busy {
        welcome_lines()
    } else {
        let mut lines: Vec<Line<'static>> = snapshot.messages.iter().flat_map(message_lines).collect();
        if busy {
            lines.extend(thinking_lines(app.animation_frame));
        }
        lines
    };

    app.chat_lines = wrapped_height(&lines, app.chat_width);
    if app.follow_tail {
        app.chat_scroll = app.max_scroll();
    } else {
        app.chat_scroll = app.chat_scroll.min(app.max_scroll());
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn welcome_lines() -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            "Ask Anything...",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
    ];
    for (i, (label, _)) in QUICK_PROMPTS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!(" F{} ", i + 1), Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(format!(" {}", label)),
        ]));
    }
    lines
}

fn thinking_lines(frame: u8) -> Vec<Line<'static>> {
    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat(frame as usize + 1);
    vec![
        Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ]
}

/// One transcript entry as terminal lines, with a trailing blank line
pub fn message_lines(msg: &ChatMessage) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match msg.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            if let Some(image) = &msg.image {
                lines.push(Line::from(Span::styled(
                    image.to_string(),
                    Style::default().fg(Color::Magenta),
                )));
            }
            if let Some(text) = &msg.text {
                lines.extend(text.lines().map(|l| Line::from(l.to_string())));
            }
        }
        ChatRole::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            for block in parse_reply(msg.text()) {
                lines.extend(reply_block_lines(block));
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn reply_block_lines(block: ReplyBlock) -> Vec<Line<'static>> {
    match block {
        ReplyBlock::Heading { number, text } => vec![Line::from(Span::styled(
            format!("{} {}", number, text),
            Style::default().add_modifier(Modifier::BOLD),
        ))],
        ReplyBlock::Code { language, content } => {
            let code_style = Style::default().fg(Color::Green);
            let mut lines = vec![Line::from(Span::styled(
                format!("┌─ {} ", language.as_deref().unwrap_or("code")),
                Style::default().fg(Color::DarkGray),
            ))];
            lines.extend(content.lines().map(|l| {
                Line::from(vec![
                    Span::styled("│ ", Style::default().fg(Color::DarkGray)),
                    Span::styled(l.to_string(), code_style),
                ])
            }));
            lines.push(Line::from(Span::styled(
                "└─ Ctrl+Y to copy",
                Style::default().fg(Color::DarkGray),
            )));
            lines
        }
        ReplyBlock::Line(inlines) => {
            let mut spans = Vec::new();
            for (i, inline) in inlines.into_iter().enumerate() {
                if i > 0 {
                    spans.push(Span::raw(" "));
                }
                spans.push(inline_span(inline));
            }
            vec![Line::from(spans)]
        }
    }
}

fn inline_span(inline: Inline) -> Span<'static> {
    match inline {
        Inline::Title(text) => Span::styled(
            text,
            Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ),
        Inline::Bold(text) => Span::styled(text, Style::default().add_modifier(Modifier::BOLD)),
        Inline::Italic(text) => Span::styled(text, Style::default().add_modifier(Modifier::ITALIC)),
        Inline::Plain(text) => Span::raw(text),
    }
}

/// Rows `lines` take once wrapped at `width` (character-based estimate)
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn render_attachment(image: &PendingImage, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Attachment (Ctrl+X to remove) ");

    let line = Line::from(vec![
        Span::styled(image.preview().to_string(), Style::default().fg(Color::Magenta)),
        Span::styled(format!("  {}", image.media_type()), Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.is_busy();
    let (input, title, border_color): (&ChatInput, &str, Color) = match app.input_mode {
        InputMode::Editing => (&app.input, " Message ", Color::Yellow),
        InputMode::AttachPath => (&app.attach_input, " Attach image (path) ", Color::Magenta),
    };

    let hint_style = if app.input.can_send(busy) {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);
    if app.input_mode == InputMode::Editing {
        block = block.title_top(Line::from(Span::styled(format!(" {} ", app.input.hint(busy)), hint_style)).right_aligned());
    }

    // Horizontal scroll to keep the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input
        .text()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_width = 40.min(area.width.saturating_sub(4));
    let popup_height = (app.available_models.len() as u16 + 2).min(area.height.saturating_sub(4));
    let popup_area = Rect::new(
        area.x + area.width.saturating_sub(popup_width) / 2,
        area.y + area.height.saturating_sub(popup_height) / 2,
        popup_width,
        popup_height,
    );

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} models ", app.settings.provider.display_name()));

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.settings.model {
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

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);

    let line = if let Some(status) = &app.status {
        Line::from(Span::styled(format!(" {} ", status), Style::default().fg(Color::Yellow)))
    } else {
        let hints: &[(&str, &str)] = match app.input_mode {
            _ if app.show_model_picker => &[("↑↓", "move"), ("Enter", "select"), ("Esc", "cancel")],
            InputMode::Editing => &[
                ("Enter", "send"),
                ("^P", "model"),
                ("^O", "attach"),
                ("^X", "detach"),
                ("^Y", "copy code"),
                ("PgUp/PgDn", "scroll"),
                ("Esc", "quit"),
            ],
            InputMode::AttachPath => &[("Enter", "attach"), ("Esc", "cancel")],
        };
        let mut spans = Vec::new();
        for (key, label) in hints {
            spans.push(Span::styled(format!(" {} ", key), key_style));
            spans.push(Span::raw(format!(" {}  ", label)));
        }
        Line::from(spans)
    };

    frame.render_widget(Paragraph::new(line), area);
}
