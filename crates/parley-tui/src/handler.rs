use std::io::{self, Write};
use std::process::{Command, Stdio};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::debug;

use crate::app::{App, InputMode};
use crate::input::ChatInput;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize => app.follow_tail = true,
        AppEvent::Tick => app.tick_animation(),
    }
    app.poll_send_task().await;
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // A status message lasts until the next key
    app.status = None;

    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    if app.input_mode == InputMode::Editing
        && key.code == KeyCode::Char('p')
        && key.modifiers.contains(KeyModifiers::CONTROL)
    {
        app.open_model_picker().await;
        return;
    }

    match app.input_mode {
        InputMode::Editing => handle_editing(app, key),
        InputMode::AttachPath => handle_attach_path(app, key),
    }
}

fn handle_editing(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('o') => app.input_mode = InputMode::AttachPath,
            KeyCode::Char('x') => app.remove_attachment(),
            KeyCode::Char('y') => copy_last_code_block(app),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => {
            app.submit();
        }
        KeyCode::F(n @ 1..=5) => app.apply_quick_prompt(usize::from(n - 1)),

        // Transcript scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(app.page_size()),
        KeyCode::PageDown => app.scroll_down(app.page_size()),

        _ => edit_line(&mut app.input, key.code),
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn handle_attach_path(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.attach_input.take();
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Enter => app.attach_from_prompt(),
        code => edit_line(&mut app.attach_input, code),
    }
}

/// Cursor editing shared by the message box and the path prompt
fn edit_line(input: &mut ChatInput, code: KeyCode) {
    match code {
        KeyCode::Char(c) => input.insert(c),
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        KeyCode::Home => input.move_home(),
        KeyCode::End => input.move_end(),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    let target = match app.input_mode {
        InputMode::Editing => &mut app.input,
        InputMode::AttachPath => &mut app.attach_input,
    };
    // The input is a single line
    for c in text.chars() {
        target.insert(if c == '\n' || c == '\r' { ' ' } else { c });
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn copy_last_code_block(app: &mut App) {
    match app.last_code_block() {
        Some(code) => {
            app.status = Some(if copy_to_clipboard(&code) {
                "Copied code block".to_string()
            } else {
                "No clipboard tool found (pbcopy, wl-copy or xclip)".to_string()
            });
        }
        None => app.status = Some("No code block to copy".to_string()),
    }
}

fn copy_to_clipboard(text: &str) -> bool {
    const TOOLS: [(&str, &[&str]); 3] = [
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
    ];

    for (tool, args) in TOOLS {
        match pipe_to(tool, args, text) {
            Ok(success) => return success,
            Err(err) => debug!(tool, error = %err, "clipboard tool unavailable"),
        }
    }
    false
}

/// Run `program` with `text` on its stdin and report whether it exited cleanly.
///
/// The child is always waited on, including when writing to it fails.
fn pipe_to(program: &str, args: &[&str], text: &str) -> io::Result<bool> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(err) = stdin.write_all(text.as_bytes()) {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
    }
    Ok(child.wait()?.success())
}
