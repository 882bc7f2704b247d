use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, ImageField, InputMode, Tab};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::ChatReply(result) => app.apply_chat_reply(result),
        AppEvent::ImageEdited(result) => app.apply_image_result(result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Popups take every key while open
    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return;
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_api_key_input = false;
            app.api_key_input.clear();
        }
        KeyCode::Enter => app.submit_api_key(),
        _ => {
            app.api_key_input.handle_key(&key);
        }
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

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Tab => {
            app.next_tab();
            return;
        }
        KeyCode::BackTab => {
            app.prev_tab();
            return;
        }
        KeyCode::Char('1') => {
            app.select_tab(Tab::Tasks);
            return;
        }
        KeyCode::Char('2') => {
            app.select_tab(Tab::Chat);
            return;
        }
        KeyCode::Char('3') => {
            app.select_tab(Tab::Image);
            return;
        }
        KeyCode::Char('K') => {
            app.open_api_key_input();
            return;
        }
        _ => {}
    }

    match app.tab {
        Tab::Tasks => handle_tasks_normal(app, key),
        Tab::Chat => handle_chat_normal(app, key),
        Tab::Image => handle_image_normal(app, key),
    }
}

fn handle_tasks_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.task_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.task_nav_up(),
        KeyCode::Char('g') | KeyCode::Home => app.task_nav_first(),
        KeyCode::Char('G') | KeyCode::End => app.task_nav_last(),
        KeyCode::Char(' ') => {
            app.toggle_selected_task();
        }
        KeyCode::Char('d') | KeyCode::Delete => {
            app.delete_selected_task();
        }
        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::PageDown => app.scroll_chat_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_chat_up(app.chat_height.max(1)),
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),
        KeyCode::Char('g') | KeyCode::Home => app.chat_scroll = 0,
        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        _ => {}
    }
}

fn handle_image_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.image_field = ImageField::Instruction,
        KeyCode::Char('k') | KeyCode::Up => app.image_field = ImageField::Path,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('g') => {
            app.start_image_edit();
        }
        KeyCode::Char('s') => {
            app.save_edited_image();
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.input_mode = InputMode::Normal;
        return;
    }

    match app.tab {
        Tab::Tasks => {
            if key.code == KeyCode::Enter {
                app.submit_task();
            } else {
                app.task_input.handle_key(&key);
            }
        }
        Tab::Chat => {
            if key.code == KeyCode::Enter {
                app.send_chat();
            } else {
                app.chat_input.handle_key(&key);
            }
        }
        Tab::Image => handle_image_editing(app, key),
    }
}

fn handle_image_editing(app: &mut App, key: KeyEvent) {
    match (key.code, app.image_field) {
        (KeyCode::Tab | KeyCode::BackTab, ImageField::Path) => {
            app.image_field = ImageField::Instruction;
        }
        (KeyCode::Tab | KeyCode::BackTab, ImageField::Instruction) => {
            app.image_field = ImageField::Path;
        }
        (KeyCode::Enter, ImageField::Path) => {
            app.load_image();
        }
        (KeyCode::Enter, ImageField::Instruction) => {
            app.start_image_edit();
        }
        (_, ImageField::Path) => {
            app.image_path_input.handle_key(&key);
        }
        (_, ImageField::Instruction) => {
            app.image_instruction_input.handle_key(&key);
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => match app.tab {
            Tab::Chat if in_chat => app.scroll_chat_down(3),
            Tab::Tasks => app.task_nav_down(),
            _ => {}
        },
        MouseEventKind::ScrollUp => match app.tab {
            Tab::Chat if in_chat => app.scroll_chat_up(3),
            Tab::Tasks => app.task_nav_up(),
            _ => {}
        },
        _ => {}
    }
}
