use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global quit, works in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,

        // Tab cycles focus: Input -> Months -> Chat -> Input
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Input => FocusPane::Months,
                FocusPane::Months => FocusPane::Chat,
                FocusPane::Chat => FocusPane::Input,
            };
        }

        // Start typing a message
        KeyCode::Char('i') | KeyCode::Enter if app.focus == FocusPane::Input => {
            app.input_mode = InputMode::Editing;
            app.cursor = app.input.chars().count();
        }

        // Run the report for the selected month
        KeyCode::Enter if app.focus == FocusPane::Months => {
            app.fetch_performance();
        }
        KeyCode::Char('r') => {
            app.fetch_performance();
        }

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Months => app.month_down(),
            FocusPane::Chat => app.chat_scroll_down(),
            FocusPane::Input => {}
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Months => app.month_up(),
            FocusPane::Chat => app.chat_scroll_up(),
            FocusPane::Input => {}
        },

        KeyCode::Char('g') => {
            if app.focus == FocusPane::Chat {
                app.chat_scroll = 0;
            }
        }
        KeyCode::Char('G') => {
            if app.focus == FocusPane::Chat {
                app.scroll_chat_to_bottom();
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.send_message();
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Tab => {
            // Leave editing and move focus to the month selector
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Months;
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_months = app
        .months_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_chat {
                app.chat_scroll_down();
                app.chat_scroll_down();
                app.chat_scroll_down();
            } else if in_months {
                app.month_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_chat {
                app.chat_scroll_up();
                app.chat_scroll_up();
                app.chat_scroll_up();
            } else if in_months {
                app.month_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ChatRole;
    use crate::config::Config;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::empty(),
            kind: crossterm::event::KeyEventKind::Press,
            state: KeyEventState::empty(),
        }
    }

    #[tokio::test]
    async fn typing_then_enter_appends_exactly_one_user_row() {
        let mut app = App::new(&Config::new());
        app.input_mode = InputMode::Editing;

        for c in "hello".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        handle_key(&mut app, key(KeyCode::Enter));

        assert_eq!(app.chat_messages.len(), 1);
        assert_eq!(app.chat_messages[0].role, ChatRole::User);
        assert_eq!(app.chat_messages[0].content, "hello");
        assert!(app.chat_pending());
    }

    #[tokio::test]
    async fn enter_on_blank_input_sends_nothing() {
        let mut app = App::new(&Config::new());
        app.input_mode = InputMode::Editing;

        handle_key(&mut app, key(KeyCode::Char(' ')));
        handle_key(&mut app, key(KeyCode::Enter));

        assert!(app.chat_messages.is_empty());
        assert!(!app.chat_pending());
    }

    #[test]
    fn cursor_editing_is_utf8_safe() {
        let mut app = App::new(&Config::new());
        app.input_mode = InputMode::Editing;

        for c in "héllo".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        handle_key(&mut app, key(KeyCode::Left));
        handle_key(&mut app, key(KeyCode::Left));
        handle_key(&mut app, key(KeyCode::Backspace));

        assert_eq!(app.input, "hélo");
        assert_eq!(app.cursor, 2);
    }

    #[test]
    fn tab_cycles_focus_panes() {
        let mut app = App::new(&Config::new());
        assert_eq!(app.focus, FocusPane::Input);

        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Months);
        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Chat);
        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Input);
    }
}
