//! Keystroke tokens
//!
//! Renders crossterm key events into the canonical string tokens that
//! bindings are written in. Control characters use caret notation, Alt
//! chords are ESC followed by the key.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::constants::input::ESC;

/// Token for a key event, or `None` for events that are not keystrokes
/// (releases, bare modifiers, media keys)
pub fn keystroke_token(event: &KeyEvent) -> Option<String> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    let base = base_token(event.code, event.modifiers)?;

    if event.modifiers.contains(KeyModifiers::ALT) && event.code != KeyCode::Esc {
        Some(format!("{ESC}{base}"))
    } else {
        Some(base)
    }
}

fn base_token(code: KeyCode, modifiers: KeyModifiers) -> Option<String> {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);

    let token = match code {
        KeyCode::Char(ch) if ctrl => control_token(ch)?,
        KeyCode::Char(ch) => ch.to_string(),
        KeyCode::Esc => ESC.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab => "^I".to_string(),
        KeyCode::BackTab => "KEY_BTAB".to_string(),
        KeyCode::Backspace => "KEY_BACKSPACE".to_string(),
        KeyCode::Delete => "KEY_DC".to_string(),
        KeyCode::Insert => "KEY_IC".to_string(),
        KeyCode::Home => "KEY_HOME".to_string(),
        KeyCode::End => "KEY_END".to_string(),
        KeyCode::PageUp => "KEY_PPAGE".to_string(),
        KeyCode::PageDown => "KEY_NPAGE".to_string(),
        KeyCode::Up => "KEY_UP".to_string(),
        KeyCode::Down => "KEY_DOWN".to_string(),
        KeyCode::Left => "KEY_LEFT".to_string(),
        KeyCode::Right => "KEY_RIGHT".to_string(),
        KeyCode::F(n) => format!("KEY_F{n}"),
        _ => return None,
    };
    Some(token)
}

fn control_token(ch: char) -> Option<String> {
    match ch {
        ' ' | '@' => Some("^@".to_string()),
        '[' | '\\' | ']' | '^' | '_' | '?' => Some(format!("^{ch}")),
        _ if ch.is_ascii_alphabetic() => Some(format!("^{}", ch.to_ascii_uppercase())),
        _ => None,
    }
}
