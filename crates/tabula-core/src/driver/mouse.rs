//! Mouse decoding
//!
//! Mouse input is normalized into a curses-style button bitmask so the
//! modifier-stripping and action lookup in the dispatcher work on a single
//! integer pattern regardless of the terminal backend.

use std::collections::HashMap;

use bitflags::bitflags;
use crossterm::event::{KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

bitflags! {
    /// Button state bits, one group of four per button plus modifier bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ButtonState: u32 {
        const BUTTON1_RELEASED = 1 << 0;
        const BUTTON1_PRESSED = 1 << 1;
        const BUTTON1_CLICKED = 1 << 2;
        const BUTTON1_DOUBLE_CLICKED = 1 << 3;
        const BUTTON2_RELEASED = 1 << 5;
        const BUTTON2_PRESSED = 1 << 6;
        const BUTTON2_CLICKED = 1 << 7;
        const BUTTON2_DOUBLE_CLICKED = 1 << 8;
        const BUTTON3_RELEASED = 1 << 10;
        const BUTTON3_PRESSED = 1 << 11;
        const BUTTON3_CLICKED = 1 << 12;
        const BUTTON3_DOUBLE_CLICKED = 1 << 13;
        const BUTTON4_RELEASED = 1 << 15;
        const BUTTON4_PRESSED = 1 << 16;
        const BUTTON4_CLICKED = 1 << 17;
        const BUTTON4_DOUBLE_CLICKED = 1 << 18;
        const BUTTON5_RELEASED = 1 << 20;
        const BUTTON5_PRESSED = 1 << 21;
        const BUTTON5_CLICKED = 1 << 22;
        const BUTTON5_DOUBLE_CLICKED = 1 << 23;
        const BUTTON_CTRL = 1 << 24;
        const BUTTON_SHIFT = 1 << 25;
        const BUTTON_ALT = 1 << 26;
        const REPORT_MOUSE_POSITION = 1 << 27;
    }
}

impl ButtonState {
    /// Modifier bits, stripped in this order when composing a chord token
    pub const MODIFIERS: [(ButtonState, &'static str); 3] = [
        (ButtonState::BUTTON_CTRL, "CTRL-"),
        (ButtonState::BUTTON_ALT, "ALT-"),
        (ButtonState::BUTTON_SHIFT, "SHIFT-"),
    ];

    fn modifier_mask() -> ButtonState {
        ButtonState::BUTTON_CTRL | ButtonState::BUTTON_ALT | ButtonState::BUTTON_SHIFT
    }
}

/// A mouse event in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMouse {
    pub x: u16,
    pub y: u16,
    pub state: ButtonState,
}

impl RawMouse {
    pub fn new(x: u16, y: u16, state: ButtonState) -> Self {
        Self { x, y, state }
    }

    /// Split into `(x, y, button bits, modifier bits)`
    pub fn split(&self) -> (u16, u16, ButtonState, ButtonState) {
        let modifiers = self.state & ButtonState::modifier_mask();
        (self.x, self.y, self.state - modifiers, modifiers)
    }

    /// Convert a crossterm mouse event. Horizontal scrolling has no
    /// button pattern and decodes to `None`.
    pub fn from_crossterm(event: &MouseEvent) -> Option<Self> {
        let button = |button: MouseButton, pressed: bool| match (button, pressed) {
            (MouseButton::Left, true) => ButtonState::BUTTON1_PRESSED,
            (MouseButton::Left, false) => ButtonState::BUTTON1_RELEASED,
            (MouseButton::Middle, true) => ButtonState::BUTTON2_PRESSED,
            (MouseButton::Middle, false) => ButtonState::BUTTON2_RELEASED,
            (MouseButton::Right, true) => ButtonState::BUTTON3_PRESSED,
            (MouseButton::Right, false) => ButtonState::BUTTON3_RELEASED,
        };

        let mut state = match event.kind {
            MouseEventKind::Down(b) => button(b, true),
            MouseEventKind::Up(b) => button(b, false),
            MouseEventKind::Drag(_) | MouseEventKind::Moved => {
                ButtonState::REPORT_MOUSE_POSITION
            }
            MouseEventKind::ScrollUp => ButtonState::BUTTON4_PRESSED,
            MouseEventKind::ScrollDown => ButtonState::BUTTON5_PRESSED,
            MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => return None,
        };

        if event.modifiers.contains(KeyModifiers::CONTROL) {
            state |= ButtonState::BUTTON_CTRL;
        }
        if event.modifiers.contains(KeyModifiers::ALT) {
            state |= ButtonState::BUTTON_ALT;
        }
        if event.modifiers.contains(KeyModifiers::SHIFT) {
            state |= ButtonState::BUTTON_SHIFT;
        }

        Some(Self::new(event.column, event.row, state))
    }
}

/// Maps button bit patterns (modifiers already stripped) to action tokens
#[derive(Debug, Clone)]
pub struct MouseActionTable {
    actions: HashMap<u32, String>,
}

impl Default for MouseActionTable {
    /// Every single-bit, non-modifier state named after its flag
    fn default() -> Self {
        let actions = ButtonState::all()
            .iter_names()
            .filter(|(_, flag)| !ButtonState::modifier_mask().contains(*flag))
            .map(|(name, flag)| (flag.bits(), name.to_string()))
            .collect();
        Self { actions }
    }
}

impl MouseActionTable {
    /// Table with no entries; every pattern falls back to its decimal bits
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Name a button pattern
    pub fn insert(&mut self, state: ButtonState, token: impl Into<String>) {
        self.actions.insert(state.bits(), token.into());
    }

    pub fn get(&self, state: ButtonState) -> Option<&str> {
        self.actions.get(&state.bits()).map(String::as_str)
    }

    /// Compose the full chord token: modifier tags in control, alt, shift
    /// order, then the action token for the remaining bits
    pub fn compose(&self, mut state: ButtonState) -> String {
        let mut token = String::new();
        for (flag, tag) in ButtonState::MODIFIERS {
            if state.contains(flag) {
                token.push_str(tag);
                state.remove(flag);
            }
        }
        match self.get(state) {
            Some(action) => token.push_str(action),
            None => token.push_str(&state.bits().to_string()),
        }
        token
    }
}
