//! Input dispatcher
//!
//! Accumulates keystroke tokens into a pending sequence and resolves it
//! against the binding table. Mouse events bypass the accumulator: their
//! button bits are composed into a token and resolved to the pane under
//! the cursor.

use crate::commands::{BindingSource, CommandId, MouseTarget, Resolution};
use crate::constants::input::ESC;
use crate::driver::{MouseActionTable, RawEvent, RawMouse};
use crate::session::SessionContext;

/// Pending keystrokes and whether they form a known prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequenceState {
    pub pending: String,
    pub prefix_waiting: bool,
}

impl KeySequenceState {
    fn reset(&mut self) {
        self.pending.clear();
        self.prefix_waiting = false;
    }

    /// `key` already appears in the sequence it would extend
    fn repeats(&self, key: &str) -> bool {
        let mut probe = self.pending.clone();
        probe.push_str(key);
        if let Some((last, _)) = probe.char_indices().next_back() {
            probe.truncate(last);
        }
        !key.is_empty() && probe.contains(key)
    }
}

/// What the scheduler should do with one input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Timeout or an event with nothing to do
    Idle,
    /// Pending keys are a strict prefix; waiting for more
    Waiting,
    Command { id: CommandId, keys: String },
    Mouse(MouseTarget),
    Quit,
    /// The pending sequence was discarded because a key repeated
    DuplicatePrefix(String),
    /// No binding for the accumulated keys
    Unbound(String),
}

/// Keystroke state machine feeding the scheduler
#[derive(Debug)]
pub struct InputDispatcher {
    state: KeySequenceState,
    mouse_table: MouseActionTable,
    quit_key: String,
}

impl InputDispatcher {
    pub fn new(quit_key: impl Into<String>) -> Self {
        Self::with_mouse_table(quit_key, MouseActionTable::default())
    }

    pub fn with_mouse_table(quit_key: impl Into<String>, mouse_table: MouseActionTable) -> Self {
        Self {
            state: KeySequenceState::default(),
            mouse_table,
            quit_key: quit_key.into(),
        }
    }

    pub fn state(&self) -> &KeySequenceState {
        &self.state
    }

    pub fn pending(&self) -> &str {
        &self.state.pending
    }

    /// Waiting on a sequence that ends in a lone ESC
    pub fn pending_escape(&self) -> bool {
        self.state.prefix_waiting && self.state.pending.ends_with(ESC)
    }

    /// Advance the state machine by one event. `None` is a read timeout.
    pub fn feed(
        &mut self,
        event: Option<&RawEvent>,
        bindings: &dyn BindingSource,
        session: &SessionContext,
    ) -> Dispatch {
        match event {
            None => {
                if self.pending_escape() {
                    tracing::debug!(pending = %self.state.pending, "Escape timed out");
                    self.state.reset();
                }
                Dispatch::Idle
            }
            Some(RawEvent::Resize(_)) => Dispatch::Idle,
            Some(RawEvent::Mouse(mouse)) => self.feed_mouse(mouse, session),
            Some(RawEvent::Key(key)) => {
                self.feed_key(key, bindings, session.active_view_kind())
            }
        }
    }

    fn feed_mouse(&mut self, mouse: &RawMouse, session: &SessionContext) -> Dispatch {
        self.state.reset();
        let token = self.mouse_table.compose(mouse.state);
        match session.mouse_target(mouse.x, mouse.y, token) {
            Some(target) => {
                tracing::debug!(token = %target.token, pane = ?target.pane, "Mouse event");
                Dispatch::Mouse(target)
            }
            None => Dispatch::Idle,
        }
    }

    fn feed_key(&mut self, key: &str, bindings: &dyn BindingSource, kind: Option<&str>) -> Dispatch {
        if !self.state.prefix_waiting {
            self.state.pending.clear();
        }

        if key == self.quit_key {
            self.state.reset();
            return Dispatch::Quit;
        }

        if self.state.repeats(key) {
            let discarded = std::mem::take(&mut self.state.pending);
            tracing::warn!(pending = %discarded, key, "Duplicate prefix");
            self.state.reset();
            return Dispatch::DuplicatePrefix(discarded);
        }

        self.state.pending.push_str(key);
        match bindings.resolve(kind, &self.state.pending) {
            Resolution::Prefix => {
                tracing::debug!(pending = %self.state.pending, "Waiting for prefix");
                self.state.prefix_waiting = true;
                Dispatch::Waiting
            }
            Resolution::Command(id) => {
                let keys = std::mem::take(&mut self.state.pending);
                self.state.reset();
                tracing::debug!(keys = %keys, command = %id, "Dispatching");
                Dispatch::Command { id, keys }
            }
            Resolution::Unbound => {
                let keys = std::mem::take(&mut self.state.pending);
                self.state.reset();
                Dispatch::Unbound(keys)
            }
        }
    }
}
