//! Terminal driver
//!
//! The only component that touches the terminal device. The scheduler
//! talks to it through [`TerminalDriver`] so tests can substitute an
//! in-memory driver.

mod terminal;
pub mod keys;
pub mod mouse;

use std::time::Duration;

use async_trait::async_trait;
use ratatui::{buffer::Buffer, layout::Size};

use crate::error::DriverError;

pub use terminal::{restore_terminal, CrosstermDriver, TerminalGuard};
pub use keys::keystroke_token;
pub use mouse::{ButtonState, MouseActionTable, RawMouse};

/// Decoded input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// Canonical keystroke token (`"a"`, `"^Q"`, `"KEY_UP"`, ...)
    Key(String),
    /// Mouse event in screen coordinates with curses-style button bits
    Mouse(RawMouse),
    /// Terminal was resized
    Resize(Size),
}

/// Exclusive handle on the terminal display and its input
#[async_trait]
pub trait TerminalDriver: Send {
    /// Changes whenever the underlying screen buffer is re-created;
    /// pane handles are only valid for the identity they were built for
    fn identity(&self) -> u64;

    /// Current terminal size
    fn size(&self) -> Result<Size, DriverError>;

    /// Wait up to `timeout` for the next event (`None` blocks until one
    /// arrives). `Ok(None)` means the wait timed out.
    async fn read_event(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<RawEvent>, DriverError>;

    /// Render one frame: `paint` fills the full-screen buffer, which is
    /// then flushed to the device
    fn draw(&mut self, paint: &mut dyn FnMut(&mut Buffer)) -> Result<(), DriverError>;

    fn set_cursor_visible(&mut self, visible: bool) -> Result<(), DriverError>;
}
