//! Crossterm-backed terminal driver

use std::{
    io::{self, Stdout},
    time::Duration,
};

use async_trait::async_trait;
use crossterm::{
    cursor::{Hide, Show},
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, buffer::Buffer, layout::Size, Terminal};

use super::{keystroke_token, RawEvent, RawMouse, TerminalDriver};
use crate::error::DriverError;

/// Restore terminal state - safe to call more than once
pub fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture, Show)
}

/// Scoped ownership of raw mode and the alternate screen.
///
/// Dropping the guard restores the terminal, so every exit path
/// (including unwinding out of the session) leaves the shell usable.
pub struct TerminalGuard {
    released: bool,
}

impl TerminalGuard {
    pub fn acquire(mouse: bool) -> Result<Self, DriverError> {
        enable_raw_mode().map_err(DriverError::Init)?;
        // From here on Drop undoes whatever part of setup succeeded
        let guard = Self { released: false };

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).map_err(DriverError::Init)?;
        if mouse {
            execute!(stdout, EnableMouseCapture).map_err(DriverError::Init)?;
        }
        Ok(guard)
    }

    /// Restore the terminal now and report failures
    pub fn release(mut self) -> Result<(), DriverError> {
        self.released = true;
        restore_terminal().map_err(DriverError::Restore)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = restore_terminal();
        }
    }
}

/// Driver over stdout using crossterm's async event stream
pub struct CrosstermDriver {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    events: EventStream,
    identity: u64,
    // Declared last so the terminal is restored after everything else drops
    guard: Option<TerminalGuard>,
}

impl CrosstermDriver {
    /// Take over the terminal: raw mode, alternate screen, optional mouse capture
    pub fn new(mouse: bool) -> Result<Self, DriverError> {
        let guard = TerminalGuard::acquire(mouse)?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout())).map_err(DriverError::Init)?;
        tracing::info!(mouse, "Terminal acquired");

        Ok(Self {
            terminal,
            events: EventStream::new(),
            identity: 1,
            guard: Some(guard),
        })
    }

    /// Give the terminal back to the shell
    pub fn shutdown(mut self) -> Result<(), DriverError> {
        self.terminal.show_cursor().map_err(DriverError::Restore)?;
        match self.guard.take() {
            Some(guard) => guard.release(),
            None => Ok(()),
        }
    }

    fn decode(&mut self, event: Event) -> Option<RawEvent> {
        match event {
            Event::Key(key) => keystroke_token(&key).map(RawEvent::Key),
            Event::Mouse(mouse) => {
                let decoded = RawMouse::from_crossterm(&mouse);
                if decoded.is_none() {
                    tracing::trace!(kind = ?mouse.kind, "Ignoring undecodable mouse event");
                }
                decoded.map(RawEvent::Mouse)
            }
            Event::Resize(width, height) => {
                // A resize invalidates the backend's buffers
                self.identity += 1;
                Some(RawEvent::Resize(Size::new(width, height)))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl TerminalDriver for CrosstermDriver {
    fn identity(&self) -> u64 {
        self.identity
    }

    fn size(&self) -> Result<Size, DriverError> {
        self.terminal.size().map_err(DriverError::Size)
    }

    async fn read_event(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<RawEvent>, DriverError> {
        let next = match timeout {
            Some(timeout) => {
                tokio::select! {
                    biased;
                    maybe_event = self.events.next() => maybe_event,
                    _ = tokio::time::sleep(timeout) => return Ok(None),
                }
            }
            None => self.events.next().await,
        };

        match next {
            Some(Ok(event)) => Ok(self.decode(event)),
            Some(Err(e)) => Err(DriverError::Read(e)),
            None => Err(DriverError::Closed),
        }
    }

    fn draw(&mut self, paint: &mut dyn FnMut(&mut Buffer)) -> Result<(), DriverError> {
        self.terminal
            .draw(|frame| paint(frame.buffer_mut()))
            .map(|_| ())
            .map_err(DriverError::Draw)
    }

    fn set_cursor_visible(&mut self, visible: bool) -> Result<(), DriverError> {
        let result = if visible {
            execute!(self.terminal.backend_mut(), Show)
        } else {
            execute!(self.terminal.backend_mut(), Hide)
        };
        result.map_err(DriverError::Draw)
    }
}
