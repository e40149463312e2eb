//! Tabula Core - terminal session engine
//!
//! Owns the terminal, turns keystrokes and mouse chords into commands run
//! against per-pane view stacks, and decides when to redraw while
//! background work completes:
//! - Terminal driver abstraction with a crossterm implementation
//! - One- or two-pane layout driven by a signed split percentage
//! - Prefix-aware key sequence dispatch and mouse chord decoding
//! - Background task registry with channel-delivered completion
//! - Scheduler loop with adaptive busy/idle polling

pub mod commands;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod layout;
pub mod scheduler;
pub mod session;
pub mod tasks;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use commands::{Command, CommandId, CommandRegistry, MouseAction, MouseTarget, Scope};
pub use config::SessionConfig;
pub use driver::{CrosstermDriver, RawEvent, TerminalDriver};
pub use error::{DriverError, SessionError};
pub use layout::{PaneConfig, PaneHandle, PaneLayout};
pub use scheduler::{Scheduler, SessionOutcome};
pub use session::SessionContext;
pub use tasks::{Job, TaskRegistry};
pub use view::{Pane, View, ViewId};
