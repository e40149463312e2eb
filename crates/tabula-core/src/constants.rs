//! Session defaults
//!
//! Centralized location for timing constants and default tunables

use std::time::Duration;

/// Input polling
pub mod input {
    use super::*;

    /// Read timeout while background tasks are outstanding
    pub const BUSY_TIMEOUT: Duration = Duration::from_millis(100);

    /// Consecutive no-event iterations before reads block indefinitely
    pub const IDLE_ITERATIONS: u32 = 10;

    /// Read timeout while a pending sequence ends in ESC
    pub const ESC_DELAY: Duration = Duration::from_millis(25);

    /// Keystroke that force-quits the session
    pub const QUIT_KEY: &str = "^Q";

    /// Token for the escape key; Alt chords are rendered with it as a prefix
    pub const ESC: &str = "^[";
}

/// Error and status reporting
pub mod report {
    /// Errors kept in the rolling history
    pub const ERROR_HISTORY: usize = 50;

    /// Status messages kept for the status bar
    pub const MAX_STATUSES: usize = 10;
}
