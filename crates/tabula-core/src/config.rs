//! Session tunables
//!
//! Built by the host from command-line flags; the core never reads
//! configuration files itself.

use std::time::Duration;

use serde::Deserialize;

use crate::constants::{input, report};

/// Tunables consumed by the scheduler, layout, and driver
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Read timeout (ms) while background tasks are outstanding
    pub busy_timeout_ms: u64,
    /// No-event iterations before blocking indefinitely; `None` never idles
    pub idle_iterations: Option<u32>,
    /// Height of the secondary pane as a percentage of the screen.
    /// Negative places it at the top, positive at the bottom, 0 disables it.
    pub split_percent: i32,
    /// Capacity of the rolling error history
    pub error_history: usize,
    /// Read timeout (ms) while the pending keys end in ESC
    pub esc_delay_ms: u64,
    /// Capture mouse events
    pub mouse: bool,
    /// Keystroke token that force-quits the session
    pub quit_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: input::BUSY_TIMEOUT.as_millis() as u64,
            idle_iterations: Some(input::IDLE_ITERATIONS),
            split_percent: 0,
            error_history: report::ERROR_HISTORY,
            esc_delay_ms: input::ESC_DELAY.as_millis() as u64,
            mouse: true,
            quit_key: input::QUIT_KEY.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn esc_delay(&self) -> Duration {
        Duration::from_millis(self.esc_delay_ms)
    }

    /// Set the split percentage
    pub fn with_split(mut self, split_percent: i32) -> Self {
        self.split_percent = split_percent;
        self
    }

    /// Set the idle threshold
    pub fn with_idle_iterations(mut self, idle_iterations: Option<u32>) -> Self {
        self.idle_iterations = idle_iterations;
        self
    }
}
