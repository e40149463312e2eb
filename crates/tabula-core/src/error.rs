//! Session error types

use std::{
    any::Any,
    cell::Cell,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
};

use thiserror::Error;

/// Terminal device failures
#[derive(Debug, Error)]
pub enum DriverError {
    /// Terminal could not be put into raw/alternate-screen mode
    #[error("terminal init failed: {0}")]
    Init(#[source] std::io::Error),

    /// Reading the next input event failed
    #[error("terminal read failed: {0}")]
    Read(#[source] std::io::Error),

    /// Input stream ended (stdin closed)
    #[error("terminal input closed")]
    Closed,

    /// Flushing a frame to the terminal failed
    #[error("terminal draw failed: {0}")]
    Draw(#[source] std::io::Error),

    /// Restoring the terminal mode failed
    #[error("terminal restore failed: {0}")]
    Restore(#[source] std::io::Error),

    /// Querying the terminal size failed
    #[error("terminal size unavailable: {0}")]
    Size(#[source] std::io::Error),
}

/// Fatal session errors; everything else is recorded and the loop continues
#[derive(Debug, Error)]
pub enum SessionError {
    /// Unrecoverable device failure
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// No view was pushed before the session started
    #[error("no views to show")]
    NothingToShow,
}

impl DriverError {
    /// Read failures are dropped as "no event"; everything else ends the session
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DriverError::Read(_))
    }
}

impl SessionError {
    /// Whether this failure happened while acquiring the terminal
    pub fn is_init_failure(&self) -> bool {
        matches!(self, SessionError::Driver(DriverError::Init(_)))
    }
}

/// A recoverable failure kept in the session's error history.
///
/// Stored as its cause chain, outermost first, so it can be shown one
/// cause per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError {
    pub lines: Vec<String>,
}

impl RecordedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            lines: vec![message.into()],
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            lines: err.chain().map(|cause| cause.to_string()).collect(),
        }
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(format!("panicked: {message}"))
    }

    /// Prefix the chain with an outer description
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.lines.insert(0, context.into());
        self
    }

    /// Innermost cause, the most specific line
    pub fn summary(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for RecordedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}

thread_local! {
    static GUARD_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Whether the current thread is inside [`run_guarded`]. Panic hooks use
/// this to tell a recoverable panic from one that will end the process.
pub fn panic_is_guarded() -> bool {
    GUARD_DEPTH.with(|depth| depth.get() > 0)
}

/// Run externally supplied code (commands, view drawing, background jobs),
/// turning both errors and panics into a [`RecordedError`]
pub fn run_guarded<T, F>(f: F) -> Result<T, RecordedError>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let result = catch_unwind(AssertUnwindSafe(f));
    GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(RecordedError::from_anyhow(&err)),
        Err(payload) => Err(RecordedError::from_panic(payload.as_ref())),
    }
}
