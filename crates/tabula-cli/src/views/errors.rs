//! Views over the session's recorded errors

use tabula_core::error::RecordedError;
use tabula_core::session::ErrorHistory;

use super::text::TextView;

/// Binding scope of error views
pub const KIND: &str = "errors";

/// One error, a line per cause, outermost first
pub fn error_view(error: &RecordedError) -> TextView {
    TextView::from_lines("error", error.lines.clone()).with_kind(KIND)
}

/// Every error in the history, oldest first
pub fn errors_view(history: &ErrorHistory) -> TextView {
    let mut lines = Vec::new();
    for (n, error) in history.iter().enumerate() {
        let mut causes = error.lines.iter();
        if let Some(first) = causes.next() {
            lines.push(format!("[{}] {first}", n + 1));
        }
        lines.extend(causes.map(|cause| format!("    {cause}")));
    }
    TextView::from_lines("errors", lines).with_kind(KIND)
}
