//! Built-in views

pub mod errors;
pub mod text;

pub use errors::{error_view, errors_view};
pub use text::TextView;
