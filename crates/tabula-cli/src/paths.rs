//! Filesystem locations

use std::path::PathBuf;

/// Per-user data directory, e.g. `~/.local/share/tabula`
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabula")
}

pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

#[cfg(unix)]
pub const NULL_DEVICE: &str = "/dev/null";
#[cfg(windows)]
pub const NULL_DEVICE: &str = "NUL";
