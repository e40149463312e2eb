//! Status messages and the rolling error history

use std::collections::VecDeque;

use crate::constants::report::MAX_STATUSES;
use crate::error::RecordedError;

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the status bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub level: StatusLevel,
}

/// Messages shown until the next keystroke
#[derive(Debug, Default)]
pub struct StatusLog {
    messages: VecDeque<Status>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>, level: StatusLevel) {
        let status = Status {
            text: text.into(),
            level,
        };
        // Repeating the same message adds nothing
        if self.messages.back() == Some(&status) {
            return;
        }
        while self.messages.len() >= MAX_STATUSES {
            self.messages.pop_front();
        }
        self.messages.push_back(status);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn latest(&self) -> Option<&Status> {
        self.messages.back()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Status> {
        self.messages.iter()
    }
}

/// Bounded history of recoverable errors, oldest dropped first
#[derive(Debug)]
pub struct ErrorHistory {
    errors: VecDeque<RecordedError>,
    capacity: usize,
}

impl ErrorHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            errors: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, error: RecordedError) {
        while self.errors.len() >= self.capacity {
            self.errors.pop_front();
        }
        self.errors.push_back(error);
    }

    pub fn last(&self) -> Option<&RecordedError> {
        self.errors.back()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &RecordedError> {
        self.errors.iter()
    }
}
