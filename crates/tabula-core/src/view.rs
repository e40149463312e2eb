//! Views and per-pane view stacks
//!
//! A view is a unit of displayable, navigable content. The session only
//! knows the capability set in [`View`]; what a view shows and how it
//! loads is up to the implementation.

use std::{
    any::Any,
    sync::atomic::{AtomicU64, Ordering},
};

use ratatui::{buffer::Buffer, layout::Rect};

use crate::error::{run_guarded, RecordedError};
use crate::tasks::Job;

/// Stable identity of a view for as long as it lives in a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Which of the two stacks a view lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pane {
    #[default]
    Primary,
    Secondary,
}

impl Pane {
    pub fn other(self) -> Self {
        match self {
            Pane::Primary => Pane::Secondary,
            Pane::Secondary => Pane::Primary,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Pane::Primary => 0,
            Pane::Secondary => 1,
        }
    }
}

/// View trait - implement this for anything that can be pushed on a pane
pub trait View: Send {
    /// Display name, shown in the status bar
    fn name(&self) -> &str;

    /// Binding scope used to look up view-specific commands
    fn kind(&self) -> &str {
        "view"
    }

    /// Called before every draw. Return a job to load content in the
    /// background; the view must track that a load is in flight and not
    /// hand out the same job twice.
    fn ensure_loaded(&mut self) -> Option<Job> {
        None
    }

    /// Render into `area` of the screen buffer (status row excluded)
    fn draw(&mut self, area: Rect, buf: &mut Buffer) -> anyhow::Result<()>;

    /// Layout changed or background work finished; drop cached
    /// layout-dependent state such as wrapped lines
    fn refresh(&mut self) {}

    /// Clamp the cursor after a command ran
    fn check_cursor(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Mouse position relative to the pane, set before a mouse binding runs
    fn set_mouse(&mut self, x: u16, y: u16) {
        let _ = (x, y);
    }

    /// Downcast to concrete type for view-specific commands
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Refresh a view, recording a panic instead of unwinding into the loop
pub(crate) fn refresh_guarded(view: &mut dyn View) -> Result<(), RecordedError> {
    let name = view.name().to_string();
    run_guarded(|| {
        view.refresh();
        Ok(())
    })
    .map_err(|err| err.context(format!("refreshing {name}")))
}

/// A view together with its identity
pub struct ViewEntry {
    pub id: ViewId,
    pub view: Box<dyn View>,
}

impl ViewEntry {
    pub fn new(view: Box<dyn View>) -> Self {
        Self {
            id: ViewId::next(),
            view,
        }
    }
}

/// Ordered views of one pane; the last entry is on top
#[derive(Default)]
pub struct ViewStack {
    entries: Vec<ViewEntry>,
}

impl ViewStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top(&self) -> Option<&ViewEntry> {
        self.entries.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut ViewEntry> {
        self.entries.last_mut()
    }

    pub fn push(&mut self, entry: ViewEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<ViewEntry> {
        self.entries.pop()
    }

    /// Take a view out from anywhere in the stack
    pub fn remove(&mut self, id: ViewId) -> Option<ViewEntry> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut ViewEntry> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Tell the top view its layout-dependent state is stale
    pub fn refresh_top(&mut self) -> Result<(), RecordedError> {
        match self.entries.last_mut() {
            Some(entry) => refresh_guarded(entry.view.as_mut()),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Views from top to bottom
    pub fn iter(&self) -> impl Iterator<Item = &ViewEntry> {
        self.entries.iter().rev()
    }
}
