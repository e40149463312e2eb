//! Session context
//!
//! All mutable session state lives here and is passed explicitly to
//! commands, mouse handlers, and the scheduler: both view stacks, the
//! active pane, pane layout, statuses, error history, background tasks,
//! and the replay queue.

mod status;

use std::collections::VecDeque;

use ratatui::{
    buffer::Buffer,
    layout::{Rect, Size},
    style::{Color, Modifier, Style},
};
use unicode_width::UnicodeWidthStr;

use crate::commands::MouseTarget;
use crate::config::SessionConfig;
use crate::error::{run_guarded, RecordedError};
use crate::layout::{compute_layout, PaneHandle, PaneLayout};
use crate::tasks::{Job, TaskId, TaskRegistry};
use crate::view::{Pane, View, ViewEntry, ViewId, ViewStack};

pub use status::{ErrorHistory, Status, StatusLevel, StatusLog};

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every view was closed
    Finished,
    /// A command ended the session with a value
    Returned(String),
    /// The quit key was pressed; carries the most recent error, if any
    ForcedQuit { last_error: Option<String> },
}

/// Mutable state of one interactive session
pub struct SessionContext {
    stacks: [ViewStack; 2],
    active: Pane,
    split_percent: i32,
    layout: PaneLayout,
    statuses: StatusLog,
    errors: ErrorHistory,
    tasks: TaskRegistry,
    replay: VecDeque<String>,
    replaying: bool,
    outcome: Option<SessionOutcome>,
}

impl SessionContext {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            stacks: [ViewStack::new(), ViewStack::new()],
            active: Pane::Primary,
            split_percent: config.split_percent,
            layout: PaneLayout::new(),
            statuses: StatusLog::new(),
            errors: ErrorHistory::new(config.error_history),
            tasks: TaskRegistry::new(),
            replay: VecDeque::new(),
            replaying: false,
            outcome: None,
        }
    }

    // ---- view stacks ----

    /// Push a view onto the active pane
    pub fn push(&mut self, view: Box<dyn View>) -> ViewId {
        self.push_to(self.active, view)
    }

    /// Push a view onto a specific pane
    pub fn push_to(&mut self, pane: Pane, view: Box<dyn View>) -> ViewId {
        let entry = ViewEntry::new(view);
        let id = entry.id;
        tracing::debug!(view = %id, name = entry.view.name(), ?pane, "Pushing view");
        self.stacks[pane.index()].push(entry);
        id
    }

    /// Move an existing view to the top of the active pane
    pub fn bring_to_top(&mut self, id: ViewId) -> bool {
        self.move_to(id, self.active)
    }

    /// Move an existing view to the top of `pane`. A view is only ever
    /// held by one stack slot, so it leaves its old position.
    pub fn move_to(&mut self, id: ViewId, pane: Pane) -> bool {
        let entry = self
            .stacks
            .iter_mut()
            .find_map(|stack| stack.remove(id));
        match entry {
            Some(entry) => {
                tracing::debug!(view = %id, ?pane, "Moving view");
                self.stacks[pane.index()].push(entry);
                true
            }
            None => false,
        }
    }

    /// Pop the top view of the active pane
    pub fn pop(&mut self) -> Option<Box<dyn View>> {
        let entry = self.stacks[self.active.index()].pop()?;
        tracing::debug!(view = %entry.id, name = entry.view.name(), "Popped view");
        Some(entry.view)
    }

    pub fn stack(&self, pane: Pane) -> &ViewStack {
        &self.stacks[pane.index()]
    }

    pub fn has_views(&self) -> bool {
        self.stacks.iter().any(|stack| !stack.is_empty())
    }

    pub fn active_pane(&self) -> Pane {
        self.active
    }

    /// Flip the active pane. Only allowed when the other pane has a view.
    pub fn switch_pane(&mut self) -> bool {
        let other = self.active.other();
        if self.stacks[other.index()].is_empty() {
            return false;
        }
        self.active = other;
        true
    }

    pub fn active_view_id(&self) -> Option<ViewId> {
        self.stacks[self.active.index()].top().map(|entry| entry.id)
    }

    pub fn active_view_mut(&mut self) -> Option<&mut dyn View> {
        self.top_view_mut(self.active)
    }

    /// Top view of a pane
    pub fn top_view_mut(&mut self, pane: Pane) -> Option<&mut dyn View> {
        self.stacks[pane.index()]
            .top_mut()
            .map(|entry| entry.view.as_mut() as &mut dyn View)
    }

    /// Binding scope of the top view of a pane
    pub fn view_kind(&self, pane: Pane) -> Option<&str> {
        self.stacks[pane.index()]
            .top()
            .map(|entry| entry.view.kind())
    }

    pub fn active_view_kind(&self) -> Option<&str> {
        self.view_kind(self.active)
    }

    /// Any view still held by a stack
    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut dyn View> {
        self.stacks
            .iter_mut()
            .find_map(|stack| stack.get_mut(id))
            .map(|entry| entry.view.as_mut() as &mut dyn View)
    }

    // ---- layout ----

    pub fn split_percent(&self) -> i32 {
        self.split_percent
    }

    pub fn set_split_percent(&mut self, split_percent: i32) {
        self.split_percent = split_percent;
    }

    pub fn layout(&self) -> &PaneLayout {
        &self.layout
    }

    /// Split that applies this frame: a pane with nothing to show never
    /// takes screen space, and the pane that has views becomes active
    pub fn effective_split(&mut self) -> i32 {
        let primary = !self.stacks[0].is_empty();
        let secondary = !self.stacks[1].is_empty();
        match (primary, secondary) {
            (true, false) => {
                self.active = Pane::Primary;
                0
            }
            (false, true) => {
                self.active = Pane::Secondary;
                0
            }
            _ => self.split_percent,
        }
    }

    /// Recompute pane geometry for this frame. When the handles change,
    /// the top view of each pane is told to refresh.
    pub fn arrange(&mut self, identity: u64, size: Size) -> bool {
        let split = self.effective_split();
        let config = compute_layout(split, size.height, size.width);
        let changed = self.layout.apply(identity, config);
        if changed {
            tracing::info!(
                split,
                width = size.width,
                height = size.height,
                "Pane windows re-created"
            );
            let failures: Vec<RecordedError> = self
                .stacks
                .iter_mut()
                .filter_map(|stack| stack.refresh_top().err())
                .collect();
            for err in failures {
                self.record_error(err);
            }
        }
        changed
    }

    /// Which window shows which pane this frame
    fn frame_plan(&self) -> [(PaneHandle, Option<Pane>); 2] {
        let split = self
            .layout
            .config()
            .is_some_and(|config| config.has_secondary());
        if split {
            [
                (self.layout.main(), Some(Pane::Primary)),
                (self.layout.secondary(), Some(Pane::Secondary)),
            ]
        } else {
            [
                (self.layout.main(), Some(self.active)),
                (self.layout.secondary(), None),
            ]
        }
    }

    /// Resolve a screen position to the pane under it
    pub fn mouse_target(&self, x: u16, y: u16, token: String) -> Option<MouseTarget> {
        self.frame_plan().into_iter().find_map(|(handle, pane)| {
            let pane = pane?;
            let (rel_x, rel_y) = handle.hit(x, y)?;
            if self.stacks[pane.index()].is_empty() {
                return None;
            }
            Some(MouseTarget {
                pane,
                x: rel_x,
                y: rel_y,
                token: token.clone(),
            })
        })
    }

    // ---- drawing ----

    /// Erase and redraw every pane. `keys` is the pending key sequence,
    /// shown on the active pane's status bar.
    pub fn draw(&mut self, buf: &mut Buffer, keys: &str) {
        for (handle, pane) in self.frame_plan() {
            handle.erase(buf);
            let (Some(area), Some(pane)) = (handle.area(), pane) else {
                continue;
            };
            let area = area.intersection(*buf.area());
            let keys = (pane == self.active).then_some(keys);
            self.draw_pane(pane, area, buf, keys);
        }
    }

    fn draw_pane(&mut self, pane: Pane, area: Rect, buf: &mut Buffer, keys: Option<&str>) {
        if area.is_empty() {
            return;
        }
        let (content, status_row) = split_status_row(area);

        let Some(entry) = self.stacks[pane.index()].top_mut() else {
            return;
        };
        let id = entry.id;
        let name = entry.view.name().to_string();
        let load = run_guarded(|| Ok(entry.view.ensure_loaded()));
        let drawn = if content.is_empty() {
            Ok(())
        } else {
            run_guarded(|| entry.view.draw(content, buf))
        };

        match load {
            Ok(Some(job)) => {
                self.tasks.spawn(id, format!("load {name}"), job);
            }
            Ok(None) => {}
            Err(err) => self.record_error(err.context(format!("drawing {name}"))),
        }
        if let Err(err) = drawn {
            self.record_error(err.context(format!("drawing {name}")));
        }

        let (right, level) = match keys {
            Some(keys) => {
                let latest = self.statuses.latest();
                let status = latest.map(|s| s.text.as_str()).unwrap_or("");
                let busy = if self.tasks.outstanding_for(id) > 0 { " [loading]" } else { "" };
                (format!("{status}{busy} {keys}"), latest.map(|s| s.level))
            }
            None => (String::new(), None),
        };
        draw_status_bar(buf, status_row, &name, right.trim(), level, keys.is_some());
    }

    // ---- statuses and errors ----

    pub fn status(&mut self, text: impl Into<String>) {
        self.statuses.push(text, StatusLevel::Info);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(status = %text, "Session warning");
        self.statuses.push(text, StatusLevel::Warning);
    }

    pub fn statuses(&self) -> &StatusLog {
        &self.statuses
    }

    /// Clear transient messages; called when a keystroke arrives
    pub fn clear_statuses(&mut self) {
        self.statuses.clear();
    }

    /// Keep an error in the history and surface it on the status bar
    pub fn record_error(&mut self, error: RecordedError) {
        tracing::error!(error = %error, "Recoverable session error");
        self.statuses.push(error.summary().to_string(), StatusLevel::Error);
        self.errors.push(error);
    }

    pub fn errors(&self) -> &ErrorHistory {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&RecordedError> {
        self.errors.last()
    }

    // ---- background tasks ----

    /// Run a job in the background on behalf of the active view.
    /// Returns `None` when no view is active.
    pub fn spawn(&mut self, name: impl Into<String>, job: Job) -> Option<TaskId> {
        let view = self.active_view_id()?;
        Some(self.tasks.spawn(view, name, job))
    }

    /// Run a job in the background on behalf of a specific view
    pub fn spawn_for(&mut self, view: ViewId, name: impl Into<String>, job: Job) -> TaskId {
        self.tasks.spawn(view, name, job)
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TaskRegistry {
        &mut self.tasks
    }

    // ---- replay ----

    /// Queue a command (id or key sequence) to run ahead of live input
    pub fn queue_replay(&mut self, entry: impl Into<String>) {
        self.replay.push_back(entry.into());
        self.replaying = true;
    }

    pub(crate) fn next_replay(&mut self) -> Option<String> {
        let entry = self.replay.pop_front();
        if entry.is_none() {
            self.replaying = false;
        }
        entry
    }

    /// Whether a scripted replay is in progress
    pub fn replay_pending(&self) -> bool {
        self.replaying && !self.replay.is_empty()
    }

    // ---- ending the session ----

    /// End the session with a value for the host process
    pub fn return_with(&mut self, value: impl Into<String>) {
        self.outcome = Some(SessionOutcome::Returned(value.into()));
    }

    pub(crate) fn take_outcome(&mut self) -> Option<SessionOutcome> {
        self.outcome.take()
    }
}

/// Content area and the status row beneath it
fn split_status_row(area: Rect) -> (Rect, Rect) {
    let content = Rect {
        height: area.height.saturating_sub(1),
        ..area
    };
    let status = Rect {
        y: area.y + content.height,
        height: area.height - content.height,
        ..area
    };
    (content, status)
}

fn draw_status_bar(
    buf: &mut Buffer,
    row: Rect,
    left: &str,
    right: &str,
    level: Option<StatusLevel>,
    active: bool,
) {
    if row.is_empty() {
        return;
    }
    let name_style = if active {
        Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::REVERSED)
    };
    let width = usize::from(row.width);
    let (x, _) = buf.set_stringn(row.x, row.y, left, width, name_style);

    let right_width = right.width();
    let used = usize::from(x - row.x) + 1;
    if right_width == 0 || used + right_width > width {
        return;
    }
    let right_x = row.x + (width - right_width) as u16;
    let style = match level {
        Some(StatusLevel::Error) => Style::default().fg(Color::Red),
        Some(StatusLevel::Warning) => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    };
    buf.set_stringn(right_x, row.y, right, right_width, style);
}
