//! Scheduler / redraw loop
//!
//! One coordinating loop per session. Each iteration redraws, runs at
//! most one replayed or dispatched command, reconciles finished
//! background tasks, and picks the next read timeout: short while tasks
//! are outstanding, unbounded once the screen has been static for long
//! enough.

use std::time::Duration;

use crate::commands::{CommandId, CommandRegistry, MouseAction, MouseTarget};
use crate::config::SessionConfig;
use crate::dispatch::{Dispatch, InputDispatcher};
use crate::driver::{RawEvent, TerminalDriver};
use crate::error::{run_guarded, SessionError};
use crate::session::SessionContext;
use crate::view::refresh_guarded;

pub use crate::session::SessionOutcome;

/// Drives a session over a terminal driver
pub struct Scheduler<D: TerminalDriver> {
    driver: D,
    ctx: SessionContext,
    registry: CommandRegistry,
    dispatcher: InputDispatcher,
    config: SessionConfig,
    /// Consecutive iterations without input or outstanding tasks
    idle_iterations: u32,
}

impl<D: TerminalDriver> Scheduler<D> {
    pub fn new(driver: D, registry: CommandRegistry, config: SessionConfig) -> Self {
        Self {
            driver,
            ctx: SessionContext::new(&config),
            registry,
            dispatcher: InputDispatcher::new(config.quit_key.clone()),
            config,
            idle_iterations: 0,
        }
    }

    /// Session state, for pushing the initial views and replay entries
    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.ctx
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Give back the driver so the caller can release the terminal
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Run until every view is closed, a command returns a value, or
    /// the quit key is pressed
    pub async fn run(&mut self) -> Result<SessionOutcome, SessionError> {
        if !self.ctx.has_views() && !self.ctx.replay_pending() {
            return Err(SessionError::NothingToShow);
        }
        tracing::info!(
            busy_timeout_ms = self.config.busy_timeout_ms,
            idle_iterations = ?self.config.idle_iterations,
            split_percent = self.config.split_percent,
            "Session started"
        );
        if let Err(e) = self.driver.set_cursor_visible(false) {
            tracing::warn!("Failed to hide cursor: {}", e);
        }

        let outcome = loop {
            if let Some(outcome) = self.step().await? {
                break outcome;
            }
        };

        if let Err(e) = self.driver.set_cursor_visible(true) {
            tracing::warn!("Failed to show cursor: {}", e);
        }
        tracing::info!(?outcome, "Session finished");
        Ok(outcome)
    }

    /// One loop iteration. `Some` ends the session.
    pub async fn step(&mut self) -> Result<Option<SessionOutcome>, SessionError> {
        if !self.ctx.has_views() && !self.ctx.replay_pending() {
            return Ok(Some(SessionOutcome::Finished));
        }

        self.redraw()?;

        // Replay has strict priority over live input
        if let Some(entry) = self.ctx.next_replay() {
            self.replay(&entry);
            return Ok(self.ctx.take_outcome());
        }

        let timeout = self.read_timeout();
        let event = match self.driver.read_event(timeout).await {
            Ok(event) => event,
            Err(e) if e.is_recoverable() => {
                tracing::warn!("Terminal read failed, treating as no event: {}", e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(event) = &event {
            self.idle_iterations = 0;
            if matches!(event, RawEvent::Key(_) | RawEvent::Mouse(_)) {
                self.ctx.clear_statuses();
            }
        }

        match self.dispatcher.feed(event.as_ref(), &self.registry, &self.ctx) {
            Dispatch::Idle | Dispatch::Waiting => {}
            Dispatch::Quit => {
                let last_error = self.ctx.last_error().map(|e| e.to_string());
                return Ok(Some(SessionOutcome::ForcedQuit { last_error }));
            }
            Dispatch::Command { id, keys } => self.execute(&id, &keys),
            Dispatch::Mouse(target) => self.mouse(&target),
            Dispatch::DuplicatePrefix(_) => self.ctx.warning("duplicate prefix"),
            Dispatch::Unbound(keys) => self.ctx.status(format!("no command for \"{keys}\"")),
        }
        if let Some(outcome) = self.ctx.take_outcome() {
            return Ok(Some(outcome));
        }

        self.reconcile_tasks();
        self.check_cursor();

        if self.ctx.tasks().outstanding_count() > 0 {
            self.idle_iterations = 0;
        } else {
            self.idle_iterations = self.idle_iterations.saturating_add(1);
        }
        Ok(None)
    }

    /// Timeout for the next read; `None` blocks until input arrives
    pub fn read_timeout(&self) -> Option<Duration> {
        let busy = self.config.busy_timeout();
        let timeout = if self.ctx.tasks().outstanding_count() > 0 {
            Some(busy)
        } else {
            match self.config.idle_iterations {
                Some(threshold) if self.idle_iterations > threshold => None,
                _ => Some(busy),
            }
        };

        if self.dispatcher.pending_escape() {
            let esc = self.config.esc_delay();
            Some(timeout.map_or(esc, |t| t.min(esc)))
        } else {
            timeout
        }
    }

    fn redraw(&mut self) -> Result<(), SessionError> {
        let size = self.driver.size()?;
        self.ctx.arrange(self.driver.identity(), size);

        let ctx = &mut self.ctx;
        let pending = self.dispatcher.pending();
        self.driver.draw(&mut |buf| ctx.draw(buf, pending))?;
        Ok(())
    }

    fn replay(&mut self, entry: &str) {
        let kind = self.ctx.active_view_kind();
        match self.registry.resolve_replay(kind, entry) {
            Some(id) => {
                tracing::debug!(entry, command = %id, "Replaying");
                self.execute(&id, entry);
            }
            None => {
                tracing::warn!(entry, "Replay entry matches no command");
                self.ctx.status(format!("no command for \"{entry}\""));
            }
        }
    }

    /// Run a command, recording any error or panic instead of propagating it
    fn execute(&mut self, id: &CommandId, keys: &str) {
        let Some(command) = self.registry.command(id) else {
            self.ctx.warning(format!("command {id} is not registered"));
            return;
        };
        let ctx = &mut self.ctx;
        if let Err(err) = run_guarded(|| command.execute(ctx)) {
            self.ctx
                .record_error(err.context(format!("command {id} ({keys})")));
        }
    }

    fn mouse(&mut self, target: &MouseTarget) {
        if target.pane != self.ctx.active_pane() {
            self.ctx.switch_pane();
        }
        if let Some(view) = self.ctx.top_view_mut(target.pane) {
            let name = view.name().to_string();
            let placed = run_guarded(|| {
                view.set_mouse(target.x, target.y);
                Ok(())
            });
            if let Err(err) = placed {
                self.ctx.record_error(err.context(format!("mouse position in {name}")));
            }
        }

        let kind = self.ctx.view_kind(target.pane);
        let Some(action) = self.registry.mouse_action(kind, &target.token).cloned() else {
            tracing::debug!(token = %target.token, "Unbound mouse token");
            return;
        };
        match action {
            MouseAction::Commands(ids) => {
                for id in ids {
                    self.execute(&id, &target.token);
                }
            }
            MouseAction::Handler(handler) => {
                let ctx = &mut self.ctx;
                if let Err(err) = run_guarded(|| handler(ctx, target)) {
                    self.ctx
                        .record_error(err.context(format!("mouse {}", target.token)));
                }
            }
        }
    }

    /// Surface task failures and refresh the views whose data changed
    fn reconcile_tasks(&mut self) {
        for task in self.ctx.tasks_mut().completed() {
            let view = self.ctx.view_mut(task.view);
            let name = view.as_ref().map(|v| v.name().to_string());
            if let Some(Err(err)) = view.map(refresh_guarded) {
                self.ctx.record_error(err);
            }

            if let Some(error) = task.error {
                let owner = name.unwrap_or_else(|| task.view.to_string());
                tracing::warn!(task = %task.id, owner = %owner, "Background task failed");
                self.ctx
                    .record_error(error.context(format!("{owner}: {}", task.name)));
            }
        }
    }

    fn check_cursor(&mut self) {
        let Some(view) = self.ctx.active_view_mut() else {
            return;
        };
        let name = view.name().to_string();
        if let Err(err) = run_guarded(|| view.check_cursor()) {
            self.ctx.record_error(err.context(format!("cursor check in {name}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Scope;
    use crate::driver::{ButtonState, RawMouse};
    use crate::test_support::{RecordingView, ScriptedDriver};
    use crate::view::Pane;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn key(k: &str) -> Option<RawEvent> {
        Some(RawEvent::Key(k.to_string()))
    }

    fn scheduler(
        script: Vec<Option<RawEvent>>,
        registry: CommandRegistry,
        config: SessionConfig,
    ) -> Scheduler<ScriptedDriver> {
        let mut scheduler = Scheduler::new(ScriptedDriver::new(80, 24, script), registry, config);
        scheduler
            .context_mut()
            .push(Box::new(RecordingView::new("main")));
        scheduler
    }

    #[tokio::test]
    async fn test_idle_blocks_after_threshold() {
        let threshold = 3;
        let config = SessionConfig::default().with_idle_iterations(Some(threshold));
        let busy = config.busy_timeout();
        let mut scheduler = scheduler(vec![None; 6], CommandRegistry::new(), config);

        for _ in 0..6 {
            assert_eq!(scheduler.step().await.ok(), Some(None));
        }

        let timeouts = &scheduler.driver().timeouts;
        let short = threshold as usize + 1;
        assert!(timeouts[..short].iter().all(|t| *t == Some(busy)));
        assert!(timeouts[short..].iter().all(|t| t.is_none()));
    }

    #[tokio::test]
    async fn test_idle_disabled_never_blocks() {
        let config = SessionConfig::default().with_idle_iterations(None);
        let mut scheduler = scheduler(vec![None; 20], CommandRegistry::new(), config);
        for _ in 0..20 {
            let _ = scheduler.step().await;
        }
        assert!(scheduler.driver().timeouts.iter().all(|t| t.is_some()));
    }

    #[tokio::test]
    async fn test_outstanding_task_resets_to_short_polling() {
        let config = SessionConfig::default().with_idle_iterations(Some(0));
        let mut scheduler = scheduler(vec![None, None, None], CommandRegistry::new(), config);

        scheduler.step().await.ok();
        scheduler.step().await.ok();
        assert_eq!(scheduler.read_timeout(), None);

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        scheduler.context_mut().spawn(
            "wait",
            Box::new(move || -> anyhow::Result<()> {
                let _ = release_rx.recv();
                Ok(())
            }),
        );
        assert!(scheduler.read_timeout().is_some());
        scheduler.step().await.ok();
        assert!(scheduler.read_timeout().is_some());
        let _ = release_tx.send(());
    }

    #[tokio::test]
    async fn test_event_resets_idle_counter() {
        let config = SessionConfig::default().with_idle_iterations(Some(1));
        let script = vec![None, None, key("x"), None];
        let mut scheduler = scheduler(script, CommandRegistry::new(), config);
        for _ in 0..4 {
            scheduler.step().await.ok();
        }
        let timeouts = &scheduler.driver().timeouts;
        assert!(timeouts[2].is_none());
        assert!(timeouts[3].is_some());
    }

    #[tokio::test]
    async fn test_failing_command_is_recorded_and_loop_continues() {
        let mut registry = CommandRegistry::new();
        registry.add("boom", "", Scope::Global, &["b"], |_| anyhow::bail!("kaboom"));
        registry.add("panic", "", Scope::Global, &["p"], |_| panic!("oh no"));
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        registry.add("count", "", Scope::Global, &["c"], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let script = vec![key("b"), key("p"), key("c")];
        let mut scheduler = scheduler(script, registry, SessionConfig::default());
        for _ in 0..3 {
            assert_eq!(scheduler.step().await.ok(), Some(None));
        }

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        let errors: Vec<_> = scheduler.context().errors().iter().map(|e| e.summary().to_string()).collect();
        assert_eq!(errors, vec!["kaboom".to_string(), "panicked: oh no".to_string()]);
        assert_eq!(scheduler.driver().frames, 3);
    }

    #[tokio::test]
    async fn test_replay_runs_before_input_one_per_iteration() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut registry = CommandRegistry::new();
        for name in ["first", "second", "live"] {
            let order = order.clone();
            registry.add(name, "", Scope::Global, &[&name[..1]], move |_| {
                order.lock().push(name);
                Ok(())
            });
        }

        let mut scheduler = scheduler(vec![key("l")], registry, SessionConfig::default());
        scheduler.context_mut().queue_replay("first");
        scheduler.context_mut().queue_replay("s");

        scheduler.step().await.ok();
        assert_eq!(*order.lock(), vec!["first"]);
        assert!(scheduler.driver().timeouts.is_empty());

        scheduler.step().await.ok();
        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert!(scheduler.driver().timeouts.is_empty());

        scheduler.step().await.ok();
        assert_eq!(*order.lock(), vec!["first", "second", "live"]);
    }

    #[tokio::test]
    async fn test_quit_returns_last_error() {
        let mut registry = CommandRegistry::new();
        registry.add("boom", "", Scope::Global, &["b"], |_| anyhow::bail!("kaboom"));
        let mut scheduler = scheduler(vec![key("b"), key("^Q")], registry, SessionConfig::default());

        let outcome = scheduler.run().await.ok();
        assert_eq!(
            outcome,
            Some(SessionOutcome::ForcedQuit {
                last_error: Some("command boom (b)\nkaboom".to_string())
            })
        );
    }

    #[tokio::test]
    async fn test_quit_without_errors() {
        let mut scheduler = scheduler(vec![key("^Q")], CommandRegistry::new(), SessionConfig::default());
        assert_eq!(
            scheduler.run().await.ok(),
            Some(SessionOutcome::ForcedQuit { last_error: None })
        );
    }

    #[tokio::test]
    async fn test_session_finishes_when_views_closed() {
        let mut registry = CommandRegistry::new();
        registry.add("quit-view", "", Scope::Global, &["q"], |ctx| {
            ctx.pop();
            Ok(())
        });
        let mut scheduler = scheduler(vec![key("q")], registry, SessionConfig::default());
        assert_eq!(scheduler.run().await.ok(), Some(SessionOutcome::Finished));
    }

    #[tokio::test]
    async fn test_return_with_value() {
        let mut registry = CommandRegistry::new();
        registry.add("pick", "", Scope::Global, &["^J"], |ctx| {
            ctx.return_with("picked");
            Ok(())
        });
        let mut scheduler = scheduler(vec![key("^J")], registry, SessionConfig::default());
        assert_eq!(
            scheduler.run().await.ok(),
            Some(SessionOutcome::Returned("picked".to_string()))
        );
    }

    #[tokio::test]
    async fn test_closing_primary_collapses_to_secondary() {
        let mut registry = CommandRegistry::new();
        registry.add("close-primary", "", Scope::Global, &["x"], |ctx| {
            ctx.pop();
            Ok(())
        });
        let config = SessionConfig::default().with_split(50);
        let mut scheduler = scheduler(vec![key("x"), None], registry, config);
        scheduler
            .context_mut()
            .push_to(Pane::Secondary, Box::new(RecordingView::new("other")));

        scheduler.step().await.ok();
        assert!(scheduler.context().layout().secondary().is_present());

        scheduler.step().await.ok();
        assert_eq!(scheduler.context().active_pane(), Pane::Secondary);
        assert_eq!(
            scheduler.context().layout().config().map(|c| c.split_percent),
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_task_failure_is_attributed_to_view() {
        let mut scheduler = scheduler(vec![None, None], CommandRegistry::new(), SessionConfig::default());
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        scheduler.context_mut().spawn(
            "fetch",
            Box::new(move || -> anyhow::Result<()> {
                let _ = done_tx.send(());
                anyhow::bail!("network down")
            }),
        );
        let _ = done_rx.recv();
        for _ in 0..50 {
            scheduler.reconcile_tasks();
            if scheduler.context().tasks().outstanding_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let error = scheduler.context().last_error().map(|e| e.to_string());
        assert_eq!(error.as_deref(), Some("main: fetch\nnetwork down"));
    }

    #[tokio::test]
    async fn test_mouse_handler_receives_pane_target() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let mut registry = CommandRegistry::new();
        let sink = seen.clone();
        registry.bind_mouse(
            Scope::Global,
            "BUTTON1_PRESSED",
            MouseAction::handler(move |_, target| {
                *sink.lock() = Some(target.clone());
                Ok(())
            }),
        );
        let click = RawMouse::new(2, 7, ButtonState::BUTTON1_PRESSED);
        let mut scheduler = scheduler(
            vec![Some(RawEvent::Mouse(click))],
            registry,
            SessionConfig::default(),
        );
        let view = RecordingView::new("clicked");
        let log = view.log();
        scheduler.context_mut().push(Box::new(view));

        scheduler.step().await.ok();
        let target = seen.lock().clone();
        assert_eq!(target.map(|t| (t.pane, t.x, t.y)), Some((Pane::Primary, 2, 7)));
        assert_eq!(log.lock().mouse, vec![(2, 7)]);
    }

    #[tokio::test]
    async fn test_load_panic_is_recorded_and_loop_continues() {
        let mut scheduler = scheduler(vec![None, None], CommandRegistry::new(), SessionConfig::default());
        scheduler
            .context_mut()
            .push(Box::new(RecordingView::new("loader").panicking_load()));

        assert_eq!(scheduler.step().await.ok(), Some(None));
        assert_eq!(scheduler.step().await.ok(), Some(None));

        assert_eq!(scheduler.driver().frames, 2);
        assert_eq!(
            scheduler.context().last_error().map(|e| e.to_string()),
            Some("drawing loader\npanicked: load blew up".to_string())
        );
    }

    #[tokio::test]
    async fn test_click_on_inactive_pane_activates_it_first() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut registry = CommandRegistry::new();
        let sink = seen.clone();
        registry.add("note-pane", "", Scope::Global, &[], move |ctx| {
            sink.lock().push(ctx.active_pane());
            Ok(())
        });
        registry.bind_mouse(
            Scope::view("pager"),
            "BUTTON1_PRESSED",
            MouseAction::Commands(vec!["note-pane".into()]),
        );

        let click = RawMouse::new(5, 20, ButtonState::BUTTON1_PRESSED);
        let config = SessionConfig::default().with_split(50);
        let mut scheduler = scheduler(vec![Some(RawEvent::Mouse(click))], registry, config);
        let pager = RecordingView::new("pager").with_kind("pager");
        let log = pager.log();
        scheduler
            .context_mut()
            .push_to(Pane::Secondary, Box::new(pager));
        assert_eq!(scheduler.context().active_pane(), Pane::Primary);

        scheduler.step().await.ok();
        assert_eq!(*seen.lock(), vec![Pane::Secondary]);
        assert_eq!(scheduler.context().active_pane(), Pane::Secondary);
        assert_eq!(log.lock().mouse, vec![(5, 8)]);
    }

    #[tokio::test]
    async fn test_pending_escape_clamps_read_timeout() {
        let mut registry = CommandRegistry::new();
        registry.add("alt-x", "", Scope::Global, &["^[x"], |_| Ok(()));
        let config = SessionConfig::default().with_idle_iterations(Some(0));
        let (busy, esc) = (config.busy_timeout(), config.esc_delay());
        let mut scheduler = scheduler(vec![key("^["), None, None], registry, config);

        for _ in 0..3 {
            scheduler.step().await.ok();
        }
        assert_eq!(scheduler.driver().timeouts, vec![Some(busy), Some(esc), None]);
    }

    #[tokio::test]
    async fn test_cursor_checked_after_each_command() {
        let mut registry = CommandRegistry::new();
        registry.add("noop", "", Scope::Global, &["x"], |_| Ok(()));
        let mut scheduler = scheduler(vec![key("x")], registry, SessionConfig::default());
        let view = RecordingView::new("cursor");
        let log = view.log();
        scheduler.context_mut().push(Box::new(view));

        scheduler.step().await.ok();
        assert_eq!(log.lock().cursor_checks, 1);
    }

    #[tokio::test]
    async fn test_cursor_hidden_for_the_session() {
        let mut scheduler = scheduler(vec![key("^Q")], CommandRegistry::new(), SessionConfig::default());
        scheduler.run().await.ok();
        assert_eq!(scheduler.driver().cursor_changes, vec![false, true]);
    }

    #[tokio::test]
    async fn test_run_without_views_is_an_error() {
        let mut scheduler = Scheduler::new(
            ScriptedDriver::new(80, 24, vec![]),
            CommandRegistry::new(),
            SessionConfig::default(),
        );
        let result = scheduler.run().await;
        assert!(matches!(result, Err(SessionError::NothingToShow)));
        assert_eq!(scheduler.driver().frames, 0);
    }

    #[tokio::test]
    async fn test_completed_task_refreshes_owner() {
        let mut scheduler = scheduler(vec![], CommandRegistry::new(), SessionConfig::default());
        let view = RecordingView::new("loader");
        let log = view.log();
        let id = scheduler.context_mut().push(Box::new(view));
        scheduler
            .context_mut()
            .spawn_for(id, "load", Box::new(|| -> anyhow::Result<()> { Ok(()) }));

        for _ in 0..50 {
            scheduler.reconcile_tasks();
            if scheduler.context().tasks().outstanding_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(log.lock().refreshes, 1);
    }
}
