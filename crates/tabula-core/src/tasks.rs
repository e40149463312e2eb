//! Background task registry
//!
//! Jobs run on worker threads and report completion over a channel. The
//! scheduler drains that channel once per iteration; nothing here ever
//! blocks the coordinating thread or touches the terminal.

use std::{collections::HashMap, fmt, time::Instant};

use tokio::sync::mpsc;

use crate::error::{run_guarded, RecordedError};
use crate::view::ViewId;

/// Work handed to a background thread
pub type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Bookkeeping for one spawned job
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub id: TaskId,
    /// View that requested the work
    pub view: ViewId,
    pub name: String,
    pub started: Instant,
    pub finished: bool,
    /// Failure captured at the task boundary
    pub error: Option<RecordedError>,
}

/// Completion message sent from the worker thread
struct TaskCompletion {
    id: TaskId,
    error: Option<RecordedError>,
}

/// Tracks outstanding jobs and collects their results
pub struct TaskRegistry {
    outstanding: HashMap<TaskId, TaskHandle>,
    completion_tx: mpsc::UnboundedSender<TaskCompletion>,
    completion_rx: mpsc::UnboundedReceiver<TaskCompletion>,
    next_id: u64,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            outstanding: HashMap::new(),
            completion_tx,
            completion_rx,
            next_id: 1,
        }
    }

    /// Run `job` on a worker thread on behalf of `view`.
    ///
    /// Uses the tokio blocking pool when a runtime is available and a
    /// plain thread otherwise. Errors and panics are captured and
    /// delivered with the completion.
    pub fn spawn(&mut self, view: ViewId, name: impl Into<String>, job: Job) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let name = name.into();

        let tx = self.completion_tx.clone();
        let work = move || {
            let error = run_guarded(job).err();
            // Receiver gone means the session ended; nothing to report to
            let _ = tx.send(TaskCompletion { id, error });
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(work);
            }
            Err(_) => {
                std::thread::spawn(work);
            }
        }

        tracing::debug!(task = %id, view = %view, name = %name, "Spawned background task");
        self.outstanding.insert(
            id,
            TaskHandle {
                id,
                view,
                name,
                started: Instant::now(),
                finished: false,
                error: None,
            },
        );
        id
    }

    /// Tasks spawned and not yet observed finished
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Outstanding tasks owned by `view`
    pub fn outstanding_for(&self, view: ViewId) -> usize {
        self.outstanding
            .values()
            .filter(|task| task.view == view)
            .count()
    }

    /// Drain tasks that finished since the last call; they leave the registry
    pub fn completed(&mut self) -> Vec<TaskHandle> {
        let mut done = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            let Some(mut task) = self.outstanding.remove(&completion.id) else {
                continue;
            };
            task.finished = true;
            task.error = completion.error;
            tracing::debug!(
                task = %task.id,
                elapsed_ms = task.started.elapsed().as_millis() as u64,
                failed = task.error.is_some(),
                "Background task finished"
            );
            done.push(task);
        }
        done
    }
}
