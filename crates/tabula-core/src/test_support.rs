//! In-memory driver and view doubles for unit tests

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use ratatui::{
    buffer::Buffer,
    layout::{Rect, Size},
};

use crate::driver::{RawEvent, TerminalDriver};
use crate::error::DriverError;
use crate::tasks::Job;
use crate::view::View;

/// Plays back a fixed script of reads. `None` entries are timeouts; an
/// exhausted script answers with the quit key so runaway loops end.
pub struct ScriptedDriver {
    script: VecDeque<Option<RawEvent>>,
    pub timeouts: Vec<Option<Duration>>,
    pub buffer: Buffer,
    pub frames: usize,
    /// Every cursor visibility change, in order
    pub cursor_changes: Vec<bool>,
    size: Size,
    identity: u64,
}

impl ScriptedDriver {
    pub fn new(width: u16, height: u16, script: Vec<Option<RawEvent>>) -> Self {
        Self {
            script: script.into(),
            timeouts: Vec::new(),
            buffer: Buffer::empty(Rect::new(0, 0, width, height)),
            frames: 0,
            cursor_changes: Vec::new(),
            size: Size::new(width, height),
            identity: 1,
        }
    }
}

#[async_trait]
impl TerminalDriver for ScriptedDriver {
    fn identity(&self) -> u64 {
        self.identity
    }

    fn size(&self) -> Result<Size, DriverError> {
        Ok(self.size)
    }

    async fn read_event(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<RawEvent>, DriverError> {
        self.timeouts.push(timeout);
        let event = self
            .script
            .pop_front()
            .unwrap_or_else(|| Some(RawEvent::Key("^Q".to_string())));
        if let Some(RawEvent::Resize(size)) = &event {
            self.size = *size;
            self.identity += 1;
        }
        Ok(event)
    }

    fn draw(&mut self, paint: &mut dyn FnMut(&mut Buffer)) -> Result<(), DriverError> {
        let area = Rect::new(0, 0, self.size.width, self.size.height);
        if self.buffer.area != area {
            self.buffer.resize(area);
        }
        paint(&mut self.buffer);
        self.frames += 1;
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) -> Result<(), DriverError> {
        self.cursor_changes.push(visible);
        Ok(())
    }
}

/// Everything a [`RecordingView`] was asked to do
#[derive(Debug, Default)]
pub struct RecordingLog {
    pub draws: usize,
    pub refreshes: usize,
    pub cursor_checks: usize,
    pub mouse: Vec<(u16, u16)>,
    pub last_area: Option<Rect>,
}

/// View that records calls instead of rendering anything
pub struct RecordingView {
    name: String,
    kind: String,
    fail_draw: bool,
    panic_load: bool,
    panic_refresh: bool,
    log: Arc<Mutex<RecordingLog>>,
}

impl RecordingView {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "recording".to_string(),
            fail_draw: false,
            panic_load: false,
            panic_refresh: false,
            log: Arc::new(Mutex::new(RecordingLog::default())),
        }
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = kind.to_string();
        self
    }

    pub fn failing_draw(mut self) -> Self {
        self.fail_draw = true;
        self
    }

    pub fn panicking_load(mut self) -> Self {
        self.panic_load = true;
        self
    }

    pub fn panicking_refresh(mut self) -> Self {
        self.panic_refresh = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<RecordingLog>> {
        self.log.clone()
    }
}

impl View for RecordingView {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn ensure_loaded(&mut self) -> Option<Job> {
        if self.panic_load {
            panic!("load blew up");
        }
        None
    }

    fn draw(&mut self, area: Rect, _buf: &mut Buffer) -> anyhow::Result<()> {
        let mut log = self.log.lock();
        log.draws += 1;
        log.last_area = Some(area);
        if self.fail_draw {
            anyhow::bail!("cannot draw {}", self.name);
        }
        Ok(())
    }

    fn refresh(&mut self) {
        self.log.lock().refreshes += 1;
        if self.panic_refresh {
            panic!("refresh blew up");
        }
    }

    fn check_cursor(&mut self) -> anyhow::Result<()> {
        self.log.lock().cursor_checks += 1;
        Ok(())
    }

    fn set_mouse(&mut self, x: u16, y: u16) {
        self.log.lock().mouse.push((x, y));
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
