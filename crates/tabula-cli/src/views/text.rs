//! Line-numbered text view
//!
//! Holds its lines behind a shared lock so a background load can fill
//! them while the session keeps drawing. Wrapped rows are cached for
//! one width and dropped on `refresh()`.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
};
use tabula_core::{Job, View};

/// Binding scope of text views
pub const KIND: &str = "text";

const TAB_WIDTH: usize = 4;

/// Wrapped segments of every line for one text width
struct WrapCache {
    width: usize,
    lines: Vec<Vec<String>>,
}

pub struct TextView {
    name: String,
    kind: String,
    source: Option<PathBuf>,
    lines: Arc<RwLock<Vec<String>>>,
    needs_load: bool,
    cursor: usize,
    top: usize,
    wrap: bool,
    wrapped: Option<WrapCache>,
    /// Line index shown on each row of the last frame
    rows: Vec<usize>,
    height: usize,
}

impl TextView {
    pub fn from_lines(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: KIND.to_string(),
            source: None,
            lines: Arc::new(RwLock::new(lines)),
            needs_load: false,
            cursor: 0,
            top: 0,
            wrap: false,
            wrapped: None,
            rows: Vec::new(),
            height: 0,
        }
    }

    /// Text read from `path` in the background on first draw
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut view = Self::from_lines(name, Vec::new());
        view.source = Some(path);
        view.needs_load = true;
        view
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn line_count(&self) -> usize {
        self.lines.read().len()
    }

    #[cfg(test)]
    pub fn line(&self, index: usize) -> Option<String> {
        self.lines.read().get(index).cloned()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub fn top(&self) -> usize {
        self.top
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let last = self.line_count().saturating_sub(1);
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
    }

    /// Move by one screen of rows
    pub fn page(&mut self, pages: isize) {
        let step = self.height.max(1) as isize;
        self.move_cursor(step.saturating_mul(pages));
    }

    pub fn go_top(&mut self) {
        self.cursor = 0;
    }

    pub fn go_bottom(&mut self) {
        self.cursor = self.line_count().saturating_sub(1);
    }

    pub fn toggle_wrap(&mut self) -> bool {
        self.wrap = !self.wrap;
        self.wrapped = None;
        self.wrap
    }

    /// Re-read the backing file on the next draw. Returns false for
    /// views that have no file.
    pub fn reload(&mut self) -> bool {
        if self.source.is_none() {
            return false;
        }
        self.needs_load = true;
        true
    }

    /// Put the cursor on the line drawn at `row` of the last frame
    pub fn click(&mut self, row: u16) -> bool {
        match self.rows.get(usize::from(row)) {
            Some(&line) => {
                self.cursor = line;
                true
            }
            None => false,
        }
    }

    fn load_job(&self, path: PathBuf) -> Job {
        let lines = self.lines.clone();
        Box::new(move || -> Result<()> {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let loaded: Vec<String> = text.lines().map(expand_tabs).collect();
            tracing::debug!(path = %path.display(), lines = loaded.len(), "Loaded text");
            *lines.write() = loaded;
            Ok(())
        })
    }

    fn ensure_wrapped(&mut self, lines: &[String], width: usize) {
        let fresh = self
            .wrapped
            .as_ref()
            .is_some_and(|cache| cache.width == width && cache.lines.len() == lines.len());
        if fresh {
            return;
        }
        let wrapped = lines
            .iter()
            .map(|line| {
                textwrap::wrap(line, width)
                    .into_iter()
                    .map(|segment| segment.into_owned())
                    .collect()
            })
            .collect();
        self.wrapped = Some(WrapCache {
            width,
            lines: wrapped,
        });
    }

    /// Rows a line takes on screen
    fn row_count(&self, line: usize) -> usize {
        match (&self.wrapped, self.wrap) {
            (Some(cache), true) => cache.lines.get(line).map_or(1, |rows| rows.len().max(1)),
            _ => 1,
        }
    }

    /// Scroll so the cursor line is fully visible. Walks back from the
    /// cursor, so the cost is bounded by the pane height.
    fn scroll_to_cursor(&mut self) {
        if self.cursor <= self.top {
            self.top = self.cursor;
            return;
        }
        let height = self.height.max(1);
        let mut first = self.cursor;
        let mut needed = self.row_count(first);
        while first > self.top {
            let rows = self.row_count(first - 1);
            if needed + rows > height {
                break;
            }
            needed += rows;
            first -= 1;
        }
        self.top = first;
    }
}

impl View for TextView {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn ensure_loaded(&mut self) -> Option<Job> {
        if !self.needs_load {
            return None;
        }
        self.needs_load = false;
        let path = self.source.clone()?;
        Some(self.load_job(path))
    }

    fn draw(&mut self, area: Rect, buf: &mut Buffer) -> Result<()> {
        let shared = self.lines.clone();
        let lines = shared.read();
        let digits = lines.len().max(1).to_string().len();
        let gutter = digits + 1;
        let text_width = usize::from(area.width).saturating_sub(gutter);
        if text_width == 0 || area.height == 0 {
            return Ok(());
        }

        if self.wrap {
            self.ensure_wrapped(&lines, text_width);
        }
        self.height = usize::from(area.height);
        self.cursor = self.cursor.min(lines.len().saturating_sub(1));
        self.scroll_to_cursor();

        let number_style = Style::default().add_modifier(Modifier::DIM);
        let cursor_style = Style::default().add_modifier(Modifier::REVERSED);
        self.rows.clear();

        let mut y = 0u16;
        let mut index = self.top;
        while y < area.height && index < lines.len() {
            let segments: Vec<&str> = match (&self.wrapped, self.wrap) {
                (Some(cache), true) => cache
                    .lines
                    .get(index)
                    .map(|rows| rows.iter().map(String::as_str).collect())
                    .unwrap_or_default(),
                _ => vec![lines[index].as_str()],
            };
            let segments = if segments.is_empty() { vec![""] } else { segments };

            for (i, segment) in segments.into_iter().enumerate() {
                if y >= area.height {
                    break;
                }
                let row_y = area.y + y;
                if i == 0 {
                    let number = format!("{:>digits$} ", index + 1);
                    buf.set_stringn(area.x, row_y, number, gutter, number_style);
                }
                let text_x = area.x + gutter as u16;
                if index == self.cursor {
                    buf.set_style(Rect::new(text_x, row_y, text_width as u16, 1), cursor_style);
                }
                buf.set_stringn(text_x, row_y, segment, text_width, Style::default());
                self.rows.push(index);
                y += 1;
            }
            index += 1;
        }
        Ok(())
    }

    fn refresh(&mut self) {
        self.wrapped = None;
    }

    fn check_cursor(&mut self) -> Result<()> {
        let last = self.line_count().saturating_sub(1);
        self.cursor = self.cursor.min(last);
        self.top = self.top.min(self.cursor);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn expand_tabs(line: &str) -> String {
    line.replace('\t', &" ".repeat(TAB_WIDTH))
}
