//! Pane layout
//!
//! Splits the screen into a main pane and an optional secondary pane from
//! a signed split percentage. Pane handles are only re-created when the
//! terminal identity or the computed geometry changes.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    widgets::{Clear, Widget},
};

/// Geometry derived from the split percentage and terminal size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneConfig {
    /// Requested secondary pane height in percent; the sign selects
    /// top (negative) or bottom (positive) placement
    pub split_percent: i32,
    pub total_height: u16,
    pub total_width: u16,
    /// Rows given to the secondary pane
    pub split_line: u16,
}

/// Compute the geometry for a split percentage. Pure and deterministic.
pub fn compute_layout(split_percent: i32, height: u16, width: u16) -> PaneConfig {
    let magnitude = split_percent.unsigned_abs().min(100);
    let split_line = (magnitude * u32::from(height) / 100) as u16;

    PaneConfig {
        split_percent,
        total_height: height,
        total_width: width,
        split_line,
    }
}

impl PaneConfig {
    /// Whether a second pane is shown at all
    pub fn has_secondary(&self) -> bool {
        self.split_percent != 0 && self.split_percent.unsigned_abs() < 100
    }

    /// Secondary pane sits above the main pane
    pub fn secondary_on_top(&self) -> bool {
        self.split_percent < 0
    }

    fn main_area(&self) -> Rect {
        if !self.has_secondary() {
            return Rect::new(0, 0, self.total_width, self.total_height);
        }
        let main_height = self.total_height - self.split_line;
        let y = if self.secondary_on_top() {
            self.split_line
        } else {
            0
        };
        Rect::new(0, y, self.total_width, main_height)
    }

    fn secondary_area(&self) -> Option<Rect> {
        if !self.has_secondary() {
            return None;
        }
        let y = if self.secondary_on_top() {
            0
        } else {
            self.total_height - self.split_line
        };
        Some(Rect::new(0, y, self.total_width, self.split_line))
    }
}

/// A sub-region of the screen buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaneHandle {
    /// Live region, valid for the generation it was created in
    Window { area: Rect, generation: u64 },
    /// No pane; erasing or drawing is a no-op
    #[default]
    Absent,
}

impl PaneHandle {
    pub fn area(&self) -> Option<Rect> {
        match self {
            PaneHandle::Window { area, .. } => Some(*area),
            PaneHandle::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, PaneHandle::Window { .. })
    }

    /// Clear this region of the buffer
    pub fn erase(&self, buf: &mut Buffer) {
        if let Some(area) = self.area() {
            let area = area.intersection(*buf.area());
            if !area.is_empty() {
                Clear.render(area, buf);
            }
        }
    }

    /// Row offset of `y` inside this region, if the point is inside it
    pub fn hit(&self, x: u16, y: u16) -> Option<(u16, u16)> {
        let area = self.area()?;
        let inside = x >= area.x && x < area.right() && y >= area.y && y < area.bottom();
        inside.then(|| (x - area.x, y - area.y))
    }
}

/// Owns the pane handles and the `(terminal identity, geometry)` they were built for
#[derive(Debug, Default)]
pub struct PaneLayout {
    applied: Option<(u64, PaneConfig)>,
    main: PaneHandle,
    secondary: PaneHandle,
    generation: u64,
}

impl PaneLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-create the pane handles if the terminal or geometry changed.
    /// Returns true when the handles were re-created.
    pub fn apply(&mut self, identity: u64, config: PaneConfig) -> bool {
        if self.applied == Some((identity, config)) {
            return false;
        }

        self.generation += 1;
        let generation = self.generation;
        self.main = PaneHandle::Window {
            area: config.main_area(),
            generation,
        };
        self.secondary = match config.secondary_area() {
            Some(area) => PaneHandle::Window { area, generation },
            None => PaneHandle::Absent,
        };
        self.applied = Some((identity, config));

        tracing::debug!(
            split = config.split_percent,
            height = config.total_height,
            width = config.total_width,
            generation,
            "Pane layout changed"
        );
        true
    }

    /// Last applied geometry
    pub fn config(&self) -> Option<&PaneConfig> {
        self.applied.as_ref().map(|(_, config)| config)
    }

    pub fn main(&self) -> PaneHandle {
        self.main
    }

    pub fn secondary(&self) -> PaneHandle {
        self.secondary
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_layout_is_pure() {
        for pct in [-250, -100, -99, -50, -1, 0, 1, 33, 50, 99, 100, 150] {
            for (height, width) in [(0, 0), (1, 80), (24, 80), (101, 200), (u16::MAX, 10)] {
                let a = compute_layout(pct, height, width);
                let b = compute_layout(pct, height, width);
                assert_eq!(a, b);
                assert!(a.split_line <= a.total_height, "pct={pct} h={height}");
            }
        }
    }

    #[test]
    fn test_split_line() {
        assert_eq!(compute_layout(25, 100, 80).split_line, 25);
        assert_eq!(compute_layout(-25, 100, 80).split_line, 25);
        assert_eq!(compute_layout(50, 25, 80).split_line, 12);
        assert_eq!(compute_layout(0, 40, 80).split_line, 0);
    }

    #[test]
    fn test_secondary_placement() {
        let mut layout = PaneLayout::new();

        layout.apply(1, compute_layout(25, 100, 80));
        assert_eq!(layout.main().area(), Some(Rect::new(0, 0, 80, 75)));
        assert_eq!(layout.secondary().area(), Some(Rect::new(0, 75, 80, 25)));

        layout.apply(1, compute_layout(-25, 100, 80));
        assert_eq!(layout.secondary().area(), Some(Rect::new(0, 0, 80, 25)));
        assert_eq!(layout.main().area(), Some(Rect::new(0, 25, 80, 75)));
    }

    #[test]
    fn test_secondary_absent_for_zero_and_full() {
        for pct in [0, 100, 150, -100] {
            let mut layout = PaneLayout::new();
            layout.apply(1, compute_layout(pct, 24, 80));
            assert_eq!(layout.secondary(), PaneHandle::Absent);
            assert_eq!(layout.main().area(), Some(Rect::new(0, 0, 80, 24)));

            // Drawing to the absent pane is a no-op
            let mut buf = Buffer::empty(Rect::new(0, 0, 80, 24));
            layout.secondary().erase(&mut buf);
            assert_eq!(layout.secondary().hit(0, 0), None);
        }
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut layout = PaneLayout::new();
        let config = compute_layout(30, 40, 120);

        assert!(layout.apply(7, config));
        let generation = layout.generation();
        assert!(!layout.apply(7, config));
        assert!(!layout.apply(7, compute_layout(30, 40, 120)));
        assert_eq!(layout.generation(), generation);

        // New terminal buffer or new geometry re-creates the handles
        assert!(layout.apply(8, config));
        assert!(layout.apply(8, compute_layout(30, 41, 120)));
        assert_eq!(layout.generation(), generation + 2);
    }

    #[test]
    fn test_erase_clamps_to_buffer() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 10, 5));
        buf.set_string(0, 0, "hello", ratatui::style::Style::default());
        let handle = PaneHandle::Window {
            area: Rect::new(0, 0, 20, 20),
            generation: 1,
        };
        handle.erase(&mut buf);
        assert_eq!(buf[(0, 0)].symbol(), " ");
    }

    #[test]
    fn test_hit_relative_coordinates() {
        let handle = PaneHandle::Window {
            area: Rect::new(0, 10, 80, 5),
            generation: 1,
        };
        assert_eq!(handle.hit(4, 12), Some((4, 2)));
        assert_eq!(handle.hit(4, 15), None);
        assert_eq!(handle.hit(4, 9), None);
    }
}
