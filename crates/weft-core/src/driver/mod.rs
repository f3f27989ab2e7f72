//! The console driver contract and a shared back-buffer surface.
//!
//! The runtime never talks to a terminal directly. It writes cells through a
//! [`ConsoleDriver`] and pumps input through a
//! [`MainLoopDriver`](crate::scheduler::MainLoopDriver); [`crossterm`] provides
//! the default implementations and [`testing`](crate::testing) a headless one.

pub mod crossterm;

use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect};
use ratatui::style::Style;
use std::any::Any;
use unicode_width::UnicodeWidthChar;

/// Cell-level output primitives consumed by the runtime.
///
/// The `Any` bound lets tests reach the concrete driver behind an
/// [`Application`](crate::Application) (see
/// [`Application::driver_as`](crate::Application::driver_as)).
pub trait ConsoleDriver: Any {
    fn cols(&self) -> u16;
    fn rows(&self) -> u16;

    /// Take over the terminal. Failures surface as
    /// [`Error::DriverInit`](crate::Error::DriverInit) and are not retried.
    fn init(&mut self) -> crate::Result<()>;

    /// Give the terminal back.
    fn end(&mut self) -> crate::Result<()>;

    /// Move the output cursor. Coordinates outside the screen are allowed;
    /// writes there are discarded.
    fn move_to(&mut self, col: i32, row: i32);

    /// Write one rune at the output cursor with the current attribute and
    /// advance by its display width.
    fn add_rune(&mut self, ch: char);

    fn add_str(&mut self, s: &str) {
        for ch in s.chars() {
            self.add_rune(ch);
        }
    }

    fn set_attribute(&mut self, style: Style);

    /// The rectangle writes are confined to.
    fn clip(&self) -> Rect;
    fn set_clip(&mut self, clip: Rect);

    /// Flush pending cells and the cursor to the terminal.
    fn refresh(&mut self) -> crate::Result<()>;

    /// Clear every cell; the next refresh repaints the whole screen.
    fn clear_contents(&mut self);

    /// The cells written so far.
    fn contents(&self) -> &Buffer;

    /// Where the terminal cursor should be shown after the next refresh.
    fn set_cursor(&mut self, position: Option<Position>);

    /// Adopt a new terminal size reported by the input side.
    fn resize(&mut self, cols: u16, rows: u16);

    /// Restore normal mouse handling (selection, scrollback).
    fn cook_mouse(&mut self);
    /// Capture mouse events for the application.
    fn uncook_mouse(&mut self);

    /// Hand the terminal to the shell and stop the process (job control).
    fn suspend(&mut self) -> crate::Result<()>;
}

/// A back buffer with an output cursor, attribute and clip, shared by the
/// drivers in this crate.
#[derive(Debug, Clone)]
pub struct Surface {
    buffer: Buffer,
    col: i32,
    row: i32,
    attribute: Style,
    clip: Rect,
}

impl Surface {
    pub fn new(cols: u16, rows: u16) -> Self {
        let area = Rect::new(0, 0, cols, rows);
        Self {
            buffer: Buffer::empty(area),
            col: 0,
            row: 0,
            attribute: Style::default(),
            clip: area,
        }
    }

    pub fn area(&self) -> Rect {
        self.buffer.area
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn move_to(&mut self, col: i32, row: i32) {
        self.col = col;
        self.row = row;
    }

    pub fn set_attribute(&mut self, style: Style) {
        self.attribute = style;
    }

    pub fn clip(&self) -> Rect {
        self.clip
    }

    pub fn set_clip(&mut self, clip: Rect) {
        self.clip = clip.intersection(self.buffer.area);
    }

    pub fn add_rune(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0) as i32;
        if width == 0 {
            return;
        }
        if let Some(position) = self.visible(self.col, self.row) {
            if let Some(cell) = self.buffer.cell_mut(position) {
                cell.set_char(ch).set_style(self.attribute);
            }
            // The trailing half of a wide rune must not keep a stale symbol.
            if width > 1 {
                if let Some(position) = self.visible(self.col + 1, self.row) {
                    if let Some(cell) = self.buffer.cell_mut(position) {
                        cell.set_symbol("").set_style(self.attribute);
                    }
                }
            }
        }
        self.col += width;
    }

    pub fn clear(&mut self) {
        self.buffer.reset();
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let area = Rect::new(0, 0, cols, rows);
        self.buffer.resize(area);
        self.buffer.reset();
        self.clip = area;
    }

    fn visible(&self, col: i32, row: i32) -> Option<Position> {
        let col = u16::try_from(col).ok()?;
        let row = u16::try_from(row).ok()?;
        let position = Position::new(col, row);
        self.clip.contains(position).then_some(position)
    }
}
