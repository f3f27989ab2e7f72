use crate::driver::ConsoleDriver;
use crate::event::Point;
use crate::scheme::ColorScheme;
use ratatui::layout::Rect;
use ratatui::style::Style;

/// A view's window onto the console driver during [`Widget::draw`](crate::Widget::draw).
///
/// Coordinates are relative to the view's bounds. The driver clip is already
/// narrowed to the part of the view visible through its ancestors.
pub struct Canvas<'a> {
    driver: &'a mut dyn ConsoleDriver,
    origin: Point,
    bounds: Rect,
    scheme: ColorScheme,
    has_focus: bool,
    enabled: bool,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(
        driver: &'a mut dyn ConsoleDriver,
        origin: Point,
        bounds: Rect,
        scheme: ColorScheme,
        has_focus: bool,
        enabled: bool,
    ) -> Self {
        Self {
            driver,
            origin,
            bounds,
            scheme,
            has_focus,
            enabled,
        }
    }

    /// The view's bounds: origin (0, 0) and the size of its frame.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn has_focus(&self) -> bool {
        self.has_focus
    }

    pub fn scheme(&self) -> &ColorScheme {
        &self.scheme
    }

    /// The attribute for plain text in the view's current state.
    pub fn normal_attribute(&self) -> Style {
        if self.enabled {
            self.scheme.text(self.has_focus)
        } else {
            self.scheme.disabled
        }
    }

    pub fn hot_attribute(&self) -> Style {
        if self.enabled {
            self.scheme.hot(self.has_focus)
        } else {
            self.scheme.disabled
        }
    }

    pub fn set_attribute(&mut self, style: Style) {
        self.driver.set_attribute(style);
    }

    pub fn move_to(&mut self, col: i32, row: i32) {
        self.driver
            .move_to(self.origin.x + col, self.origin.y + row);
    }

    pub fn add_rune(&mut self, ch: char) {
        self.driver.add_rune(ch);
    }

    pub fn add_str(&mut self, s: &str) {
        self.driver.add_str(s);
    }

    /// Write `s` at (`col`, `row`) with `style`.
    pub fn print(&mut self, col: i32, row: i32, s: &str, style: Style) {
        self.set_attribute(style);
        self.move_to(col, row);
        self.add_str(s);
    }

    /// Fill the whole view with blanks in the normal attribute.
    pub fn clear(&mut self) {
        let bounds = self.bounds;
        let style = self.normal_attribute();
        self.fill(bounds, ' ', style);
    }

    /// Fill `region` (bounds coordinates) with `ch`.
    pub fn fill(&mut self, region: Rect, ch: char, style: Style) {
        self.set_attribute(style);
        for row in region.top()..region.bottom() {
            self.move_to(i32::from(region.x), i32::from(row));
            for _ in region.left()..region.right() {
                self.add_rune(ch);
            }
        }
    }

    /// Draw a single-line box along the edges of `region`.
    pub fn draw_box(&mut self, region: Rect, style: Style) {
        if region.width < 2 || region.height < 2 {
            return;
        }
        self.set_attribute(style);
        let (left, top) = (i32::from(region.left()), i32::from(region.top()));
        let (right, bottom) = (
            i32::from(region.right()) - 1,
            i32::from(region.bottom()) - 1,
        );
        self.move_to(left, top);
        self.add_rune('┌');
        for _ in left + 1..right {
            self.add_rune('─');
        }
        self.add_rune('┐');
        for row in top + 1..bottom {
            self.move_to(left, row);
            self.add_rune('│');
            self.move_to(right, row);
            self.add_rune('│');
        }
        self.move_to(left, bottom);
        self.add_rune('└');
        for _ in left + 1..right {
            self.add_rune('─');
        }
        self.add_rune('┘');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{buffer_to_string, FakeDriver};

    #[test]
    fn coordinates_are_view_relative() {
        let mut driver = FakeDriver::new(6, 3);
        let mut canvas = Canvas::new(
            &mut driver,
            Point::new(2, 1),
            Rect::new(0, 0, 3, 1),
            ColorScheme::default(),
            false,
            true,
        );
        canvas.print(0, 0, "ab", Style::default());
        assert_eq!(buffer_to_string(driver.contents()), "      \n  ab  \n      \n");
    }

    #[test]
    fn box_outlines_region() {
        let mut driver = FakeDriver::new(4, 3);
        let mut canvas = Canvas::new(
            &mut driver,
            Point::default(),
            Rect::new(0, 0, 4, 3),
            ColorScheme::default(),
            true,
            true,
        );
        canvas.draw_box(Rect::new(0, 0, 4, 3), Style::default());
        assert_eq!(buffer_to_string(driver.contents()), "┌──┐\n│  │\n└──┘\n");
    }

    #[test]
    fn disabled_views_use_disabled_attribute() {
        let mut driver = FakeDriver::new(1, 1);
        let scheme = ColorScheme::default();
        let canvas = Canvas::new(
            &mut driver,
            Point::default(),
            Rect::new(0, 0, 1, 1),
            scheme,
            true,
            false,
        );
        assert_eq!(canvas.normal_attribute(), scheme.disabled);
    }
}
