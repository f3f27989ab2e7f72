use ratatui::style::{Color, Modifier, Style};

/// The attributes a view draws with.
///
/// A view without its own scheme inherits the one of its nearest ancestor
/// that has one, falling back to the application's base scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorScheme {
    /// Text of an unfocused view.
    pub normal: Style,
    /// Text of a focused view.
    pub focus: Style,
    /// Hot-key letter of an unfocused view.
    pub hot_normal: Style,
    /// Hot-key letter of a focused view.
    pub hot_focus: Style,
    pub disabled: Style,
}

impl ColorScheme {
    /// The attribute for plain text given the view's focus state.
    pub fn text(&self, focused: bool) -> Style {
        if focused {
            self.focus
        } else {
            self.normal
        }
    }

    /// The attribute for hot-key letters given the view's focus state.
    pub fn hot(&self, focused: bool) -> Style {
        if focused {
            self.hot_focus
        } else {
            self.hot_normal
        }
    }

    /// A scheme suited to dialogs drawn over the base scheme.
    pub fn dialog() -> Self {
        Self {
            normal: Style::new().fg(Color::Black).bg(Color::Gray),
            focus: Style::new().fg(Color::White).bg(Color::DarkGray),
            hot_normal: Style::new().fg(Color::Blue).bg(Color::Gray),
            hot_focus: Style::new()
                .fg(Color::LightBlue)
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
            disabled: Style::new().fg(Color::DarkGray).bg(Color::Gray),
        }
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            normal: Style::new().fg(Color::White).bg(Color::Blue),
            focus: Style::new().fg(Color::Black).bg(Color::Cyan),
            hot_normal: Style::new()
                .fg(Color::Yellow)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            hot_focus: Style::new()
                .fg(Color::Blue)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            disabled: Style::new().fg(Color::Gray).bg(Color::Blue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_state_selects_attribute() {
        let scheme = ColorScheme::default();
        assert_eq!(scheme.text(false), scheme.normal);
        assert_eq!(scheme.text(true), scheme.focus);
        assert_eq!(scheme.hot(true), scheme.hot_focus);
    }
}
