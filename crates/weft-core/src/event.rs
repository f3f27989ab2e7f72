use crate::tree::ViewId;
use crossterm::event::{KeyEvent, KeyModifiers, MouseEventKind};

/// Raw input surfaced by a [`MainLoopDriver`](crate::scheduler::MainLoopDriver).
///
/// Each variant mirrors a [`crossterm::event::Event`] payload, so key codes,
/// modifiers and mouse buttons use the full crossterm API. Mouse positions are
/// converted to signed screen [`Point`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A key press, repeat or release.
    Key(KeyEvent),
    /// A mouse event in screen coordinates.
    Mouse(MouseEvent),
    /// Terminal resized to (columns, rows).
    Resize(u16, u16),
    /// Terminal window gained focus.
    FocusGained,
    /// Terminal window lost focus.
    FocusLost,
    /// Bracketed paste content.
    Paste(String),
}

impl From<crossterm::event::Event> for InputEvent {
    fn from(event: crossterm::event::Event) -> Self {
        match event {
            crossterm::event::Event::Key(k) => InputEvent::Key(k),
            crossterm::event::Event::Mouse(m) => InputEvent::Mouse(MouseEvent::from(m)),
            crossterm::event::Event::Resize(w, h) => InputEvent::Resize(w, h),
            crossterm::event::Event::FocusGained => InputEvent::FocusGained,
            crossterm::event::Event::FocusLost => InputEvent::FocusLost,
            crossterm::event::Event::Paste(s) => InputEvent::Paste(s),
        }
    }
}

/// A signed cell coordinate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A mouse event as seen by a view.
///
/// The runtime rewrites `position` into the receiving view's bounds
/// coordinates before delivery and records the screen offset it subtracted in
/// `offset`, so `position + offset` is always the original screen point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseEvent {
    pub position: Point,
    pub kind: MouseEventKind,
    pub modifiers: KeyModifiers,
    pub offset: Point,
    /// The deepest view under the pointer, if any.
    pub view: Option<ViewId>,
}

impl MouseEvent {
    pub fn new(kind: MouseEventKind, x: i32, y: i32) -> Self {
        Self {
            position: Point::new(x, y),
            kind,
            modifiers: KeyModifiers::NONE,
            offset: Point::default(),
            view: None,
        }
    }

    /// Whether this event only reports pointer movement.
    pub fn is_position_report(&self) -> bool {
        matches!(self.kind, MouseEventKind::Moved)
    }

    pub(crate) fn relocated(&self, position: Point, view: Option<ViewId>) -> Self {
        Self {
            position,
            kind: self.kind,
            modifiers: self.modifiers,
            offset: Point::new(
                self.position.x + self.offset.x - position.x,
                self.position.y + self.offset.y - position.y,
            ),
            view,
        }
    }
}

impl From<crossterm::event::MouseEvent> for MouseEvent {
    fn from(event: crossterm::event::MouseEvent) -> Self {
        Self {
            position: Point::new(i32::from(event.column), i32::from(event.row)),
            kind: event.kind,
            modifiers: event.modifiers,
            offset: Point::default(),
            view: None,
        }
    }
}

/// Lifecycle, grab and terminal notifications raised by the
/// [`Application`](crate::Application).
///
/// Each event is first offered to the widget of the view it concerns (see
/// [`Widget::on_event`](crate::widget::Widget::on_event)), then to every
/// listener registered with
/// [`Application::add_listener`](crate::Application::add_listener). Variants
/// carrying `cancel` are pre-events: setting it to `true` aborts the action
/// with no state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// First iteration of a toplevel's run loop.
    Ready(ViewId),
    /// A toplevel finished its first layout and draw.
    Loaded(ViewId),
    /// A toplevel is about to leave the stack.
    Unloaded(ViewId),
    /// A stop was requested for `toplevel`.
    Closing { toplevel: ViewId, cancel: bool },
    /// A toplevel was popped from the stack.
    Closed(ViewId),
    /// A toplevel's `running` flag was cleared.
    Stopped(ViewId),
    /// `toplevel` became current.
    Activate {
        toplevel: ViewId,
        deactivated: Option<ViewId>,
    },
    /// `toplevel` stopped being current.
    Deactivate {
        toplevel: ViewId,
        activated: Option<ViewId>,
    },
    /// An overlapped child was loaded into the container.
    ChildLoaded { container: ViewId, child: ViewId },
    /// An overlapped child is about to leave the stack.
    ChildUnloaded { container: ViewId, child: ViewId },
    /// An overlapped child was popped from the stack.
    ChildClosed { container: ViewId, child: ViewId },
    /// The overlapped container is the only toplevel left.
    AllChildClosed(ViewId),
    GrabbingMouse { view: ViewId, cancel: bool },
    GrabbedMouse(ViewId),
    UngrabbingMouse { view: ViewId, cancel: bool },
    UngrabbedMouse(ViewId),
    /// The terminal changed size.
    Resized { cols: u16, rows: u16 },
    /// `begin` pushed a toplevel.
    NewRunState(ViewId),
    /// One scheduler iteration completed.
    Iteration,
}

impl AppEvent {
    /// The view whose widget sees this event before application listeners.
    pub fn target(&self) -> Option<ViewId> {
        match self {
            AppEvent::Ready(id)
            | AppEvent::Loaded(id)
            | AppEvent::Unloaded(id)
            | AppEvent::Closed(id)
            | AppEvent::Stopped(id)
            | AppEvent::AllChildClosed(id)
            | AppEvent::GrabbedMouse(id)
            | AppEvent::UngrabbedMouse(id)
            | AppEvent::NewRunState(id) => Some(*id),
            AppEvent::Closing { toplevel, .. }
            | AppEvent::Activate { toplevel, .. }
            | AppEvent::Deactivate { toplevel, .. } => Some(*toplevel),
            AppEvent::ChildLoaded { container, .. }
            | AppEvent::ChildUnloaded { container, .. }
            | AppEvent::ChildClosed { container, .. } => Some(*container),
            AppEvent::GrabbingMouse { view, .. } | AppEvent::UngrabbingMouse { view, .. } => {
                Some(*view)
            }
            AppEvent::Resized { .. } | AppEvent::Iteration => None,
        }
    }

    /// Whether a pre-event was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            AppEvent::Closing { cancel, .. }
            | AppEvent::GrabbingMouse { cancel, .. }
            | AppEvent::UngrabbingMouse { cancel, .. } => *cancel,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, MouseButton};

    #[test]
    fn crossterm_mouse_converts_to_signed_point() {
        let raw = crossterm::event::MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 7,
            row: 3,
            modifiers: KeyModifiers::SHIFT,
        };
        let InputEvent::Mouse(ev) = InputEvent::from(crossterm::event::Event::Mouse(raw)) else {
            panic!("expected mouse event");
        };
        assert_eq!(ev.position, Point::new(7, 3));
        assert_eq!(ev.modifiers, KeyModifiers::SHIFT);
        assert!(ev.view.is_none());
    }

    #[test]
    fn key_events_pass_through() {
        let key = KeyEvent::from(KeyCode::Enter);
        assert_eq!(
            InputEvent::from(crossterm::event::Event::Key(key)),
            InputEvent::Key(key)
        );
    }

    #[test]
    fn relocated_keeps_screen_point_recoverable() {
        let ev = MouseEvent::new(MouseEventKind::Moved, 12, 9);
        let local = ev.relocated(Point::new(2, 4), None);
        assert_eq!(local.position.x + local.offset.x, 12);
        assert_eq!(local.position.y + local.offset.y, 9);
        assert!(local.is_position_report());
    }

    #[test]
    fn only_pre_events_report_cancellation() {
        let mut slot = slotmap::SlotMap::<ViewId, ()>::with_key();
        let id = slot.insert(());
        assert!(AppEvent::Closing {
            toplevel: id,
            cancel: true
        }
        .is_cancelled());
        assert!(!AppEvent::Closed(id).is_cancelled());
        assert_eq!(AppEvent::Resized { cols: 1, rows: 1 }.target(), None);
    }
}
