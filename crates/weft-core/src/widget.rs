//! The behaviour attached to a view and the context it is called with.

use crate::application::Application;
use crate::canvas::Canvas;
use crate::error::Error;
use crate::event::{AppEvent, MouseEvent};
use crate::key::Command;
use crate::tree::{ViewId, ViewTree};
use crossterm::event::KeyEvent;
use ratatui::layout::Position;
use std::any::Any;

/// Behaviour plugged into a [`View`](crate::tree::View).
///
/// Every hook has a default, so a widget implements only what it reacts to.
/// Key and mouse hooks return `true` when they consumed the event, which stops
/// the current dispatch pass. Hooks receive a [`Cx`] giving access to the
/// whole tree; the widget itself is detached from its node for the duration
/// of the call.
pub trait Widget: Any {
    /// Paint the view. Coordinates are relative to the view's bounds and
    /// writes are clipped to them. The default fills the view with its
    /// normal attribute.
    fn draw(&mut self, canvas: &mut Canvas<'_>) {
        canvas.clear();
    }

    /// Hot-key pass: accelerators that work wherever focus is.
    fn on_hot_key(&mut self, _cx: &mut Cx<'_>, _key: &KeyEvent) -> bool {
        false
    }

    /// Normal pass: only views on the focus path see the key, leaf first.
    fn on_key(&mut self, _cx: &mut Cx<'_>, _key: &KeyEvent) -> bool {
        false
    }

    /// Cold-key pass: fallbacks such as a default button reacting to Enter.
    fn on_cold_key(&mut self, _cx: &mut Cx<'_>, _key: &KeyEvent) -> bool {
        false
    }

    fn on_key_up(&mut self, _cx: &mut Cx<'_>, _key: &KeyEvent) -> bool {
        false
    }

    /// A key binding of this view resolved to `command`. Return `true` to
    /// claim it; unclaimed built-in commands fall through to the runtime.
    fn on_command(&mut self, _cx: &mut Cx<'_>, _command: &Command) -> bool {
        false
    }

    /// Mouse input in this view's bounds coordinates.
    fn on_mouse(&mut self, _cx: &mut Cx<'_>, _event: &MouseEvent) -> bool {
        false
    }

    fn on_mouse_enter(&mut self, _cx: &mut Cx<'_>, _event: &MouseEvent) {}

    fn on_mouse_leave(&mut self, _cx: &mut Cx<'_>, _event: &MouseEvent) {}

    fn on_focus_enter(&mut self, _cx: &mut Cx<'_>) {}

    fn on_focus_leave(&mut self, _cx: &mut Cx<'_>) {}

    fn on_layout_started(&mut self, _cx: &mut Cx<'_>) {}

    fn on_layout_complete(&mut self, _cx: &mut Cx<'_>) {}

    /// Where the terminal cursor belongs while this view is the focus leaf,
    /// in bounds coordinates. `None` hides the cursor.
    fn cursor_position(&self) -> Option<Position> {
        None
    }

    /// Lifecycle, grab and resize notifications. Pre-events may be cancelled
    /// by setting their `cancel` field.
    fn on_event(&mut self, _cx: &mut Cx<'_>, _event: &mut AppEvent) {}
}

/// A call into the application deferred until the current dispatch returns.
pub type Deferred = Box<dyn FnOnce(&mut Application)>;

/// Work a widget asks of the application, applied after the current dispatch
/// returns.
pub enum Request {
    /// Stop a toplevel; `None` stops the current one.
    Stop(Option<ViewId>),
    GrabMouse(ViewId),
    UngrabMouse,
    Refresh,
    Suspend,
    Fail(Error),
    /// Run arbitrary code with the application, e.g. to begin a dialog.
    Invoke(Deferred),
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Stop(toplevel) => f.debug_tuple("Stop").field(toplevel).finish(),
            Request::GrabMouse(view) => f.debug_tuple("GrabMouse").field(view).finish(),
            Request::UngrabMouse => f.write_str("UngrabMouse"),
            Request::Refresh => f.write_str("Refresh"),
            Request::Suspend => f.write_str("Suspend"),
            Request::Fail(err) => f.debug_tuple("Fail").field(err).finish(),
            Request::Invoke(_) => f.write_str("Invoke(..)"),
        }
    }
}

/// The context a [`Widget`] hook runs in.
pub struct Cx<'a> {
    tree: &'a mut ViewTree,
    id: ViewId,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(tree: &'a mut ViewTree, id: ViewId) -> Self {
        Self { tree, id }
    }

    /// The view this widget is attached to.
    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn tree(&self) -> &ViewTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ViewTree {
        self.tree
    }

    /// Mark the whole view for redraw.
    pub fn set_needs_display(&mut self) {
        self.tree.set_needs_display_all(self.id);
    }

    /// Focus this view (and every ancestor on the way up).
    pub fn set_focus(&mut self) -> crate::Result<()> {
        self.tree.focus(self.id)
    }

    pub fn has_focus(&self) -> bool {
        self.tree.view(self.id).is_some_and(|v| v.has_focus())
    }

    /// Ask the application to stop `toplevel`, or the current toplevel.
    pub fn request_stop(&mut self, toplevel: Option<ViewId>) {
        self.tree.push_request(Request::Stop(toplevel));
    }

    /// Route all mouse input to this view until released.
    pub fn grab_mouse(&mut self) {
        self.tree.push_request(Request::GrabMouse(self.id));
    }

    pub fn ungrab_mouse(&mut self) {
        self.tree.push_request(Request::UngrabMouse);
    }

    pub fn refresh(&mut self) {
        self.tree.push_request(Request::Refresh);
    }

    pub fn suspend(&mut self) {
        self.tree.push_request(Request::Suspend);
    }

    /// Run `f` with the application once the current dispatch has returned.
    pub fn invoke(&mut self, f: impl FnOnce(&mut Application) + 'static) {
        self.tree.push_request(Request::Invoke(Box::new(f)));
    }

    /// Report a failure to the application's run loop.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.tree
            .push_request(Request::Fail(Error::Callback(message.into())));
    }
}
