//! Per-view key dispatch, command invocation and hit-testing.
//!
//! The [`Application`](crate::Application) drives these across the toplevel
//! stack; here each pass is defined for a single view hierarchy.

use crate::event::{MouseEvent, Point};
use crate::key::{Command, KeyBindingScope};
use crate::tree::{ViewId, ViewTree};
use crate::widget::Request;
use crossterm::event::KeyEvent;
use ratatui::layout::Rect;

fn contains(frame: Rect, x: i32, y: i32) -> bool {
    let (left, top) = (i32::from(frame.x), i32::from(frame.y));
    x >= left && y >= top && x < left + i32::from(frame.width) && y < top + i32::from(frame.height)
}

impl ViewTree {
    fn accepts_input(&self, id: ViewId) -> bool {
        self.view(id)
            .is_some_and(|v| v.is_enabled() && v.is_visible())
    }

    /// Hot-key pass: the view's own hook and hot-key bindings, then every
    /// subview regardless of focus.
    pub fn process_hot_key(&mut self, id: ViewId, key: &KeyEvent) -> bool {
        if !self.accepts_input(id) {
            return false;
        }
        if self
            .with_widget(id, |w, cx| w.on_hot_key(cx, key))
            .unwrap_or(false)
        {
            return true;
        }
        if self.invoke_bindings(id, key, KeyBindingScope::HotKey) {
            return true;
        }
        let subviews = self.subviews(id).to_vec();
        subviews
            .into_iter()
            .any(|child| self.process_hot_key(child, key))
    }

    /// Normal pass: the focused subview first, then the view's own hook and
    /// focused-scope bindings.
    pub fn process_key(&mut self, id: ViewId, key: &KeyEvent) -> bool {
        if !self.accepts_input(id) {
            return false;
        }
        if let Some(focused) = self.node(id).focused() {
            if self.node(focused).has_focus() && self.process_key(focused, key) {
                return true;
            }
        }
        if self
            .with_widget(id, |w, cx| w.on_key(cx, key))
            .unwrap_or(false)
        {
            return true;
        }
        self.invoke_bindings(id, key, KeyBindingScope::Focused)
    }

    /// Cold-key pass: the view's own fallback hook, then every subview.
    pub fn process_cold_key(&mut self, id: ViewId, key: &KeyEvent) -> bool {
        if !self.accepts_input(id) {
            return false;
        }
        if self
            .with_widget(id, |w, cx| w.on_cold_key(cx, key))
            .unwrap_or(false)
        {
            return true;
        }
        let subviews = self.subviews(id).to_vec();
        subviews
            .into_iter()
            .any(|child| self.process_cold_key(child, key))
    }

    /// Key release along the focus path, leaf first.
    pub fn process_key_up(&mut self, id: ViewId, key: &KeyEvent) -> bool {
        if !self.accepts_input(id) {
            return false;
        }
        if let Some(focused) = self.node(id).focused() {
            if self.node(focused).has_focus() && self.process_key_up(focused, key) {
                return true;
            }
        }
        self.with_widget(id, |w, cx| w.on_key_up(cx, key))
            .unwrap_or(false)
    }

    fn invoke_bindings(&mut self, id: ViewId, key: &KeyEvent, scope: KeyBindingScope) -> bool {
        let Some(commands) = self
            .node(id)
            .key_bindings()
            .resolve(key, scope)
            .map(<[Command]>::to_vec)
        else {
            return false;
        };
        tracing::trace!(?id, ?commands, "key binding matched");
        commands
            .iter()
            .any(|command| self.invoke_command(id, command))
    }

    /// Run `command` on `id`: the widget may claim it, otherwise the built-in
    /// behaviour applies. Returns whether anything handled it.
    pub fn invoke_command(&mut self, id: ViewId, command: &Command) -> bool {
        if self
            .with_widget(id, |w, cx| w.on_command(cx, command))
            .unwrap_or(false)
        {
            return true;
        }
        match command {
            Command::NextView => {
                let top = self.toplevel_of(id);
                self.focus_next(top);
                true
            }
            Command::PreviousView => {
                let top = self.toplevel_of(id);
                self.focus_prev(top);
                true
            }
            Command::QuitToplevel => {
                self.push_request(Request::Stop(None));
                true
            }
            Command::Refresh => {
                self.push_request(Request::Refresh);
                true
            }
            Command::Suspend => {
                self.push_request(Request::Suspend);
                true
            }
            Command::Accept | Command::Cancel | Command::Custom(_) => false,
        }
    }

    /// The nearest toplevel at or above `id`, or its root.
    pub fn toplevel_of(&self, id: ViewId) -> ViewId {
        let mut current = id;
        loop {
            if self.view(current).is_some_and(|v| v.is_toplevel()) {
                return current;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// The deepest visible view under (`x`, `y`), given in `start`'s parent
    /// coordinates, and the point translated into that view's bounds.
    ///
    /// Later subviews are on top, so they are tested first.
    pub fn find_deepest_view(&self, start: ViewId, x: i32, y: i32) -> Option<(ViewId, Point)> {
        let view = self.view(start)?;
        if !view.is_visible() || !contains(view.frame(), x, y) {
            return None;
        }
        let local = Point::new(x - i32::from(view.frame().x), y - i32::from(view.frame().y));
        for &child in view.subviews().iter().rev() {
            if let Some(found) = self.find_deepest_view(child, local.x, local.y) {
                return Some(found);
            }
        }
        Some((start, local))
    }

    /// Offer a mouse event (already in `id`'s bounds coordinates) to its widget.
    pub fn process_mouse(&mut self, id: ViewId, event: &MouseEvent) -> bool {
        if !self.accepts_input(id) {
            return false;
        }
        self.with_widget(id, |w, cx| w.on_mouse(cx, event))
            .unwrap_or(false)
    }

    pub(crate) fn mouse_enter(&mut self, id: ViewId, event: &MouseEvent) {
        self.with_widget(id, |w, cx| w.on_mouse_enter(cx, event));
    }

    pub(crate) fn mouse_leave(&mut self, id: ViewId, event: &MouseEvent) {
        self.with_widget(id, |w, cx| w.on_mouse_leave(cx, event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::View;
    use crate::widget::{Cx, Widget};
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records every pass it sees and consumes the keys it is told to.
    struct Probe {
        name: &'static str,
        log: Log,
        consume: Option<KeyCode>,
        claim: Option<Command>,
    }

    impl Probe {
        fn view(name: &'static str, log: &Log) -> View {
            View::new()
                .with_frame(Rect::new(0, 0, 4, 1))
                .can_focus(true)
                .with_handler(Probe {
                    name,
                    log: Arc::clone(log),
                    consume: None,
                    claim: None,
                })
        }

        fn record(&self, pass: &str, key: &KeyEvent) -> bool {
            self.log.lock().unwrap().push(format!("{pass} {}", self.name));
            self.consume == Some(key.code)
        }
    }

    impl Widget for Probe {
        fn on_hot_key(&mut self, _cx: &mut Cx<'_>, key: &KeyEvent) -> bool {
            self.record("hot", key)
        }

        fn on_key(&mut self, _cx: &mut Cx<'_>, key: &KeyEvent) -> bool {
            self.record("key", key)
        }

        fn on_cold_key(&mut self, _cx: &mut Cx<'_>, key: &KeyEvent) -> bool {
            self.record("cold", key)
        }

        fn on_key_up(&mut self, _cx: &mut Cx<'_>, key: &KeyEvent) -> bool {
            self.record("up", key)
        }

        fn on_command(&mut self, _cx: &mut Cx<'_>, command: &Command) -> bool {
            self.claim.as_ref() == Some(command)
        }
    }

    fn setup() -> (ViewTree, Log, ViewId, ViewId, ViewId) {
        let log: Log = Arc::default();
        let mut tree = ViewTree::new();
        let top = tree.insert(View::toplevel().with_frame(Rect::new(0, 0, 20, 5)));
        let a = tree.insert(Probe::view("a", &log));
        let b = tree.insert(Probe::view("b", &log));
        tree.add(top, a).unwrap();
        tree.add(top, b).unwrap();
        tree.focus(b).unwrap();
        (tree, log, top, a, b)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn hot_pass_visits_every_view() {
        let (mut tree, log, top, _a, _b) = setup();
        assert!(!tree.process_hot_key(top, &key(KeyCode::Char('x'))));
        assert_eq!(*log.lock().unwrap(), vec!["hot a", "hot b"]);
    }

    #[test]
    fn normal_pass_only_follows_focus() {
        let (mut tree, log, top, _a, _b) = setup();
        assert!(!tree.process_key(top, &key(KeyCode::Char('x'))));
        assert_eq!(*log.lock().unwrap(), vec!["key b"]);
    }

    #[test]
    fn cold_pass_reaches_unfocused_fallbacks() {
        let (mut tree, log, top, a, _b) = setup();
        if let Some(probe) = tree.widget_mut::<Probe>(a) {
            probe.consume = Some(KeyCode::Enter);
        }
        assert!(tree.process_cold_key(top, &key(KeyCode::Enter)));
        assert_eq!(*log.lock().unwrap(), vec!["cold a"]);
    }

    #[test]
    fn unhandled_keys_bubble_to_bindings() {
        let (mut tree, _log, top, a, b) = setup();
        assert!(tree.process_key(top, &key(KeyCode::Tab)));
        assert_eq!(tree.most_focused(top), Some(a));
        assert!(tree.process_key(top, &key(KeyCode::BackTab)));
        assert_eq!(tree.most_focused(top), Some(b));
    }

    #[test]
    fn leaf_consumption_stops_the_pass() {
        let (mut tree, _log, top, a, b) = setup();
        if let Some(probe) = tree.widget_mut::<Probe>(b) {
            probe.consume = Some(KeyCode::Tab);
        }
        assert!(tree.process_key(top, &key(KeyCode::Tab)));
        assert_eq!(tree.most_focused(top), Some(b));
        assert_ne!(tree.most_focused(top), Some(a));
    }

    #[test]
    fn widgets_may_claim_builtin_commands() {
        let (mut tree, _log, top, _a, b) = setup();
        tree.view_mut(b)
            .unwrap()
            .key_bindings_mut()
            .add(crate::key::KeyCombination::new(KeyCode::Esc), [Command::QuitToplevel]);
        if let Some(probe) = tree.widget_mut::<Probe>(b) {
            probe.claim = Some(Command::QuitToplevel);
        }
        assert!(tree.process_key(top, &key(KeyCode::Esc)));
        assert!(tree.take_requests().is_empty());

        // Unclaimed, the toplevel's own binding requests a stop.
        let quit = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(tree.process_key(top, &quit));
        assert!(matches!(tree.take_requests().as_slice(), [Request::Stop(None)]));
    }

    #[test]
    fn key_up_runs_leaf_first() {
        let (mut tree, log, top, _a, _b) = setup();
        tree.process_key_up(top, &key(KeyCode::Char('x')));
        assert_eq!(*log.lock().unwrap(), vec!["up b"]);
    }

    #[test]
    fn disabled_views_are_skipped() {
        let (mut tree, log, top, a, _b) = setup();
        tree.set_enabled(a, false).unwrap();
        tree.process_hot_key(top, &key(KeyCode::Char('x')));
        assert_eq!(*log.lock().unwrap(), vec!["hot b"]);
    }

    #[test]
    fn hit_test_prefers_topmost_and_translates() {
        let mut tree = ViewTree::new();
        let top = tree.insert(View::new().with_frame(Rect::new(2, 1, 20, 10)));
        let under = tree.insert(View::new().with_frame(Rect::new(0, 0, 10, 5)));
        let over = tree.insert(View::new().with_frame(Rect::new(3, 2, 4, 2)));
        let hidden = tree.insert(View::new().with_frame(Rect::new(3, 2, 4, 2)).visible(false));
        tree.add(top, under).unwrap();
        tree.add(top, over).unwrap();
        tree.add(top, hidden).unwrap();

        assert_eq!(tree.find_deepest_view(top, 6, 4), Some((over, Point::new(1, 1))));
        assert_eq!(tree.find_deepest_view(top, 3, 1), Some((under, Point::new(1, 0))));
        assert_eq!(tree.find_deepest_view(top, 21, 10), Some((top, Point::new(19, 9))));
        assert_eq!(tree.find_deepest_view(top, 0, 0), None);
    }

    #[test]
    fn toplevel_of_finds_nearest_toplevel() {
        let (tree, _log, top, a, _b) = setup();
        assert_eq!(tree.toplevel_of(a), top);
        assert_eq!(tree.toplevel_of(top), top);
    }
}
