//! Routing raw input across the toplevel stack.
//!
//! Keys go through three passes (hot, normal, cold). Each pass walks the
//! stack from the front and stops after the first modal toplevel, so nothing
//! beneath a modal ever sees a key. Mouse events go to the mouse grab when
//! one is held, otherwise to the deepest view under the pointer.

use crate::application::Application;
use crate::event::{AppEvent, InputEvent, MouseEvent, Point};
use crate::tree::ViewId;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEventKind};

impl Application {
    pub(crate) fn process_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::Key(key) if key.kind == KeyEventKind::Release => {
                self.process_key_up(&key);
            }
            InputEvent::Key(key) => {
                self.process_key_event(&key);
            }
            InputEvent::Mouse(mouse) => {
                self.process_mouse_event(mouse);
            }
            InputEvent::Resize(cols, rows) => {
                if let Err(err) = self.resize(cols, rows) {
                    self.fail(err);
                }
            }
            InputEvent::Paste(text) => {
                for ch in text.chars() {
                    let code = match ch {
                        '\n' | '\r' => KeyCode::Enter,
                        ch => KeyCode::Char(ch),
                    };
                    self.process_key_event(&KeyEvent::from(code));
                }
            }
            InputEvent::FocusGained | InputEvent::FocusLost => {
                tracing::trace!(?event, "terminal focus changed");
            }
        }
    }

    /// Toplevels a key may reach: the stack front-to-back, up to and
    /// including the first modal.
    fn key_targets(&self) -> Vec<ViewId> {
        let mut targets = Vec::with_capacity(self.stack.len());
        for &toplevel in &self.stack {
            targets.push(toplevel);
            if self.is_modal(toplevel) {
                break;
            }
        }
        targets
    }

    /// Dispatch a key press. Returns whether anything consumed it.
    pub fn process_key_event(&mut self, key: &KeyEvent) -> bool {
        if let Some(handler) = self.root_key_handler.as_mut() {
            if handler(key) {
                tracing::trace!(?key, "key consumed by root handler");
                return true;
            }
        }
        let targets = self.key_targets();
        let handled = targets.iter().any(|&t| self.tree.process_hot_key(t, key))
            || targets.iter().any(|&t| self.tree.process_key(t, key))
            || targets.iter().any(|&t| self.tree.process_cold_key(t, key));
        self.apply_requests();
        handled
    }

    /// Dispatch a key release along the focus path only.
    pub fn process_key_up(&mut self, key: &KeyEvent) -> bool {
        let targets = self.key_targets();
        let handled = targets.iter().any(|&t| self.tree.process_key_up(t, key));
        self.apply_requests();
        handled
    }

    /// The deepest view under a screen point: the current toplevel first,
    /// then, unless it is modal, the other overlapped toplevels front to back.
    fn hit_test(&self, x: i32, y: i32) -> Option<(ViewId, Point)> {
        let current = self.current?;
        if let Some(hit) = self.tree.find_deepest_view(current, x, y) {
            return Some(hit);
        }
        if self.overlapped_top().is_none() || self.is_modal(current) {
            return None;
        }
        self.stack
            .iter()
            .filter(|&&t| t != current)
            .find_map(|&t| self.tree.find_deepest_view(t, x, y))
    }

    /// Dispatch a mouse event given in screen coordinates. Returns whether a
    /// widget consumed it.
    pub fn process_mouse_event(&mut self, event: MouseEvent) -> bool {
        let (x, y) = (event.position.x, event.position.y);
        let hit = self.hit_test(x, y);
        self.forget_detached_mouse_targets();

        if let Some(grab) = self.grab {
            let local = self.tree.screen_to_view(grab, x, y);
            let bounds = self.tree.node(grab).bounds();
            let inside = local.x >= 0
                && local.y >= 0
                && local.x < i32::from(bounds.width)
                && local.y < i32::from(bounds.height);
            let relocated = event.relocated(local, hit.map(|(view, _)| view));
            if inside != self.grab_inside {
                self.grab_inside = inside;
                if inside {
                    self.tree.mouse_enter(grab, &relocated);
                } else {
                    self.tree.mouse_leave(grab, &relocated);
                }
            }
            let handled = self.tree.process_mouse(grab, &relocated);
            self.apply_requests();
            return handled;
        }

        let Some((view, local)) = hit else {
            self.leave_hovered(&event, None);
            return false;
        };
        let pressed = matches!(event.kind, MouseEventKind::Down(_));
        let root = self.tree.root_of(view);
        if pressed && Some(root) != self.current && self.stack.contains(&root) {
            self.move_current(root);
        }

        let relocated = event.relocated(local, Some(view));
        if self.mouse_over != Some(view) {
            self.leave_hovered(&event, Some(view));
            self.mouse_over = Some(view);
            self.tree.mouse_enter(view, &relocated);
        }

        if event.is_position_report() && !self.tree.node(view).wants_mouse_position_reports() {
            self.apply_requests();
            return false;
        }

        let handled = self.tree.process_mouse(view, &relocated);
        if !handled && event.kind == MouseEventKind::Down(MouseButton::Left) {
            let focusable = self
                .tree
                .view(view)
                .is_some_and(|v| v.is_focusable() && v.is_enabled() && !v.has_focus());
            if focusable {
                if let Err(err) = self.tree.focus(view) {
                    tracing::debug!(%err, ?view, "click focus refused");
                }
            }
        }
        if pressed {
            self.bring_overlapped_top_to_front();
        }
        self.apply_requests();
        handled
    }

    /// Whether `view` still hangs under a toplevel on the stack.
    fn is_attached(&self, view: ViewId) -> bool {
        self.tree.contains(view) && self.stack.contains(&self.tree.root_of(view))
    }

    /// Drop a grab or hover target that was removed from its toplevel or
    /// disposed since the last mouse event.
    fn forget_detached_mouse_targets(&mut self) {
        if let Some(view) = self.grab.filter(|&v| !self.is_attached(v)) {
            tracing::debug!(?view, "mouse grab dropped, view detached");
            self.grab = None;
            self.grab_inside = false;
            if !self.options.mouse {
                self.driver.cook_mouse();
            }
        }
        if self.mouse_over.is_some_and(|v| !self.is_attached(v)) {
            self.mouse_over = None;
        }
    }

    fn leave_hovered(&mut self, event: &MouseEvent, next: Option<ViewId>) {
        let Some(previous) = self.mouse_over.take() else {
            return;
        };
        if !self.tree.contains(previous) {
            return;
        }
        let local = self
            .tree
            .screen_to_view(previous, event.position.x, event.position.y);
        self.tree.mouse_leave(previous, &event.relocated(local, next));
    }

    /// Route every mouse event to `view` until released. Listeners and the
    /// view's widget may refuse through [`AppEvent::GrabbingMouse`].
    pub fn grab_mouse(&mut self, view: ViewId) -> bool {
        if !self.tree.contains(view) {
            return false;
        }
        let event = self.emit(AppEvent::GrabbingMouse { view, cancel: false });
        if event.is_cancelled() {
            tracing::debug!(?view, "mouse grab refused");
            return false;
        }
        self.grab = Some(view);
        self.grab_inside = true;
        if !self.options.mouse {
            self.driver.uncook_mouse();
        }
        self.emit(AppEvent::GrabbedMouse(view));
        tracing::debug!(?view, "mouse grabbed");
        true
    }

    /// Release the mouse grab, if any and if nobody refuses through
    /// [`AppEvent::UngrabbingMouse`].
    pub fn ungrab_mouse(&mut self) -> bool {
        let Some(view) = self.grab else {
            return false;
        };
        if self.tree.contains(view) {
            let event = self.emit(AppEvent::UngrabbingMouse { view, cancel: false });
            if event.is_cancelled() {
                tracing::debug!(?view, "mouse ungrab refused");
                return false;
            }
        }
        self.grab = None;
        if !self.options.mouse {
            self.driver.cook_mouse();
        }
        if self.tree.contains(view) {
            self.emit(AppEvent::UngrabbedMouse(view));
        }
        tracing::debug!(?view, "mouse released");
        true
    }

    /// The view holding the mouse grab.
    pub fn mouse_grab_view(&self) -> Option<ViewId> {
        self.grab
    }
}

#[cfg(test)]
mod tests {
    use crate::application::{Application, RunState};
    use crate::event::{AppEvent, InputEvent, MouseEvent};
    use crate::testing::{test_application, FakeDriver};
    use crate::tree::{View, ViewId};
    use crate::widget::{Cx, Widget};
    use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEventKind};
    use ratatui::layout::Rect;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Probe {
        name: &'static str,
        log: Log,
        consume_in: Option<&'static str>,
    }

    impl Probe {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Rc::clone(log),
                consume_in: None,
            }
        }

        fn record(&self, what: &str) -> bool {
            self.log.borrow_mut().push(format!("{what} {}", self.name));
            self.consume_in == Some(what)
        }
    }

    impl Widget for Probe {
        fn on_hot_key(&mut self, _cx: &mut Cx<'_>, _key: &KeyEvent) -> bool {
            self.record("hot")
        }

        fn on_key(&mut self, _cx: &mut Cx<'_>, _key: &KeyEvent) -> bool {
            self.record("key")
        }

        fn on_cold_key(&mut self, _cx: &mut Cx<'_>, _key: &KeyEvent) -> bool {
            self.record("cold")
        }

        fn on_key_up(&mut self, _cx: &mut Cx<'_>, _key: &KeyEvent) -> bool {
            self.record("up")
        }

        fn on_mouse(&mut self, _cx: &mut Cx<'_>, event: &MouseEvent) -> bool {
            let what = format!("mouse {},{}", event.position.x, event.position.y);
            self.record(&what);
            true
        }

        fn on_mouse_enter(&mut self, _cx: &mut Cx<'_>, _event: &MouseEvent) {
            self.record("enter");
        }

        fn on_mouse_leave(&mut self, _cx: &mut Cx<'_>, _event: &MouseEvent) {
            self.record("leave");
        }
    }

    fn begin(app: &mut Application, view: View) -> (ViewId, RunState) {
        let id = app.tree_mut().insert(view);
        let state = app.begin(id).unwrap();
        (id, state)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    fn mouse(kind: MouseEventKind, x: i32, y: i32) -> MouseEvent {
        MouseEvent::new(kind, x, y)
    }

    #[test]
    fn a_modal_intercepts_every_pass() {
        let (mut app, _input) = test_application(10, 3);
        let log = Log::default();
        let (_a, sa) = begin(&mut app, View::toplevel().with_handler(Probe::new("a", &log)));
        let (_d, sd) = begin(
            &mut app,
            View::toplevel().modal(true).with_handler(Probe::new("d", &log)),
        );

        assert!(!app.process_key_event(&key(KeyCode::Char('k'))));
        assert_eq!(*log.borrow(), vec!["hot d", "key d", "cold d"]);
        std::mem::forget((sa, sd));
    }

    #[test]
    fn non_modal_toplevels_all_see_each_pass() {
        let (mut app, _input) = test_application(10, 3);
        let log = Log::default();
        let (_a, sa) = begin(&mut app, View::toplevel().with_handler(Probe::new("a", &log)));
        let (_b, sb) = begin(&mut app, View::toplevel().with_handler(Probe::new("b", &log)));

        app.process_key_event(&key(KeyCode::Char('k')));
        assert_eq!(
            *log.borrow(),
            vec!["hot b", "hot a", "key b", "key a", "cold b", "cold a"]
        );
        std::mem::forget((sa, sb));
    }

    #[test]
    fn a_consumed_key_ends_dispatch() {
        let (mut app, _input) = test_application(10, 3);
        let log = Log::default();
        let (_a, sa) = begin(&mut app, View::toplevel().with_handler(Probe::new("a", &log)));
        let probe = Probe {
            consume_in: Some("key"),
            ..Probe::new("b", &log)
        };
        let (_b, sb) = begin(&mut app, View::toplevel().with_handler(probe));

        assert!(app.process_key_event(&key(KeyCode::Char('k'))));
        assert_eq!(*log.borrow(), vec!["hot b", "hot a", "key b"]);
        std::mem::forget((sa, sb));
    }

    #[test]
    fn root_key_handler_runs_first() {
        let (mut app, _input) = test_application(10, 3);
        let log = Log::default();
        let (_a, sa) = begin(&mut app, View::toplevel().with_handler(Probe::new("a", &log)));
        app.set_root_key_handler(|key| key.code == KeyCode::F(1));

        assert!(app.process_key_event(&key(KeyCode::F(1))));
        assert!(log.borrow().is_empty());
        app.process_key_event(&key(KeyCode::F(2)));
        assert_eq!(log.borrow().len(), 3);
        std::mem::forget(sa);
    }

    #[test]
    fn key_releases_take_the_normal_path_only() {
        let (mut app, input) = test_application(10, 3);
        let log = Log::default();
        let (_a, sa) = begin(&mut app, View::toplevel().with_handler(Probe::new("a", &log)));
        let (_d, sd) = begin(
            &mut app,
            View::toplevel().modal(true).with_handler(Probe::new("d", &log)),
        );
        input.push_key_up(KeyCode::Char('k'));
        app.pump(false);
        assert_eq!(*log.borrow(), vec!["up d"]);
        std::mem::forget((sa, sd));
    }

    #[test]
    fn pasted_text_arrives_as_key_presses() {
        struct Typist(Rc<RefCell<String>>);
        impl Widget for Typist {
            fn on_key(&mut self, _cx: &mut Cx<'_>, key: &KeyEvent) -> bool {
                match key.code {
                    KeyCode::Char(ch) => self.0.borrow_mut().push(ch),
                    KeyCode::Enter => self.0.borrow_mut().push('/'),
                    _ => return false,
                }
                true
            }
        }

        let (mut app, _input) = test_application(10, 3);
        let typed = Rc::new(RefCell::new(String::new()));
        let (_a, sa) = begin(
            &mut app,
            View::toplevel().with_handler(Typist(Rc::clone(&typed))),
        );
        app.process_input(InputEvent::Paste("ab\ncd".into()));
        assert_eq!(*typed.borrow(), "ab/cd");
        std::mem::forget(sa);
    }

    fn with_target(app: &mut Application, log: &Log) -> (ViewId, RunState) {
        let (top, state) = begin(app, View::toplevel());
        let target = app.tree_mut().insert(
            View::new()
                .with_frame(Rect::new(2, 1, 4, 2))
                .with_handler(Probe::new("v", log)),
        );
        app.tree_mut().add(top, target).unwrap();
        app.tree_mut().set_needs_layout(top);
        (target, state)
    }

    #[test]
    fn a_grab_receives_events_outside_its_bounds() {
        let (mut app, _input) = test_application(20, 6);
        let log = Log::default();
        let (v, state) = with_target(&mut app, &log);

        assert!(app.grab_mouse(v));
        assert_eq!(app.mouse_grab_view(), Some(v));
        app.process_mouse_event(mouse(MouseEventKind::Drag(MouseButton::Left), 10, 4));
        assert_eq!(*log.borrow(), vec!["leave v", "mouse 8,3 v"]);

        log.borrow_mut().clear();
        app.process_mouse_event(mouse(MouseEventKind::Drag(MouseButton::Left), 3, 1));
        assert_eq!(*log.borrow(), vec!["enter v", "mouse 1,0 v"]);

        log.borrow_mut().clear();
        app.process_mouse_event(mouse(MouseEventKind::Drag(MouseButton::Left), 4, 2));
        assert_eq!(*log.borrow(), vec!["mouse 2,1 v"]);
        std::mem::forget(state);
    }

    #[test]
    fn a_cancelled_grab_changes_nothing() {
        let (mut app, _input) = test_application(20, 6);
        let log = Log::default();
        let (v, state) = with_target(&mut app, &log);
        app.add_listener(|event| {
            if let AppEvent::GrabbingMouse { cancel, .. } = event {
                *cancel = true;
            }
        });
        assert!(!app.grab_mouse(v));
        assert_eq!(app.mouse_grab_view(), None);
        std::mem::forget(state);
    }

    #[test]
    fn a_detached_grab_stops_receiving_events() {
        let (mut app, _input) = test_application(20, 6);
        let log = Log::default();
        let (v, state) = with_target(&mut app, &log);
        let top = app.tree().node(v).parent().unwrap();
        assert!(app.grab_mouse(v));

        app.tree_mut().remove(top, v).unwrap();
        app.process_mouse_event(mouse(MouseEventKind::Drag(MouseButton::Left), 3, 1));
        assert_eq!(app.mouse_grab_view(), None);
        assert!(log.borrow().is_empty());
        assert!(app.driver_as::<FakeDriver>().unwrap().is_mouse_cooked());
        std::mem::forget(state);
    }

    #[test]
    fn ungrab_notifies_and_cooks_the_mouse_again() {
        let (mut app, _input) = test_application(20, 6);
        let log = Log::default();
        let (v, state) = with_target(&mut app, &log);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        app.add_listener(move |event| {
            if matches!(
                event,
                AppEvent::GrabbedMouse(_)
                    | AppEvent::UngrabbingMouse { .. }
                    | AppEvent::UngrabbedMouse(_)
            ) {
                sink.borrow_mut().push(event.clone());
            }
        });

        assert!(!app.ungrab_mouse());
        app.grab_mouse(v);
        assert!(!app.driver_as::<FakeDriver>().unwrap().is_mouse_cooked());
        assert!(app.ungrab_mouse());
        assert!(app.driver_as::<FakeDriver>().unwrap().is_mouse_cooked());
        assert_eq!(
            *events.borrow(),
            vec![
                AppEvent::GrabbedMouse(v),
                AppEvent::UngrabbingMouse { view: v, cancel: false },
                AppEvent::UngrabbedMouse(v),
            ]
        );
        std::mem::forget(state);
    }

    #[test]
    fn hover_changes_fire_enter_and_leave() {
        let (mut app, _input) = test_application(20, 2);
        let log = Log::default();
        let (top, state) = begin(&mut app, View::toplevel());
        let left = app.tree_mut().insert(
            View::new()
                .with_frame(Rect::new(0, 0, 4, 1))
                .with_handler(Probe::new("l", &log)),
        );
        let right = app.tree_mut().insert(
            View::new()
                .with_frame(Rect::new(5, 0, 4, 1))
                .with_handler(Probe::new("r", &log)),
        );
        app.tree_mut().add(top, left).unwrap();
        app.tree_mut().add(top, right).unwrap();

        app.process_mouse_event(mouse(MouseEventKind::Moved, 1, 0));
        assert_eq!(*log.borrow(), vec!["enter l"]);

        log.borrow_mut().clear();
        app.tree_mut()
            .view_mut(right)
            .unwrap()
            .set_want_mouse_position_reports(true);
        app.process_mouse_event(mouse(MouseEventKind::Moved, 6, 0));
        assert_eq!(*log.borrow(), vec!["leave l", "enter r", "mouse 1,0 r"]);
        std::mem::forget(state);
    }

    #[test]
    fn an_unhandled_click_focuses_the_view() {
        let (mut app, _input) = test_application(20, 2);
        let (top, state) = begin(&mut app, View::toplevel());
        let first = app
            .tree_mut()
            .insert(View::new().with_frame(Rect::new(0, 0, 4, 1)).can_focus(true));
        let second = app
            .tree_mut()
            .insert(View::new().with_frame(Rect::new(5, 0, 4, 1)).can_focus(true));
        app.tree_mut().add(top, first).unwrap();
        app.tree_mut().add(top, second).unwrap();
        app.tree_mut().focus(first).unwrap();

        app.process_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 6, 0));
        assert_eq!(app.tree().most_focused(top), Some(second));
        std::mem::forget(state);
    }

    #[test]
    fn clicking_a_background_child_brings_it_forward() {
        let (mut app, _input) = test_application(20, 4);
        let (_c, sc) = begin(&mut app, View::toplevel().overlapped_container());
        let (x, sx) = begin(
            &mut app,
            View::toplevel().with_frame(Rect::new(0, 0, 5, 3)),
        );
        let (y, sy) = begin(
            &mut app,
            View::toplevel().with_frame(Rect::new(10, 0, 5, 3)),
        );
        assert_eq!(app.current(), Some(y));

        app.process_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 1, 1));
        assert_eq!(app.current(), Some(x));
        assert_eq!(app.toplevels().next(), Some(x));
        assert_eq!(app.toplevels().nth(1), Some(y));
        std::mem::forget((sc, sx, sy));
    }

    #[test]
    fn a_modal_keeps_the_mouse_to_itself() {
        let (mut app, _input) = test_application(20, 4);
        let (_c, sc) = begin(&mut app, View::toplevel().overlapped_container());
        let (_x, sx) = begin(
            &mut app,
            View::toplevel().with_frame(Rect::new(0, 0, 5, 3)),
        );
        let (m, sm) = begin(
            &mut app,
            View::toplevel()
                .modal(true)
                .with_frame(Rect::new(10, 0, 5, 3)),
        );

        app.process_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 1, 1));
        assert_eq!(app.current(), Some(m));
        std::mem::forget((sc, sx, sm));
    }
}
