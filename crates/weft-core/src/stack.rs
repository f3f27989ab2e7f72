//! Toplevel stack arbitration: which toplevel is current, how stops are
//! negotiated, and how modal and overlapped toplevels are kept in order.

use crate::application::Application;
use crate::event::AppEvent;
use crate::tree::ViewId;

impl Application {
    pub(crate) fn is_modal(&self, toplevel: ViewId) -> bool {
        self.tree.view(toplevel).is_some_and(|v| v.is_modal())
    }

    pub(crate) fn is_shown(&self, toplevel: ViewId) -> bool {
        self.tree.view(toplevel).is_some_and(|v| v.is_visible())
    }

    /// The overlapped (MDI) container, if the root toplevel is one.
    pub fn overlapped_top(&self) -> Option<ViewId> {
        self.top
            .filter(|&t| self.tree.view(t).is_some_and(|v| v.is_overlapped_container()))
    }

    /// Non-modal toplevels stacked above the overlapped container, front
    /// first. Empty without a container.
    pub fn overlapped_children(&self) -> Vec<ViewId> {
        let Some(container) = self.overlapped_top() else {
            return Vec::new();
        };
        self.stack
            .iter()
            .copied()
            .filter(|&t| t != container && !self.is_modal(t))
            .collect()
    }

    pub(crate) fn set_current(&mut self, next: Option<ViewId>) {
        let previous = self.current;
        if previous == next {
            return;
        }
        self.current = next;
        tracing::debug!(?previous, ?next, "current toplevel changed");
        if let Some(previous) = previous.filter(|&p| self.tree.contains(p)) {
            self.emit(AppEvent::Deactivate {
                toplevel: previous,
                activated: next,
            });
        }
        if let Some(next) = next {
            self.tree.set_needs_display_all(next);
            self.emit(AppEvent::Activate {
                toplevel: next,
                deactivated: previous,
            });
        }
    }

    /// Without a container, a non-modal current toplevel becomes the root.
    pub(crate) fn set_current_as_top(&mut self) {
        if self.overlapped_top().is_some() {
            return;
        }
        if let Some(current) = self.current {
            if self.top != Some(current) && !self.is_modal(current) {
                self.top = Some(current);
            }
        }
    }

    fn move_in_stack(&mut self, toplevel: ViewId, index: usize) {
        if let Some(pos) = self.stack.iter().position(|&t| t == toplevel) {
            self.stack.remove(pos);
            let index = index.min(self.stack.len());
            self.stack.insert(index, toplevel);
        }
    }

    /// Try to make `target` current within the overlapped stack.
    ///
    /// While a modal is current, `target` is only reordered beneath it and
    /// `false` is returned. Without an overlapped container nothing moves.
    pub fn move_current(&mut self, target: ViewId) -> bool {
        let Some(container) = self.overlapped_top() else {
            return true;
        };
        let current = self.current;
        let is_current = current == Some(target);
        let current_modal = current.is_some_and(|c| self.is_modal(c));
        let current_running = current.is_some_and(|c| self.is_running(c));
        let front_modal = self.stack.front().is_some_and(|&t| self.is_modal(t));

        if target != container && !is_current && current_modal && !front_modal {
            // The modal goes back on top; the target slots in beneath it.
            if let Some(current) = current {
                self.move_in_stack(current, 0);
            }
            let index = self
                .stack
                .iter()
                .take_while(|&&t| t != target && self.is_modal(t))
                .count();
            self.move_in_stack(target, index);
            tracing::debug!(?target, "kept modal current, reordered beneath it");
            return false;
        }

        if target != container && !is_current && !current_running && !self.is_running(target) {
            if let Some(current) = current {
                self.move_in_stack(current, 0);
            }
            let index = self
                .stack
                .iter()
                .skip(1)
                .position(|&t| t != target && !self.is_running(t))
                .map_or(1, |i| i + 1);
            self.move_in_stack(target, index);
            return false;
        }

        let raise = current.is_none()
            || (self.is_modal(target) && self.stack.front() != Some(&target))
            || (!current_modal && !is_current);
        if raise {
            self.move_in_stack(target, 0);
            self.set_current(Some(target));
        }
        true
    }

    /// Let a running modal preempt the current toplevel, and make an
    /// invisible current toplevel cede to the next overlapped sibling.
    pub(crate) fn ensure_modal_or_visible_always_on_top(&mut self, toplevel: ViewId) {
        if !self.is_running(toplevel)
            || (self.current == Some(toplevel) && self.is_shown(toplevel))
            || self.overlapped_top().is_none()
            || self.stack.front().is_some_and(|&t| self.is_modal(t))
        {
            return;
        }
        let modal = self
            .stack
            .iter()
            .rev()
            .copied()
            .find(|&t| self.is_modal(t) && self.is_running(t) && Some(t) != self.current);
        if let Some(modal) = modal {
            tracing::debug!(?modal, "modal preempts current toplevel");
            self.move_current(modal);
            return;
        }
        if !self.is_shown(toplevel) && self.current == Some(toplevel) {
            self.overlapped_move_next();
        }
    }

    /// Rotate the overlapped stack forward to the next visible child.
    pub fn overlapped_move_next(&mut self) {
        self.overlapped_rotate(|stack| stack.rotate_left(1));
    }

    /// Rotate the overlapped stack backward to the previous visible child.
    pub fn overlapped_move_previous(&mut self) {
        self.overlapped_rotate(|stack| stack.rotate_right(1));
    }

    fn overlapped_rotate(&mut self, rotate: impl Fn(&mut std::collections::VecDeque<ViewId>)) {
        let Some(container) = self.overlapped_top() else {
            return;
        };
        if self.current.is_some_and(|c| self.is_modal(c)) || self.stack.len() < 2 {
            return;
        }
        let is_candidate =
            |app: &Self, t: ViewId| t != container && app.is_shown(t);

        rotate(&mut self.stack);
        for _ in 0..self.stack.len() {
            match self.stack.front() {
                Some(&front) if is_candidate(self, front) => break,
                _ => rotate(&mut self.stack),
            }
        }
        if !self.stack.front().is_some_and(|&f| is_candidate(self, f)) {
            self.move_in_stack(container, 0);
        }
        let front = self.stack.front().copied();
        self.set_current(front);
    }

    /// Bring a visible overlapped child to the front and make it current.
    /// Refused while a modal toplevel is current.
    pub fn move_to_overlapped_child(&mut self, child: ViewId) -> bool {
        let allowed = self.is_shown(child)
            && self.overlapped_top().is_some()
            && self.stack.contains(&child)
            && self.current.is_some_and(|c| !self.is_modal(c));
        if allowed {
            self.move_in_stack(child, 0);
            self.set_current(Some(child));
        }
        allowed
    }

    /// Keep the current overlapped child in front after it was interacted with.
    pub(crate) fn bring_overlapped_top_to_front(&mut self) {
        if self.overlapped_top().is_none() {
            return;
        }
        if let Some(current) = self.current {
            if self.stack.front() != Some(&current) && !self.is_modal(current) {
                self.move_in_stack(current, 0);
                self.tree.set_needs_display_all(current);
            }
        }
    }

    /// Focus reached the root of `toplevel`: make it current if nothing
    /// modal is in the way.
    pub(crate) fn activate_from_focus(&mut self, toplevel: ViewId) {
        if self.current == Some(toplevel) || !self.stack.contains(&toplevel) {
            return;
        }
        if self
            .current
            .is_some_and(|c| self.is_modal(c) && self.is_running(c))
        {
            return;
        }
        self.move_current(toplevel);
    }

    /// Ask `toplevel` (default: the current one) to stop.
    ///
    /// In order of precedence: stopping the overlapped container stops it
    /// with all its children; stopping a modal entangled with a current
    /// modal stops both; naming a background overlapped child promotes it
    /// to current instead; otherwise the target receives a cancellable
    /// [`AppEvent::Closing`] and, unless cancelled, stops.
    pub fn request_stop(&mut self, toplevel: Option<ViewId>) {
        let Some(current) = self.current else {
            return;
        };
        let container = self.overlapped_top();
        let target = match (container, toplevel) {
            (Some(_), Some(target)) if self.tree.contains(target) => target,
            _ => current,
        };
        let current_modal = self.is_modal(current);
        let current_running = self.is_running(current);
        let target_modal = self.is_modal(target);
        let target_running = self.is_running(target);
        tracing::debug!(?target, ?current, "stop requested");

        if container == Some(target) && target_running && (!current_modal || !current_running) {
            self.stop_overlapped_container(target);
        } else if container.is_some()
            && target != current
            && current_running
            && current_modal
            && target_modal
            && target_running
        {
            if self.confirm_closing(current) && self.confirm_closing(target) {
                self.stop(current);
                self.stop(target);
            }
        } else if container.is_some()
            && Some(target) != container
            && target != current
            && !current_modal
            && self.stack.contains(&target)
        {
            self.move_current(target);
        } else {
            let victim = if target == current || (current_modal && !target_modal) {
                current
            } else {
                target
            };
            if self.is_running(victim) && self.confirm_closing(victim) {
                self.stop(victim);
            }
        }
    }

    fn stop_overlapped_container(&mut self, container: ViewId) {
        let children = self.overlapped_children();
        for &child in &children {
            if !self.confirm_closing(child) {
                return;
            }
        }
        if !self.confirm_closing(container) {
            return;
        }
        for child in children {
            self.stop(child);
        }
        self.stop(container);
    }

    fn confirm_closing(&mut self, toplevel: ViewId) -> bool {
        let event = self.emit(AppEvent::Closing {
            toplevel,
            cancel: false,
        });
        if event.is_cancelled() {
            tracing::warn!(?toplevel, "stop cancelled by closing handler");
            return false;
        }
        true
    }

    fn stop(&mut self, toplevel: ViewId) {
        if !self.is_running(toplevel) {
            return;
        }
        self.set_running(toplevel, false);
        self.emit(AppEvent::Stopped(toplevel));
        // A blocked wait must notice the stop without further input.
        self.main_loop.handle().wake();
        tracing::debug!(?toplevel, "toplevel stopped");
    }
}

#[cfg(test)]
mod tests {
    use crate::application::{Application, RunState};
    use crate::event::AppEvent;
    use crate::testing::test_application;
    use crate::tree::{View, ViewId};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn begin(app: &mut Application, view: View) -> (ViewId, RunState) {
        let id = app.tree_mut().insert(view);
        let state = app.begin(id).unwrap();
        (id, state)
    }

    fn forget(states: Vec<RunState>) {
        for state in states {
            std::mem::forget(state);
        }
    }

    /// Container `c` with two overlapped children; `y` is current.
    fn overlapped() -> (Application, ViewId, ViewId, ViewId, Vec<RunState>) {
        let (mut app, _input) = test_application(20, 6);
        let (c, sc) = begin(&mut app, View::toplevel().overlapped_container());
        let (x, sx) = begin(&mut app, View::toplevel());
        let (y, sy) = begin(&mut app, View::toplevel());
        (app, c, x, y, vec![sc, sx, sy])
    }

    fn stopped(app: &mut Application) -> Rc<RefCell<Vec<ViewId>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        app.add_listener(move |event| {
            if let AppEvent::Stopped(id) = event {
                sink.borrow_mut().push(*id);
            }
        });
        log
    }

    #[test]
    fn cancelled_closing_keeps_running() {
        let (mut app, _input) = test_application(10, 2);
        let cancel = Rc::new(RefCell::new(true));
        let flag = Rc::clone(&cancel);
        app.add_listener(move |event| {
            if let AppEvent::Closing { cancel, .. } = event {
                *cancel = *flag.borrow();
            }
        });
        let log = stopped(&mut app);
        let (top, state) = begin(&mut app, View::toplevel());

        app.request_stop(None);
        assert!(app.tree().node(top).is_running());
        assert!(log.borrow().is_empty());

        *cancel.borrow_mut() = false;
        app.request_stop(None);
        app.request_stop(None);
        assert!(!app.tree().node(top).is_running());
        assert_eq!(*log.borrow(), vec![top]);
        app.end(state).unwrap();
    }

    #[test]
    fn overlapped_children_are_placed_in_front() {
        let (app, c, x, y, states) = overlapped();
        assert_eq!(app.overlapped_top(), Some(c));
        assert_eq!(app.top(), Some(c));
        assert_eq!(app.current(), Some(y));
        assert_eq!(app.toplevels().collect::<Vec<_>>(), vec![y, x, c]);
        assert_eq!(app.overlapped_children(), vec![y, x]);
        forget(states);
    }

    #[test]
    fn second_container_is_rejected() {
        let (mut app, _c, _x, _y, states) = overlapped();
        let other = app.tree_mut().insert(View::toplevel().overlapped_container());
        assert!(matches!(
            app.begin(other),
            Err(crate::Error::SecondOverlappedContainer)
        ));
        forget(states);
    }

    #[test]
    fn stopping_the_container_stops_every_child() {
        let (mut app, c, x, y, states) = overlapped();
        let log = stopped(&mut app);
        app.request_stop(Some(c));
        assert_eq!(*log.borrow(), vec![y, x, c]);
        forget(states);
    }

    #[test]
    fn a_refusing_child_keeps_the_container_running() {
        let (mut app, c, x, _y, states) = overlapped();
        app.add_listener(move |event| {
            if let AppEvent::Closing { toplevel, cancel } = event {
                *cancel = *toplevel == x;
            }
        });
        let log = stopped(&mut app);
        app.request_stop(Some(c));
        assert!(log.borrow().is_empty());
        assert!(app.tree().node(c).is_running());
        forget(states);
    }

    #[test]
    fn naming_a_background_child_promotes_it() {
        let (mut app, _c, x, y, states) = overlapped();
        let log = stopped(&mut app);
        app.request_stop(Some(x));
        assert!(log.borrow().is_empty());
        assert_eq!(app.current(), Some(x));
        assert_eq!(app.toplevels().next(), Some(x));
        assert!(app.tree().node(y).is_running());
        forget(states);
    }

    #[test]
    fn entangled_modals_stop_together() {
        let (mut app, _input) = test_application(20, 6);
        let (_c, sc) = begin(&mut app, View::toplevel().overlapped_container());
        let (m1, s1) = begin(&mut app, View::toplevel().modal(true));
        let (m2, s2) = begin(&mut app, View::toplevel().modal(true));
        assert_eq!(app.current(), Some(m2));
        let log = stopped(&mut app);

        app.request_stop(Some(m1));
        assert_eq!(*log.borrow(), vec![m2, m1]);
        forget(vec![sc, s1, s2]);
    }

    #[test]
    fn non_modal_begun_under_a_modal_waits_beneath_it() {
        let (mut app, _input) = test_application(20, 6);
        let (c, sc) = begin(&mut app, View::toplevel().overlapped_container());
        let (m, sm) = begin(&mut app, View::toplevel().modal(true));
        let (z, sz) = begin(&mut app, View::toplevel());
        assert_eq!(app.current(), Some(m));
        assert_eq!(app.toplevels().collect::<Vec<_>>(), vec![m, z, c]);
        forget(vec![sc, sm, sz]);
    }

    #[test]
    fn running_modal_preempts_current() {
        let (mut app, _input) = test_application(20, 6);
        let (c, sc) = begin(&mut app, View::toplevel().overlapped_container());
        let (x, sx) = begin(&mut app, View::toplevel());
        let (m, sm) = begin(&mut app, View::toplevel().modal(true));
        // Something pulled a non-modal child over the modal.
        app.move_in_stack(x, 0);
        app.current = Some(x);

        app.ensure_modal_or_visible_always_on_top(c);
        assert_eq!(app.current(), Some(m));
        assert_eq!(app.toplevels().next(), Some(m));
        forget(vec![sc, sx, sm]);
    }

    #[test]
    fn invisible_current_cedes_to_next_child() {
        let (mut app, _c, x, y, states) = overlapped();
        app.tree_mut().set_visible(y, false).unwrap();
        app.ensure_modal_or_visible_always_on_top(y);
        assert_eq!(app.current(), Some(x));
        forget(states);
    }

    #[test]
    fn overlapped_rotation_skips_the_container() {
        let (mut app, c, x, y, states) = overlapped();
        app.overlapped_move_next();
        assert_eq!(app.current(), Some(x));
        assert_eq!(app.toplevels().collect::<Vec<_>>(), vec![x, c, y]);
        app.overlapped_move_next();
        assert_eq!(app.current(), Some(y));
        app.overlapped_move_previous();
        assert_eq!(app.current(), Some(x));
        forget(states);
    }

    #[test]
    fn move_to_child_is_refused_under_a_modal() {
        let (mut app, _c, x, _y, mut states) = overlapped();
        assert!(app.move_to_overlapped_child(x));
        assert_eq!(app.current(), Some(x));

        let (m, sm) = begin(&mut app, View::toplevel().modal(true));
        states.push(sm);
        assert_eq!(app.current(), Some(m));
        assert!(!app.move_to_overlapped_child(x));
        assert_eq!(app.current(), Some(m));
        forget(states);
    }

    #[test]
    fn activation_events_follow_current() {
        let (mut app, _c, x, y, states) = overlapped();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        app.add_listener(move |event| {
            if matches!(event, AppEvent::Activate { .. } | AppEvent::Deactivate { .. }) {
                sink.borrow_mut().push(event.clone());
            }
        });
        app.move_to_overlapped_child(x);
        assert_eq!(
            *log.borrow(),
            vec![
                AppEvent::Deactivate {
                    toplevel: y,
                    activated: Some(x)
                },
                AppEvent::Activate {
                    toplevel: x,
                    deactivated: Some(y)
                },
            ]
        );
        forget(states);
    }
}
