//! The focus chain.
//!
//! Every container remembers one focused subview; following those links from
//! a root ends at the [most focused](ViewTree::most_focused) view, which is
//! where keystrokes of the normal pass start. A view only holds focus if its
//! whole ancestor chain does.

use crate::error::{Error, Result};
use crate::tree::{FocusDirection, ViewId, ViewTree};

impl ViewTree {
    /// Whether `id` may be given focus directly.
    fn is_focus_eligible(&self, id: ViewId) -> bool {
        self.view(id)
            .is_some_and(|v| v.is_focusable() && v.is_enabled())
            && self.can_be_visible(id)
    }

    /// Whether keyboard traversal stops at `id`.
    fn is_focus_candidate(&self, id: ViewId) -> bool {
        self.is_focus_eligible(id) && self.node(id).tab_stop()
    }

    pub fn focus_direction(&self) -> FocusDirection {
        self.focus_direction
    }

    /// Give focus to `id`, focusing each ancestor on the way to the root.
    pub fn focus(&mut self, id: ViewId) -> Result<()> {
        let view = self.get(id)?;
        if !view.is_enabled() || !self.can_be_visible(id) {
            if view.has_focus() {
                self.set_has_focus(id, false);
            }
            return Ok(());
        }
        match view.parent() {
            Some(parent) => self.set_focus_in(parent, id),
            None => self.set_focus_in(id, id),
        }
    }

    /// Focus `view`, which must be `container` itself or one of its
    /// descendants.
    ///
    /// The previously focused subview loses focus, a focus leaf is
    /// re-established below `view` (first or last candidate depending on the
    /// current traversal direction), and the request travels upward so the
    /// enclosing toplevel becomes current.
    pub fn set_focus_in(&mut self, container: ViewId, view: ViewId) -> Result<()> {
        self.get(container)?;
        self.get(view)?;
        if view != container && !self.is_descendant(view, container) {
            tracing::error!(?container, ?view, "focus requested outside the container");
            return Err(Error::NotDescendant { container, view });
        }
        if !self.is_focus_eligible(view) {
            return Ok(());
        }
        match self.parent(view) {
            _ if view == container => match self.parent(container) {
                Some(parent) => self.focus_child(parent, container),
                None => self.focus_root(container),
            },
            Some(parent) => self.focus_child(parent, view),
            None => {}
        }
        Ok(())
    }

    fn focus_child(&mut self, container: ViewId, view: ViewId) {
        let previous = self.node(container).focused();
        if previous == Some(view) && self.node(view).has_focus() {
            return;
        }
        if let Some(previous) = previous.filter(|p| *p != view) {
            self.set_has_focus(previous, false);
        }
        self.node_mut(container).focused = Some(view);
        self.set_has_focus(view, true);
        self.ensure_focus(view);

        match self.parent(container) {
            Some(parent) => self.focus_child(parent, container),
            None => self.focus_root(container),
        }
    }

    fn focus_root(&mut self, root: ViewId) {
        if !self.node(root).has_focus() {
            self.set_has_focus(root, true);
        }
        if self.node(root).is_toplevel() {
            self.pending_activation = Some(root);
        }
    }

    /// Set or clear `id`'s focus flag, firing enter/leave. Clearing also
    /// clears the focus chain below `id`.
    pub(crate) fn set_has_focus(&mut self, id: ViewId, value: bool) {
        let Some(view) = self.view_mut(id) else {
            return;
        };
        if view.has_focus != value {
            view.has_focus = value;
            if value {
                self.with_widget(id, |w, cx| w.on_focus_enter(cx));
            } else {
                self.with_widget(id, |w, cx| w.on_focus_leave(cx));
            }
            self.set_needs_display_all(id);
        }
        if !value {
            if let Some(focused) = self.view_mut(id).and_then(|v| v.focused.take()) {
                self.set_has_focus(focused, false);
            }
        }
    }

    /// Re-establish a focus leaf below `id` if none is set.
    pub fn ensure_focus(&mut self, id: ViewId) {
        if self.node(id).focused().is_none() && !self.subviews(id).is_empty() {
            match self.focus_direction {
                FocusDirection::Forward => self.focus_first(id),
                FocusDirection::Backward => self.focus_last(id),
            };
        }
    }

    /// Focus the first tab stop among `id`'s subviews.
    pub fn focus_first(&mut self, id: ViewId) -> bool {
        let candidates = self.subviews(id).to_vec();
        self.focus_any(id, candidates)
    }

    /// Focus the last tab stop among `id`'s subviews.
    pub fn focus_last(&mut self, id: ViewId) -> bool {
        let mut candidates = self.subviews(id).to_vec();
        candidates.reverse();
        self.focus_any(id, candidates)
    }

    fn focus_any(&mut self, id: ViewId, candidates: Vec<ViewId>) -> bool {
        if !self.can_be_visible(id) {
            return false;
        }
        match candidates.into_iter().find(|v| self.is_focus_candidate(*v)) {
            Some(view) => {
                self.focus_child(id, view);
                true
            }
            None => false,
        }
    }

    /// Move focus to the next tab stop below `id`, wrapping around.
    ///
    /// Returns `false` (and clears focus) only when no tab stop exists.
    pub fn focus_next(&mut self, id: ViewId) -> bool {
        self.focus_direction = FocusDirection::Forward;
        self.advance(id, FocusDirection::Forward, true)
    }

    /// Move focus to the previous tab stop below `id`, wrapping around.
    pub fn focus_prev(&mut self, id: ViewId) -> bool {
        self.focus_direction = FocusDirection::Backward;
        self.advance(id, FocusDirection::Backward, true)
    }

    fn advance(&mut self, id: ViewId, direction: FocusDirection, wrap: bool) -> bool {
        if !self.can_be_visible(id) {
            return false;
        }
        let mut order = self.subviews(id).to_vec();
        if order.is_empty() {
            return false;
        }
        if direction == FocusDirection::Backward {
            order.reverse();
        }

        let focused = self
            .node(id)
            .focused()
            .filter(|f| self.node(*f).has_focus());
        let Some(current) = focused else {
            return match direction {
                FocusDirection::Forward => self.focus_first(id),
                FocusDirection::Backward => self.focus_last(id),
            };
        };

        // Nested containers get to move within themselves first.
        if self.advance(current, direction, false) {
            return true;
        }

        let index = order.iter().position(|v| *v == current).unwrap_or(0);
        let mut candidates = order[index + 1..].to_vec();
        if wrap {
            candidates.extend_from_slice(&order[..index]);
        }
        if let Some(next) = candidates.into_iter().find(|v| self.is_focus_candidate(*v)) {
            self.set_has_focus(current, false);
            self.focus_child(id, next);
            return true;
        }

        if !wrap {
            return false;
        }
        if self.is_focus_candidate(current) {
            // The only tab stop: restart inside it.
            if !self.subviews(current).is_empty() {
                self.set_has_focus(current, false);
                self.focus_child(id, current);
            }
            return true;
        }
        self.set_has_focus(current, false);
        self.node_mut(id).focused = None;
        false
    }

    /// Hand focus on after `id` stopped being focusable.
    pub(crate) fn yield_focus(&mut self, id: ViewId) {
        if !self.node(id).has_focus() {
            return;
        }
        self.set_has_focus(id, false);
        let Some(parent) = self.parent(id) else {
            return;
        };
        if self.node(parent).focused() == Some(id) {
            self.node_mut(parent).focused = None;
            self.ensure_focus(parent);
            if self.node(parent).focused().is_none() {
                let root = self.root_of(parent);
                self.focus_next(root);
            }
        }
    }

    /// The leaf of `id`'s focus chain.
    pub fn most_focused(&self, id: ViewId) -> Option<ViewId> {
        let mut current = self.view(id)?.focused()?;
        while let Some(next) = self.node(current).focused() {
            current = next;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::tree::{View, ViewId, ViewTree};
    use crate::widget::{Cx, Widget};
    use ratatui::layout::Rect;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Tracker(&'static str, Log);

    impl Widget for Tracker {
        fn on_focus_enter(&mut self, _cx: &mut Cx<'_>) {
            self.1.lock().unwrap().push(format!("enter {}", self.0));
        }

        fn on_focus_leave(&mut self, _cx: &mut Cx<'_>) {
            self.1.lock().unwrap().push(format!("leave {}", self.0));
        }
    }

    fn field(tree: &mut ViewTree, parent: ViewId, focusable: bool) -> ViewId {
        let id = tree.insert(
            View::new()
                .with_frame(Rect::new(0, 0, 4, 1))
                .can_focus(focusable),
        );
        tree.add(parent, id).unwrap();
        id
    }

    fn root(tree: &mut ViewTree) -> ViewId {
        tree.insert(View::toplevel().with_frame(Rect::new(0, 0, 20, 10)))
    }

    #[test]
    fn next_and_prev_skip_unfocusable_views() {
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let a = field(&mut tree, top, true);
        let _b = field(&mut tree, top, false);
        let c = field(&mut tree, top, true);

        assert!(tree.focus_first(top));
        assert_eq!(tree.most_focused(top), Some(a));
        assert!(tree.focus_next(top));
        assert_eq!(tree.most_focused(top), Some(c));
        assert!(tree.focus_next(top));
        assert_eq!(tree.most_focused(top), Some(a));

        assert!(tree.focus_prev(top));
        assert_eq!(tree.most_focused(top), Some(c));
        assert!(tree.focus_prev(top));
        assert_eq!(tree.most_focused(top), Some(a));
    }

    #[test]
    fn traversal_crosses_nested_containers() {
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let panel = tree.insert(View::new().with_frame(Rect::new(0, 0, 10, 5)));
        tree.add(top, panel).unwrap();
        let x = field(&mut tree, panel, true);
        let y = field(&mut tree, panel, true);
        let z = field(&mut tree, top, true);

        tree.focus_first(top);
        assert_eq!(tree.most_focused(top), Some(x));
        tree.focus_next(top);
        assert_eq!(tree.most_focused(top), Some(y));
        tree.focus_next(top);
        assert_eq!(tree.most_focused(top), Some(z));
        assert!(!tree.view(panel).unwrap().has_focus());
        tree.focus_next(top);
        assert_eq!(tree.most_focused(top), Some(x));

        // Entering the panel backwards lands on its last field.
        tree.focus_prev(top);
        assert_eq!(tree.most_focused(top), Some(z));
        tree.focus_prev(top);
        assert_eq!(tree.most_focused(top), Some(y));
    }

    #[test]
    fn nothing_focusable_clears_focus() {
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let a = field(&mut tree, top, true);
        tree.focus(a).unwrap();
        tree.set_can_focus(a, false).unwrap();
        assert!(!tree.focus_next(top));
        assert_eq!(tree.most_focused(top), None);
        assert!(!tree.view(a).unwrap().has_focus());
    }

    #[test]
    fn single_tab_stop_keeps_focus() {
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let a = field(&mut tree, top, true);
        tree.focus_first(top);
        assert!(tree.focus_next(top));
        assert_eq!(tree.most_focused(top), Some(a));
        assert!(tree.view(a).unwrap().has_focus());
    }

    #[test]
    fn focusing_outside_the_container_fails() {
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let other = root(&mut tree);
        let stray = field(&mut tree, other, true);
        let err = tree.set_focus_in(top, stray).unwrap_err();
        assert!(matches!(err, Error::NotDescendant { container, view } if container == top && view == stray));
    }

    #[test]
    fn deep_focus_marks_the_whole_path() {
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let panel = tree.insert(View::new().with_frame(Rect::new(0, 0, 10, 5)));
        tree.add(top, panel).unwrap();
        let _x = field(&mut tree, panel, true);
        let y = field(&mut tree, panel, true);

        tree.set_focus_in(top, y).unwrap();
        assert!(tree.view(top).unwrap().has_focus());
        assert!(tree.view(panel).unwrap().has_focus());
        assert_eq!(tree.view(top).unwrap().focused(), Some(panel));
        assert_eq!(tree.most_focused(top), Some(y));
        assert_eq!(tree.pending_activation, Some(top));
    }

    #[test]
    fn focus_changes_fire_leave_before_enter() {
        let log: Log = Arc::default();
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let a = tree.insert(
            View::new()
                .with_frame(Rect::new(0, 0, 4, 1))
                .can_focus(true)
                .with_handler(Tracker("a", Arc::clone(&log))),
        );
        let b = tree.insert(
            View::new()
                .with_frame(Rect::new(0, 1, 4, 1))
                .can_focus(true)
                .with_handler(Tracker("b", Arc::clone(&log))),
        );
        tree.add(top, a).unwrap();
        tree.add(top, b).unwrap();

        tree.focus(a).unwrap();
        tree.focus(b).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["enter a", "leave a", "enter b"]);
    }

    #[test]
    fn disabling_the_focused_view_moves_focus_on() {
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let a = field(&mut tree, top, true);
        let b = field(&mut tree, top, true);
        tree.focus(a).unwrap();
        tree.set_enabled(a, false).unwrap();
        assert_eq!(tree.most_focused(top), Some(b));

        tree.set_visible(b, false).unwrap();
        assert_eq!(tree.most_focused(top), None);
    }

    #[test]
    fn disabled_views_refuse_focus() {
        let mut tree = ViewTree::new();
        let top = root(&mut tree);
        let a = tree.insert(
            View::new()
                .with_frame(Rect::new(0, 0, 4, 1))
                .can_focus(true)
                .enabled(false),
        );
        tree.add(top, a).unwrap();
        tree.focus(a).unwrap();
        assert!(!tree.view(a).unwrap().has_focus());
        assert!(!tree.focus_first(top));
    }
}
