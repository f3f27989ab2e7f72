//! Deferred position and size expressions and the layout pass that resolves
//! them.
//!
//! A [`Computed`](LayoutStyle::Computed) view derives its frame from four
//! expressions evaluated against its superview's bounds. Expressions may refer
//! to sibling views, so [`ViewTree::layout_subviews`] orders the siblings
//! topologically before resolving them and reports reference cycles as
//! [`Error::LayoutCycle`].

use crate::error::{Error, Result};
use crate::tree::{ViewId, ViewTree};
use ratatui::layout::Rect;
use std::ops;

/// How a view's frame is maintained.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStyle {
    /// The frame is set explicitly and never recomputed.
    Absolute,
    /// The frame is derived from the view's [`Pos`] and [`Dim`] expressions.
    #[default]
    Computed,
}

/// A deferred coordinate along one axis of the superview.
#[derive(Debug, Clone, PartialEq)]
pub enum Pos {
    /// A fixed offset from the superview's origin.
    At(i32),
    /// A percentage (0-100) of the superview's extent.
    Percent(f32),
    /// Centred; resolved once the view's own size is known.
    Center,
    /// `n` cells before the superview's far edge.
    AnchorEnd(i32),
    /// The left edge of a sibling (or 0 for the superview itself).
    Left(ViewId),
    Top(ViewId),
    /// The right edge of a sibling (or the superview's width).
    Right(ViewId),
    Bottom(ViewId),
    Add(Box<Pos>, Box<Pos>),
    Sub(Box<Pos>, Box<Pos>),
}

/// A deferred extent along one axis of the superview.
#[derive(Debug, Clone, PartialEq)]
pub enum Dim {
    Sized(i32),
    /// A percentage (0-100) of the superview's extent.
    Percent(f32),
    /// Everything from the view's position to the far edge, minus a margin.
    Fill(i32),
    /// The width of a sibling (or the superview itself).
    Width(ViewId),
    Height(ViewId),
    Add(Box<Dim>, Box<Dim>),
    Sub(Box<Dim>, Box<Dim>),
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

impl Pos {
    fn has_center(&self) -> bool {
        match self {
            Pos::Center => true,
            Pos::Add(a, b) | Pos::Sub(a, b) => a.has_center() || b.has_center(),
            _ => false,
        }
    }

    fn references(&self, out: &mut Vec<ViewId>) {
        match self {
            Pos::Left(v) | Pos::Top(v) | Pos::Right(v) | Pos::Bottom(v) => out.push(*v),
            Pos::Add(a, b) | Pos::Sub(a, b) => {
                a.references(out);
                b.references(out);
            }
            _ => {}
        }
    }

    fn anchor(&self, tree: &ViewTree, superview: Option<ViewId>, extent: i32, size: i32) -> i32 {
        match self {
            Pos::At(n) => *n,
            Pos::Percent(p) => (extent as f32 * p / 100.0) as i32,
            Pos::Center => (extent - size) / 2,
            Pos::AnchorEnd(margin) => extent - margin,
            Pos::Left(v) => reference(tree, superview, *v).x,
            Pos::Top(v) => reference(tree, superview, *v).y,
            Pos::Right(v) => {
                let r = reference(tree, superview, *v);
                r.x + r.width
            }
            Pos::Bottom(v) => {
                let r = reference(tree, superview, *v);
                r.y + r.height
            }
            Pos::Add(a, b) => {
                a.anchor(tree, superview, extent, size) + b.anchor(tree, superview, extent, size)
            }
            Pos::Sub(a, b) => {
                a.anchor(tree, superview, extent, size) - b.anchor(tree, superview, extent, size)
            }
        }
    }
}

impl Dim {
    fn references(&self, out: &mut Vec<ViewId>) {
        match self {
            Dim::Width(v) | Dim::Height(v) => out.push(*v),
            Dim::Add(a, b) | Dim::Sub(a, b) => {
                a.references(out);
                b.references(out);
            }
            _ => {}
        }
    }

    /// Percentages take the full `extent`; fills take what remains past
    /// `location`. Arithmetic applies the same rule to each operand.
    fn anchor(&self, tree: &ViewTree, superview: Option<ViewId>, location: i32, extent: i32) -> i32 {
        match self {
            Dim::Sized(n) => *n,
            Dim::Percent(p) => (extent as f32 * p / 100.0) as i32,
            Dim::Fill(margin) => (extent - location - margin).max(0),
            Dim::Width(v) => reference(tree, superview, *v).width,
            Dim::Height(v) => reference(tree, superview, *v).height,
            Dim::Add(a, b) => {
                a.anchor(tree, superview, location, extent) + b.anchor(tree, superview, location, extent)
            }
            Dim::Sub(a, b) => {
                a.anchor(tree, superview, location, extent) - b.anchor(tree, superview, location, extent)
            }
        }
    }

    /// The extent of a view starting at `location` inside `extent`.
    fn resolve(&self, tree: &ViewTree, superview: Option<ViewId>, location: i32, extent: i32) -> i32 {
        self.anchor(tree, superview, location, extent).max(0)
    }
}

/// A signed rectangle; referenced frames are read before clamping.
struct Frame {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

fn reference(tree: &ViewTree, superview: Option<ViewId>, target: ViewId) -> Frame {
    let Some(view) = tree.view(target) else {
        return Frame {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
    };
    let rect = if Some(target) == superview {
        view.bounds()
    } else {
        view.frame()
    };
    Frame {
        x: i32::from(rect.x),
        y: i32::from(rect.y),
        width: i32::from(rect.width),
        height: i32::from(rect.height),
    }
}

fn clamp_u16(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}

impl ops::Add<i32> for Pos {
    type Output = Pos;

    fn add(self, rhs: i32) -> Pos {
        Pos::Add(Box::new(self), Box::new(Pos::At(rhs)))
    }
}

impl ops::Sub<i32> for Pos {
    type Output = Pos;

    fn sub(self, rhs: i32) -> Pos {
        Pos::Sub(Box::new(self), Box::new(Pos::At(rhs)))
    }
}

impl ops::Add for Pos {
    type Output = Pos;

    fn add(self, rhs: Pos) -> Pos {
        Pos::Add(Box::new(self), Box::new(rhs))
    }
}

impl ops::Sub for Pos {
    type Output = Pos;

    fn sub(self, rhs: Pos) -> Pos {
        Pos::Sub(Box::new(self), Box::new(rhs))
    }
}

impl ops::Add<i32> for Dim {
    type Output = Dim;

    fn add(self, rhs: i32) -> Dim {
        Dim::Add(Box::new(self), Box::new(Dim::Sized(rhs)))
    }
}

impl ops::Sub<i32> for Dim {
    type Output = Dim;

    fn sub(self, rhs: i32) -> Dim {
        Dim::Sub(Box::new(self), Box::new(Dim::Sized(rhs)))
    }
}

impl ops::Add for Dim {
    type Output = Dim;

    fn add(self, rhs: Dim) -> Dim {
        Dim::Add(Box::new(self), Box::new(rhs))
    }
}

impl ops::Sub for Dim {
    type Output = Dim;

    fn sub(self, rhs: Dim) -> Dim {
        Dim::Sub(Box::new(self), Box::new(rhs))
    }
}

impl ViewTree {
    /// Mark `id`, its ancestors and its whole subtree as needing layout, so a
    /// single layout pass from the root resettles everything below.
    pub fn set_needs_layout(&mut self, id: ViewId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(view) = self.view_mut(current) {
                view.layout_needed = true;
                pending.extend(view.subviews.iter().copied());
            }
        }
        let mut current = self.parent(id);
        while let Some(parent) = current {
            self.node_mut(parent).layout_needed = true;
            current = self.parent(parent);
        }
    }

    /// Resolve a computed view's frame against a host of `host`'s size.
    pub fn set_relative_layout(&mut self, id: ViewId, host: Rect) {
        let Some(view) = self.view(id) else {
            return;
        };
        let superview = view.parent;
        let x = self.resolve_axis(superview, view.x(), view.width(), host, Axis::Horizontal);
        let y = self.resolve_axis(superview, view.y(), view.height(), host, Axis::Vertical);
        let frame = Rect::new(clamp_u16(x.0), clamp_u16(y.0), clamp_u16(x.1), clamp_u16(y.1));
        if frame != view.frame() {
            self.apply_frame(id, frame);
        }
    }

    fn resolve_axis(
        &self,
        superview: Option<ViewId>,
        pos: &Pos,
        dim: &Dim,
        host: Rect,
        axis: Axis,
    ) -> (i32, i32) {
        let extent = i32::from(match axis {
            Axis::Horizontal => host.width,
            Axis::Vertical => host.height,
        });
        if pos.has_center() {
            let size = dim.resolve(self, superview, 0, extent);
            (pos.anchor(self, superview, extent, size), size)
        } else {
            let location = pos.anchor(self, superview, extent, 0);
            (location, dim.resolve(self, superview, location, extent))
        }
    }

    /// Order `superview`'s subviews so every view comes after the siblings
    /// its expressions reference, keeping z-order among independent views.
    fn layout_order(&self, superview: ViewId) -> Result<Vec<ViewId>> {
        let nodes = self.subviews(superview).to_vec();
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for (to, &id) in nodes.iter().enumerate() {
            let view = self.node(id);
            if view.layout_style() != LayoutStyle::Computed {
                continue;
            }
            let mut targets = Vec::new();
            view.x().references(&mut targets);
            view.y().references(&mut targets);
            view.width().references(&mut targets);
            view.height().references(&mut targets);
            for target in targets {
                if target == superview {
                    continue;
                }
                let Some(from) = nodes.iter().position(|n| *n == target) else {
                    tracing::error!(?superview, ?target, "layout references a foreign view");
                    return Err(Error::LayoutForeignView { superview, target });
                };
                if !edges.contains(&(from, to)) {
                    edges.push((from, to));
                }
            }
        }

        let mut in_degree = vec![0usize; nodes.len()];
        for (_, to) in &edges {
            in_degree[*to] += 1;
        }
        let mut placed = vec![false; nodes.len()];
        let mut ordered = Vec::with_capacity(nodes.len());
        while ordered.len() < nodes.len() {
            let Some(next) = (0..nodes.len()).find(|i| !placed[*i] && in_degree[*i] == 0) else {
                let views: Vec<ViewId> = (0..nodes.len())
                    .filter(|i| !placed[*i])
                    .map(|i| nodes[i])
                    .collect();
                tracing::error!(?superview, ?views, "layout cycle");
                return Err(Error::LayoutCycle { superview, views });
            };
            placed[next] = true;
            ordered.push(nodes[next]);
            for (from, to) in &edges {
                if *from == next {
                    in_degree[*to] -= 1;
                }
            }
        }
        Ok(ordered)
    }

    /// Lay out `id`'s subviews (recursively) if anything below it changed.
    pub fn layout_subviews(&mut self, id: ViewId) -> Result<()> {
        if !self.get(id)?.layout_needed() {
            return Ok(());
        }
        self.with_widget(id, |w, cx| w.on_layout_started(cx));

        let ordered = self.layout_order(id)?;
        let host = self.node(id).bounds();
        for child in ordered {
            if self.node(child).layout_style() == LayoutStyle::Computed {
                self.set_relative_layout(child, host);
            }
            self.layout_subviews(child)?;
            self.node_mut(child).layout_needed = false;
        }

        self.node_mut(id).layout_needed = false;
        self.with_widget(id, |w, cx| w.on_layout_complete(cx));
        Ok(())
    }

    /// Lay out a root view (a toplevel) against the screen area.
    pub fn layout_root(&mut self, id: ViewId, screen: Rect) -> Result<()> {
        if self.get(id)?.layout_style() == LayoutStyle::Computed {
            self.set_relative_layout(id, screen);
        }
        self.layout_subviews(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::View;
    use crate::widget::{Cx, Widget};
    use std::sync::{Arc, Mutex};

    fn host(tree: &mut ViewTree, width: u16, height: u16) -> ViewId {
        tree.insert(View::new().with_frame(Rect::new(0, 0, width, height)))
    }

    fn child(tree: &mut ViewTree, parent: ViewId, view: View) -> ViewId {
        let id = tree.insert(view);
        tree.add(parent, id).unwrap();
        id
    }

    #[test]
    fn center_resolves_after_size() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 20, 10);
        let v = child(
            &mut tree,
            root,
            View::new()
                .with_pos(Pos::Center, Pos::Center)
                .with_size(Dim::Sized(6), Dim::Sized(2)),
        );
        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(v).unwrap().frame(), Rect::new(7, 4, 6, 2));
    }

    #[test]
    fn offset_center_shifts_the_centred_frame() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 20, 10);
        let v = child(
            &mut tree,
            root,
            View::new()
                .with_pos(Pos::Center + 1, Pos::At(0))
                .with_size(Dim::Sized(6), Dim::Sized(1)),
        );
        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(v).unwrap().frame().x, 8);
    }

    #[test]
    fn fill_measures_from_the_resolved_position() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 20, 10);
        let v = child(
            &mut tree,
            root,
            View::new()
                .with_pos(Pos::At(2), Pos::Percent(50.0))
                .with_size(Dim::Fill(1), Dim::Fill(0)),
        );
        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(v).unwrap().frame(), Rect::new(2, 5, 17, 5));
    }

    #[test]
    fn dim_arithmetic_keeps_the_position_offset() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 20, 10);
        let fill = child(
            &mut tree,
            root,
            View::new()
                .with_pos(Pos::At(2), Pos::At(0))
                .with_size(Dim::Fill(0) - 1, Dim::Sized(1)),
        );
        let half = child(
            &mut tree,
            root,
            View::new()
                .with_pos(Pos::At(4), Pos::At(1))
                .with_size(Dim::Percent(50.0) + 2, Dim::Sized(1)),
        );
        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(fill).unwrap().frame(), Rect::new(2, 0, 17, 1));
        assert_eq!(tree.view(half).unwrap().frame(), Rect::new(4, 1, 12, 1));
    }

    #[test]
    fn anchor_end_and_percent_size() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 40, 10);
        let v = child(
            &mut tree,
            root,
            View::new()
                .with_pos(Pos::AnchorEnd(10), Pos::AnchorEnd(1))
                .with_size(Dim::Percent(25.0), Dim::Sized(1)),
        );
        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(v).unwrap().frame(), Rect::new(30, 9, 10, 1));
    }

    #[test]
    fn siblings_are_resolved_in_dependency_order() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 30, 5);
        // `b` comes first in z-order but depends on `a`.
        let b = child(&mut tree, root, View::new());
        let a = child(
            &mut tree,
            root,
            View::new()
                .with_pos(Pos::At(3), Pos::At(1))
                .with_size(Dim::Sized(5), Dim::Sized(1)),
        );
        tree.set_x(b, Pos::Right(a) + 1).unwrap();
        tree.set_y(b, Pos::Top(a)).unwrap();
        tree.set_width(b, Dim::Width(a)).unwrap();
        tree.set_height(b, Dim::Height(a)).unwrap();

        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(b).unwrap().frame(), Rect::new(9, 1, 5, 1));
        assert_eq!(tree.layout_order(root).unwrap(), vec![a, b]);
    }

    #[test]
    fn superview_references_use_its_bounds() {
        let mut tree = ViewTree::new();
        let root = tree.insert(View::new().with_frame(Rect::new(5, 5, 20, 8)));
        let v = child(&mut tree, root, View::new());
        tree.set_x(v, Pos::Right(root) - 4).unwrap();
        tree.set_width(v, Dim::Sized(4)).unwrap();
        tree.set_height(v, Dim::Height(root)).unwrap();
        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(v).unwrap().frame(), Rect::new(16, 0, 4, 8));
    }

    #[test]
    fn reference_cycles_are_reported() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 30, 5);
        let a = child(&mut tree, root, View::new());
        let b = child(&mut tree, root, View::new());
        let c = child(&mut tree, root, View::new().with_size(Dim::Sized(1), Dim::Sized(1)));
        tree.set_x(a, Pos::Right(b)).unwrap();
        tree.set_x(b, Pos::Right(a)).unwrap();

        let err = tree.layout_subviews(root).unwrap_err();
        let Error::LayoutCycle { superview, views } = err else {
            panic!("expected a layout cycle, got {err:?}");
        };
        assert_eq!(superview, root);
        assert_eq!(views, vec![a, b]);
        assert!(!views.contains(&c));
        assert!(tree.view(root).unwrap().layout_needed());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 10, 5);
        let a = child(&mut tree, root, View::new());
        tree.set_width(a, Dim::Width(a)).unwrap();
        assert!(matches!(
            tree.layout_subviews(root),
            Err(Error::LayoutCycle { .. })
        ));
    }

    #[test]
    fn foreign_references_are_rejected() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 10, 5);
        let panel = child(&mut tree, root, View::new());
        let nested = child(&mut tree, panel, View::new());
        let a = child(&mut tree, root, View::new());
        tree.set_x(a, Pos::Left(nested)).unwrap();
        assert!(matches!(
            tree.layout_subviews(root),
            Err(Error::LayoutForeignView { target, .. }) if target == nested
        ));
    }

    #[test]
    fn absolute_views_keep_their_frame() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 10, 5);
        let a = child(&mut tree, root, View::new().with_frame(Rect::new(1, 1, 3, 1)));
        tree.set_frame(root, Rect::new(0, 0, 4, 4)).unwrap();
        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(a).unwrap().frame(), Rect::new(1, 1, 3, 1));
    }

    #[test]
    fn deep_mutation_resettles_from_the_root() {
        let mut tree = ViewTree::new();
        let root = host(&mut tree, 20, 10);
        let panel = child(&mut tree, root, View::new().with_size(Dim::Fill(0), Dim::Fill(0)));
        let leaf = child(&mut tree, panel, View::new().with_size(Dim::Sized(2), Dim::Sized(1)));
        tree.layout_subviews(root).unwrap();
        assert!(!tree.view(root).unwrap().layout_needed());

        tree.set_x(leaf, Pos::AnchorEnd(2)).unwrap();
        assert!(tree.view(panel).unwrap().layout_needed());
        assert!(tree.view(root).unwrap().layout_needed());

        tree.layout_subviews(root).unwrap();
        assert_eq!(tree.view(leaf).unwrap().frame().x, 18);
        for id in [root, panel, leaf] {
            assert!(!tree.view(id).unwrap().layout_needed());
        }
    }

    #[test]
    fn root_lays_out_against_the_screen() {
        let mut tree = ViewTree::new();
        let top = tree.insert(View::toplevel());
        tree.layout_root(top, Rect::new(0, 0, 80, 24)).unwrap();
        assert_eq!(tree.view(top).unwrap().frame(), Rect::new(0, 0, 80, 24));
    }

    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    impl Widget for Recorder {
        fn on_layout_started(&mut self, _cx: &mut Cx<'_>) {
            self.0.lock().unwrap().push("started");
        }

        fn on_layout_complete(&mut self, _cx: &mut Cx<'_>) {
            self.0.lock().unwrap().push("complete");
        }
    }

    #[test]
    fn layout_notifies_the_container() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tree = ViewTree::new();
        let root = tree.insert(
            View::new()
                .with_frame(Rect::new(0, 0, 5, 5))
                .with_handler(Recorder(Arc::clone(&log))),
        );
        tree.layout_subviews(root).unwrap();
        tree.layout_subviews(root).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["started", "complete"]);
    }
}
