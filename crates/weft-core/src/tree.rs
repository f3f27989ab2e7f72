//! The view arena: hierarchy, invalidation and drawing.
//!
//! Views live in a [`ViewTree`] and are addressed by [`ViewId`]. A parent owns
//! the ordered list of its subviews (z-order and tab order); each subview keeps
//! one non-owning back-reference to its parent. Layout lives in
//! [`layout`](crate::layout), focus in [`focus`](crate::focus) and key dispatch
//! in [`input`](crate::input); all of them are further `impl ViewTree` blocks.

use crate::canvas::Canvas;
use crate::driver::ConsoleDriver;
use crate::error::{Error, Result};
use crate::event::Point;
use crate::key::{Command, KeyBindings, KeyCombination};
use crate::layout::{Dim, LayoutStyle, Pos};
use crate::scheme::ColorScheme;
use crate::widget::{Cx, Request, Widget};
use crossterm::event::KeyCode;
use ratatui::layout::Rect;
use slotmap::SlotMap;
use std::any::Any;

slotmap::new_key_type! {
    /// Handle to a view stored in a [`ViewTree`].
    pub struct ViewId;
}

/// Direction the most recent focus traversal moved in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FocusDirection {
    #[default]
    Forward,
    Backward,
}

/// State carried only by toplevels.
#[derive(Debug, Clone, Default)]
pub(crate) struct ToplevelState {
    pub(crate) running: bool,
    pub(crate) modal: bool,
    pub(crate) overlapped_container: bool,
    pub(crate) ready_sent: bool,
}

/// A rectangular node of the view hierarchy.
///
/// Build one with the `with_*` methods, then hand it to [`ViewTree::insert`].
/// Properties whose change must propagate (frame, layout expressions,
/// visibility, focusability) are changed through the tree afterwards.
pub struct View {
    pub(crate) id: String,
    pub(crate) parent: Option<ViewId>,
    pub(crate) subviews: Vec<ViewId>,
    pub(crate) frame: Rect,
    pub(crate) layout_style: LayoutStyle,
    pub(crate) x: Pos,
    pub(crate) y: Pos,
    pub(crate) width: Dim,
    pub(crate) height: Dim,
    pub(crate) can_focus: bool,
    pub(crate) has_focus: bool,
    pub(crate) focused: Option<ViewId>,
    pub(crate) tab_stop: bool,
    pub(crate) visible: bool,
    pub(crate) enabled: bool,
    pub(crate) color_scheme: Option<ColorScheme>,
    pub(crate) needs_display: Rect,
    pub(crate) child_needs_display: bool,
    pub(crate) layout_needed: bool,
    pub(crate) initialized: bool,
    pub(crate) want_mouse_position_reports: bool,
    pub(crate) key_bindings: KeyBindings,
    pub(crate) toplevel: Option<ToplevelState>,
    pub(crate) widget: Option<Box<dyn Widget>>,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("frame", &self.frame)
            .field("layout_style", &self.layout_style)
            .field("subviews", &self.subviews.len())
            .field("has_focus", &self.has_focus)
            .field("toplevel", &self.toplevel.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl View {
    /// A computed-layout view at (0, 0) with zero size.
    pub fn new() -> Self {
        Self {
            id: String::new(),
            parent: None,
            subviews: Vec::new(),
            frame: Rect::default(),
            layout_style: LayoutStyle::Computed,
            x: Pos::At(0),
            y: Pos::At(0),
            width: Dim::Sized(0),
            height: Dim::Sized(0),
            can_focus: false,
            has_focus: false,
            focused: None,
            tab_stop: true,
            visible: true,
            enabled: true,
            color_scheme: None,
            needs_display: Rect::default(),
            child_needs_display: false,
            layout_needed: true,
            initialized: false,
            want_mouse_position_reports: false,
            key_bindings: KeyBindings::new(),
            toplevel: None,
            widget: None,
        }
    }

    /// A focusable toplevel filling its container, with the default
    /// navigation bindings.
    pub fn toplevel() -> Self {
        let mut view = Self::new().with_size(Dim::Fill(0), Dim::Fill(0));
        view.can_focus = true;
        view.toplevel = Some(ToplevelState::default());
        view.key_bindings
            .add(KeyCombination::ctrl(KeyCode::Char('q')), [Command::QuitToplevel]);
        view.key_bindings
            .add(KeyCombination::new(KeyCode::Tab), [Command::NextView]);
        view.key_bindings
            .add(KeyCombination::new(KeyCode::BackTab), [Command::PreviousView]);
        view.key_bindings
            .add(KeyCombination::new(KeyCode::F(5)), [Command::Refresh]);
        view.key_bindings
            .add(KeyCombination::ctrl(KeyCode::Char('z')), [Command::Suspend]);
        view
    }

    /// Fix the frame; the view will never be re-laid out.
    pub fn with_frame(mut self, frame: Rect) -> Self {
        self.layout_style = LayoutStyle::Absolute;
        self.frame = frame;
        self
    }

    pub fn with_pos(mut self, x: Pos, y: Pos) -> Self {
        self.layout_style = LayoutStyle::Computed;
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_size(mut self, width: Dim, height: Dim) -> Self {
        self.layout_style = LayoutStyle::Computed;
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn can_focus(mut self, can_focus: bool) -> Self {
        self.can_focus = can_focus;
        self
    }

    pub fn with_scheme(mut self, scheme: ColorScheme) -> Self {
        self.color_scheme = Some(scheme);
        self
    }

    pub fn with_handler(mut self, widget: impl Widget) -> Self {
        self.widget = Some(Box::new(widget));
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Make a toplevel modal. No effect on ordinary views.
    pub fn modal(mut self, modal: bool) -> Self {
        if let Some(top) = self.toplevel.as_mut() {
            top.modal = modal;
        }
        self
    }

    /// Make a toplevel the overlapped (MDI) container.
    pub fn overlapped_container(mut self) -> Self {
        if let Some(top) = self.toplevel.as_mut() {
            top.overlapped_container = true;
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    pub fn subviews(&self) -> &[ViewId] {
        &self.subviews
    }

    /// The view's rectangle in its parent's bounds coordinates.
    pub fn frame(&self) -> Rect {
        self.frame
    }

    /// The view's own coordinate space: origin (0, 0), the frame's size.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.frame.width, self.frame.height)
    }

    pub fn layout_style(&self) -> LayoutStyle {
        self.layout_style
    }

    pub fn x(&self) -> &Pos {
        &self.x
    }

    pub fn y(&self) -> &Pos {
        &self.y
    }

    pub fn width(&self) -> &Dim {
        &self.width
    }

    pub fn height(&self) -> &Dim {
        &self.height
    }

    pub fn is_focusable(&self) -> bool {
        self.can_focus
    }

    pub fn has_focus(&self) -> bool {
        self.has_focus
    }

    /// The subview holding focus within this view.
    pub fn focused(&self) -> Option<ViewId> {
        self.focused
    }

    pub fn tab_stop(&self) -> bool {
        self.tab_stop
    }

    pub fn set_tab_stop(&mut self, tab_stop: bool) {
        self.tab_stop = tab_stop;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn color_scheme(&self) -> Option<&ColorScheme> {
        self.color_scheme.as_ref()
    }

    /// The dirty rectangle, in bounds coordinates. Empty when clean.
    pub fn needs_display(&self) -> Rect {
        self.needs_display
    }

    pub fn child_needs_display(&self) -> bool {
        self.child_needs_display
    }

    pub fn layout_needed(&self) -> bool {
        self.layout_needed
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn wants_mouse_position_reports(&self) -> bool {
        self.want_mouse_position_reports
    }

    pub fn set_want_mouse_position_reports(&mut self, want: bool) {
        self.want_mouse_position_reports = want;
    }

    pub fn key_bindings(&self) -> &KeyBindings {
        &self.key_bindings
    }

    pub fn key_bindings_mut(&mut self) -> &mut KeyBindings {
        &mut self.key_bindings
    }

    pub fn is_toplevel(&self) -> bool {
        self.toplevel.is_some()
    }

    pub fn is_modal(&self) -> bool {
        self.toplevel.as_ref().is_some_and(|t| t.modal)
    }

    pub fn set_modal(&mut self, modal: bool) {
        if let Some(top) = self.toplevel.as_mut() {
            top.modal = modal;
        }
    }

    pub fn is_running(&self) -> bool {
        self.toplevel.as_ref().is_some_and(|t| t.running)
    }

    pub fn is_overlapped_container(&self) -> bool {
        self.toplevel
            .as_ref()
            .is_some_and(|t| t.overlapped_container)
    }
}

/// Arena owning every view of an application.
#[derive(Debug, Default)]
pub struct ViewTree {
    nodes: SlotMap<ViewId, View>,
    requests: Vec<Request>,
    pub(crate) pending_activation: Option<ViewId>,
    pub(crate) focus_direction: FocusDirection,
    base_scheme: ColorScheme,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a detached view and return its handle.
    pub fn insert(&mut self, view: View) -> ViewId {
        let id = self.nodes.insert(view);
        tracing::trace!(?id, "view inserted");
        id
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.nodes.get(id)
    }

    /// Mutable access for properties that do not propagate. Use the tree's
    /// setters for frame, layout, visibility and focus changes.
    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.nodes.get_mut(id)
    }

    pub fn get(&self, id: ViewId) -> Result<&View> {
        self.nodes.get(id).ok_or(Error::UnknownView(id))
    }

    pub(crate) fn node(&self, id: ViewId) -> &View {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: ViewId) -> &mut View {
        &mut self.nodes[id]
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(id).and_then(|v| v.parent)
    }

    pub fn subviews(&self, id: ViewId) -> &[ViewId] {
        self.nodes.get(id).map_or(&[], |v| v.subviews.as_slice())
    }

    /// The root of the hierarchy `id` belongs to.
    pub fn root_of(&self, id: ViewId) -> ViewId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Whether `view` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, view: ViewId, ancestor: ViewId) -> bool {
        let mut current = self.parent(view);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Find the first view in `root`'s subtree whose id string is `name`.
    pub fn find_by_id(&self, root: ViewId, name: &str) -> Option<ViewId> {
        let view = self.nodes.get(root)?;
        if view.id == name {
            return Some(root);
        }
        view.subviews
            .iter()
            .find_map(|child| self.find_by_id(*child, name))
    }

    /// Attach `child` as the topmost subview of `parent`.
    ///
    /// Focusability bubbles up: a focusable child makes every ancestor
    /// focusable. Both ends are marked for layout and redraw.
    pub fn add(&mut self, parent: ViewId, child: ViewId) -> Result<()> {
        self.get(parent)?;
        self.get(child)?;
        if child == parent || self.is_descendant(parent, child) {
            tracing::error!(?parent, ?child, "adding a view below itself");
            return Err(Error::WouldCycle { parent, child });
        }
        if let Some(old) = self.nodes[child].parent {
            self.remove(old, child)?;
        }

        self.nodes[parent].subviews.push(child);
        self.nodes[child].parent = Some(parent);

        if self.nodes[child].can_focus {
            let mut current = Some(parent);
            while let Some(id) = current {
                if self.nodes[id].can_focus {
                    break;
                }
                self.nodes[id].can_focus = true;
                current = self.nodes[id].parent;
            }
        }

        self.set_needs_layout(parent);
        self.set_needs_layout(child);
        self.set_needs_display_all(parent);

        if self.nodes[parent].initialized && !self.nodes[child].initialized {
            self.initialize(child);
        }
        tracing::trace!(?parent, ?child, "view added");
        Ok(())
    }

    /// Detach `child` from `parent`. If it held focus, the focus chain is
    /// truncated at `parent`.
    pub fn remove(&mut self, parent: ViewId, child: ViewId) -> Result<()> {
        self.get(parent)?;
        self.get(child)?;
        let Some(index) = self.nodes[parent].subviews.iter().position(|v| *v == child) else {
            return Err(Error::NotDescendant {
                container: parent,
                view: child,
            });
        };

        self.set_needs_layout(parent);
        let touched = self.nodes[child].frame;
        self.nodes[parent].subviews.remove(index);
        self.nodes[child].parent = None;

        if self.nodes[parent].focused == Some(child) {
            self.set_has_focus(child, false);
            self.nodes[parent].focused = None;
        }
        self.set_needs_display(parent, touched);
        tracing::trace!(?parent, ?child, "view removed");
        Ok(())
    }

    /// Drop a detached view and its whole subtree.
    pub fn dispose(&mut self, id: ViewId) -> Result<()> {
        let view = self.get(id)?;
        if view.parent.is_some() {
            return Err(Error::StillAttached(id));
        }
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(view) = self.nodes.remove(current) {
                pending.extend(view.subviews);
            }
        }
        if self.pending_activation == Some(id) {
            self.pending_activation = None;
        }
        tracing::trace!(?id, "view disposed");
        Ok(())
    }

    /// Move `child` to the top of `parent`'s z-order.
    pub fn bring_subview_to_front(&mut self, parent: ViewId, child: ViewId) {
        let Some(view) = self.nodes.get_mut(parent) else {
            return;
        };
        if let Some(index) = view.subviews.iter().position(|v| *v == child) {
            if index + 1 != view.subviews.len() {
                view.subviews.remove(index);
                view.subviews.push(child);
                self.set_needs_display_all(parent);
            }
        }
    }

    /// Move `child` to the bottom of `parent`'s z-order.
    pub fn send_subview_to_back(&mut self, parent: ViewId, child: ViewId) {
        let Some(view) = self.nodes.get_mut(parent) else {
            return;
        };
        if let Some(index) = view.subviews.iter().position(|v| *v == child) {
            if index != 0 {
                view.subviews.remove(index);
                view.subviews.insert(0, child);
                self.set_needs_display_all(parent);
            }
        }
    }

    /// Mark `id`'s subtree as initialized.
    pub(crate) fn initialize(&mut self, id: ViewId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let view = &mut self.nodes[current];
            view.initialized = true;
            pending.extend(view.subviews.iter().copied());
        }
    }

    /// Fix `id`'s frame and switch it to absolute layout.
    pub fn set_frame(&mut self, id: ViewId, frame: Rect) -> Result<()> {
        self.get(id)?;
        self.nodes[id].layout_style = LayoutStyle::Absolute;
        self.apply_frame(id, frame);
        Ok(())
    }

    pub(crate) fn apply_frame(&mut self, id: ViewId, frame: Rect) {
        let old = self.nodes[id].frame;
        if let Some(parent) = self.nodes[id].parent {
            self.set_needs_display(parent, old);
            self.set_needs_display(parent, frame);
        }
        self.nodes[id].frame = frame;
        self.set_needs_layout(id);
        self.set_needs_display_all(id);
    }

    pub fn set_x(&mut self, id: ViewId, x: Pos) -> Result<()> {
        self.update_layout(id, |v| v.x = x)
    }

    pub fn set_y(&mut self, id: ViewId, y: Pos) -> Result<()> {
        self.update_layout(id, |v| v.y = y)
    }

    pub fn set_width(&mut self, id: ViewId, width: Dim) -> Result<()> {
        self.update_layout(id, |v| v.width = width)
    }

    pub fn set_height(&mut self, id: ViewId, height: Dim) -> Result<()> {
        self.update_layout(id, |v| v.height = height)
    }

    fn update_layout(&mut self, id: ViewId, f: impl FnOnce(&mut View)) -> Result<()> {
        let view = self.nodes.get_mut(id).ok_or(Error::UnknownView(id))?;
        f(view);
        view.layout_style = LayoutStyle::Computed;
        self.set_needs_layout(id);
        self.set_needs_display_all(id);
        Ok(())
    }

    pub fn set_visible(&mut self, id: ViewId, visible: bool) -> Result<()> {
        let view = self.nodes.get_mut(id).ok_or(Error::UnknownView(id))?;
        if view.visible == visible {
            return Ok(());
        }
        view.visible = visible;
        if !visible {
            self.yield_focus(id);
        }
        self.invalidate_frame(id);
        Ok(())
    }

    pub fn set_enabled(&mut self, id: ViewId, enabled: bool) -> Result<()> {
        let view = self.nodes.get_mut(id).ok_or(Error::UnknownView(id))?;
        if view.enabled == enabled {
            return Ok(());
        }
        view.enabled = enabled;
        if !enabled {
            self.yield_focus(id);
        }
        self.set_needs_display_all(id);
        Ok(())
    }

    pub fn set_can_focus(&mut self, id: ViewId, can_focus: bool) -> Result<()> {
        let view = self.nodes.get_mut(id).ok_or(Error::UnknownView(id))?;
        if view.can_focus == can_focus {
            return Ok(());
        }
        view.can_focus = can_focus;
        if !can_focus {
            self.yield_focus(id);
        }
        Ok(())
    }

    pub fn set_color_scheme(&mut self, id: ViewId, scheme: Option<ColorScheme>) -> Result<()> {
        self.nodes
            .get_mut(id)
            .ok_or(Error::UnknownView(id))?
            .color_scheme = scheme;
        self.set_needs_display_all(id);
        Ok(())
    }

    /// The scheme used when no view on the ancestor chain sets one.
    pub fn set_base_scheme(&mut self, scheme: ColorScheme) {
        self.base_scheme = scheme;
    }

    /// The effective scheme of `id`: its own, or the nearest ancestor's.
    pub fn color_scheme(&self, id: ViewId) -> ColorScheme {
        let mut current = Some(id);
        while let Some(view) = current.and_then(|id| self.nodes.get(id)) {
            if let Some(scheme) = view.color_scheme {
                return scheme;
            }
            current = view.parent;
        }
        self.base_scheme
    }

    /// Whether `id` and every ancestor are visible.
    pub fn can_be_visible(&self, id: ViewId) -> bool {
        let mut current = Some(id);
        while let Some(view) = current.and_then(|id| self.nodes.get(id)) {
            if !view.visible {
                return false;
            }
            current = view.parent;
        }
        true
    }

    /// Screen coordinates of `id`'s bounds origin.
    pub fn screen_origin(&self, id: ViewId) -> Point {
        let mut origin = Point::default();
        let mut current = Some(id);
        while let Some(view) = current.and_then(|id| self.nodes.get(id)) {
            origin.x += i32::from(view.frame.x);
            origin.y += i32::from(view.frame.y);
            current = view.parent;
        }
        origin
    }

    /// Map a point in `id`'s bounds to screen coordinates.
    pub fn view_to_screen(&self, id: ViewId, col: i32, row: i32) -> Point {
        let origin = self.screen_origin(id);
        Point::new(origin.x + col, origin.y + row)
    }

    /// Map a screen point into `id`'s bounds coordinates.
    pub fn screen_to_view(&self, id: ViewId, x: i32, y: i32) -> Point {
        let origin = self.screen_origin(id);
        Point::new(x - origin.x, y - origin.y)
    }

    /// `id`'s frame in screen coordinates, without ancestor clipping.
    pub fn screen_frame(&self, id: ViewId) -> Rect {
        let origin = self.screen_origin(id);
        let size = self.nodes.get(id).map(|v| v.frame).unwrap_or_default();
        Rect::new(
            clamp_u16(origin.x),
            clamp_u16(origin.y),
            size.width,
            size.height,
        )
    }

    /// The screen region `id` may draw to: its screen frame intersected with
    /// every ancestor's.
    pub fn clip_rect(&self, id: ViewId) -> Rect {
        let mut clip = self.screen_frame(id);
        let mut current = self.parent(id);
        while let Some(parent) = current {
            clip = clip.intersection(self.screen_frame(parent));
            current = self.parent(parent);
        }
        clip
    }

    /// Union `region` (bounds coordinates) into `id`'s dirty rectangle and
    /// forward the overlapping part to every subview.
    pub fn set_needs_display(&mut self, id: ViewId, region: Rect) {
        if region.is_empty() {
            return;
        }
        let Some(view) = self.nodes.get_mut(id) else {
            return;
        };
        view.needs_display = if view.needs_display.is_empty() {
            region
        } else {
            view.needs_display.union(region)
        };
        let parent = view.parent;
        if let Some(parent) = parent {
            self.set_child_needs_display(parent);
        }

        let subviews = self.nodes[id].subviews.clone();
        for child in subviews {
            let frame = self.nodes[child].frame;
            if frame.intersects(region) {
                let overlap = frame.intersection(region);
                let local = Rect::new(
                    overlap.x - frame.x,
                    overlap.y - frame.y,
                    overlap.width,
                    overlap.height,
                );
                self.set_needs_display(child, local);
            }
        }
    }

    /// Mark all of `id` dirty.
    pub fn set_needs_display_all(&mut self, id: ViewId) {
        if let Some(view) = self.nodes.get(id) {
            let bounds = view.bounds();
            self.set_needs_display(id, bounds);
        }
    }

    fn set_child_needs_display(&mut self, id: ViewId) {
        let mut current = Some(id);
        while let Some(view) = current.and_then(|id| self.nodes.get_mut(id)) {
            view.child_needs_display = true;
            current = view.parent;
        }
    }

    /// Mark `id`'s old footprint dirty in its parent, then the view itself.
    fn invalidate_frame(&mut self, id: ViewId) {
        let frame = self.nodes[id].frame;
        if let Some(parent) = self.nodes[id].parent {
            self.set_needs_display(parent, frame);
        }
        self.set_needs_display_all(id);
    }

    /// Whether anything in `id`'s subtree awaits layout or redraw.
    pub fn is_dirty(&self, id: ViewId) -> bool {
        self.nodes.get(id).is_some_and(|v| {
            !v.needs_display.is_empty() || v.child_needs_display || v.layout_needed
        })
    }

    /// Repaint the dirty part of `id` and composite every dirty subview that
    /// intersects `bounds`.
    ///
    /// `id` itself is drawn only when its own dirty rectangle is non-empty,
    /// clipped to that rectangle, so clean siblings of a dirty view keep
    /// their cells. A subview's dirty state is cleared once it has been
    /// visited; `id`'s own state is cleared last.
    pub fn redraw(&mut self, driver: &mut dyn ConsoleDriver, id: ViewId, bounds: Rect) -> Result<()> {
        self.get(id)?;
        if !self.can_be_visible(id) {
            return Ok(());
        }
        let dirty = self.nodes[id].needs_display;
        if !dirty.is_empty() {
            self.draw_self(driver, id, dirty);
        }

        let own = self.nodes[id].bounds();
        let subviews = self.nodes[id].subviews.clone();
        for child in subviews {
            if !self.is_dirty(child) {
                continue;
            }
            let frame = self.nodes[child].frame;
            if frame.intersects(own) && frame.intersects(bounds) {
                if self.nodes[child].layout_needed {
                    self.layout_subviews(child)?;
                }
                let view = &self.nodes[child];
                if view.visible && view.frame.width > 0 && view.frame.height > 0 {
                    let child_bounds = view.bounds();
                    self.redraw(driver, child, child_bounds)?;
                }
            }
            let view = &mut self.nodes[child];
            view.needs_display = Rect::default();
            view.child_needs_display = false;
        }

        let view = &mut self.nodes[id];
        view.layout_needed = false;
        view.needs_display = Rect::default();
        view.child_needs_display = false;
        Ok(())
    }

    /// Draw `id`'s widget with output clipped to `region` (bounds coordinates).
    fn draw_self(&mut self, driver: &mut dyn ConsoleDriver, id: ViewId, region: Rect) {
        let origin = self.screen_origin(id);
        let dirty = Rect::new(
            clamp_u16(origin.x + i32::from(region.x)),
            clamp_u16(origin.y + i32::from(region.y)),
            region.width,
            region.height,
        );
        let clip = self.clip_rect(id).intersection(dirty);
        if clip.is_empty() {
            return;
        }
        let scheme = self.color_scheme(id);
        let view = &mut self.nodes[id];
        let bounds = view.bounds();
        let (has_focus, enabled) = (view.has_focus, view.enabled);
        let mut widget = view.widget.take();

        let saved = driver.clip();
        driver.set_clip(clip);
        {
            let mut canvas = Canvas::new(driver, origin, bounds, scheme, has_focus, enabled);
            match widget.as_mut() {
                Some(widget) => widget.draw(&mut canvas),
                None => canvas.clear(),
            }
        }
        driver.set_clip(saved);

        if let Some(view) = self.nodes.get_mut(id) {
            view.widget = widget;
        }
    }

    /// Call `f` with `id`'s widget detached from its node.
    ///
    /// Returns `None` if the view is unknown or has no widget (including
    /// while the widget is already executing).
    pub fn with_widget<R>(
        &mut self,
        id: ViewId,
        f: impl FnOnce(&mut dyn Widget, &mut Cx<'_>) -> R,
    ) -> Option<R> {
        let mut widget = self.nodes.get_mut(id)?.widget.take()?;
        let result = {
            let mut cx = Cx::new(self, id);
            f(widget.as_mut(), &mut cx)
        };
        if let Some(view) = self.nodes.get_mut(id) {
            view.widget = Some(widget);
        }
        Some(result)
    }

    /// Borrow `id`'s widget as its concrete type.
    pub fn widget<T: Widget>(&self, id: ViewId) -> Option<&T> {
        let widget: &dyn Any = self.nodes.get(id)?.widget.as_deref()?;
        widget.downcast_ref::<T>()
    }

    pub fn widget_mut<T: Widget>(&mut self, id: ViewId) -> Option<&mut T> {
        let widget: &mut dyn Any = self.nodes.get_mut(id)?.widget.as_deref_mut()?;
        widget.downcast_mut::<T>()
    }

    pub(crate) fn push_request(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub(crate) fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }
}

fn clamp_u16(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}
