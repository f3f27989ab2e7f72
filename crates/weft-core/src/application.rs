//! The toplevel orchestrator.
//!
//! An [`Application`] owns the view tree, the console driver and the main
//! loop, and keeps a LIFO stack of running toplevels. [`begin`],
//! [`run_loop`] and [`end`] drive one toplevel through its lifecycle;
//! [`run`] wraps all three with an error handler. Stack arbitration lives in
//! [`stack`](crate::stack), input routing in [`routing`](crate::routing).
//!
//! [`begin`]: Application::begin
//! [`run_loop`]: Application::run_loop
//! [`end`]: Application::end
//! [`run`]: Application::run

use crate::driver::crossterm::{CrosstermDriver, CrosstermMainLoop, OutputTarget, TerminalOptions};
use crate::driver::ConsoleDriver;
use crate::error::{Error, Result};
use crate::event::AppEvent;
use crate::key::{Command, KeyCombination};
use crate::scheduler::{IdleId, MainLoop, MainLoopDriver, TimeoutId};
use crate::scheme::ColorScheme;
use crate::sync::SyncContext;
use crate::tree::{ViewId, ViewTree};
use crate::widget::Request;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Position, Rect};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Configuration options for an [`Application`].
///
/// Use struct update syntax to override only the fields you care about:
///
/// ```rust,ignore
/// let options = ApplicationOptions {
///     mouse: false,
///     log_file: Some("weft.log".into()),
///     ..ApplicationOptions::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ApplicationOptions {
    /// Start in alternate screen (default: true).
    pub alt_screen: bool,
    /// Capture mouse events (default: true).
    pub mouse: bool,
    /// Whether to catch panics and restore terminal (default: true).
    pub catch_panics: bool,
    /// Output target: stdout (default) or stderr.
    pub output: OutputTarget,
    /// Log file path for debugging TUI apps.
    pub log_file: Option<PathBuf>,
    /// Key bound to [`Command::QuitToplevel`] on every toplevel (default: Ctrl+Q).
    pub quit_key: KeyCombination,
    /// Return from [`Application::run_loop`] after a single iteration.
    pub end_after_first_iteration: bool,
    /// Scheme for views that neither set one nor inherit one.
    pub color_scheme: ColorScheme,
}

impl Default for ApplicationOptions {
    fn default() -> Self {
        Self {
            alt_screen: true,
            mouse: true,
            catch_panics: true,
            output: OutputTarget::default(),
            log_file: None,
            quit_key: KeyCombination::ctrl(KeyCode::Char('q')),
            end_after_first_iteration: false,
            color_scheme: ColorScheme::default(),
        }
    }
}

impl ApplicationOptions {
    fn terminal(&self) -> TerminalOptions {
        TerminalOptions {
            alt_screen: self.alt_screen,
            mouse: self.mouse,
            catch_panics: self.catch_panics,
            output: self.output,
        }
    }
}

/// Binds one toplevel to one [`begin`](Application::begin) /
/// [`end`](Application::end) cycle.
///
/// Dropping a bound `RunState` without ending it leaves the toplevel on the
/// stack; this is logged as a warning.
#[derive(Debug)]
pub struct RunState {
    toplevel: Option<ViewId>,
}

impl RunState {
    pub fn toplevel(&self) -> Option<ViewId> {
        self.toplevel
    }
}

impl Drop for RunState {
    fn drop(&mut self) {
        if let Some(toplevel) = self.toplevel {
            tracing::warn!(?toplevel, "run state dropped without end");
        }
    }
}

type Listener = Box<dyn FnMut(&mut AppEvent)>;
type RootKeyHandler = Box<dyn FnMut(&KeyEvent) -> bool>;

/// The runtime: view tree, console driver, main loop and toplevel stack.
pub struct Application {
    pub(crate) tree: ViewTree,
    pub(crate) driver: Box<dyn ConsoleDriver>,
    pub(crate) main_loop: MainLoop<Application>,
    /// Running toplevels, most recently begun first.
    pub(crate) stack: VecDeque<ViewId>,
    pub(crate) top: Option<ViewId>,
    pub(crate) current: Option<ViewId>,
    pub(crate) grab: Option<ViewId>,
    pub(crate) grab_inside: bool,
    pub(crate) mouse_over: Option<ViewId>,
    pub(crate) root_key_handler: Option<RootKeyHandler>,
    listeners: Vec<Listener>,
    pub(crate) options: ApplicationOptions,
    pending_error: Option<Error>,
    initialized: bool,
    ui_thread: ThreadId,
    last_cursor: Option<Position>,
}

impl Application {
    /// An application on the real terminal. The terminal is taken over by
    /// [`init`](Application::init) or the first [`begin`](Application::begin).
    pub fn new(options: ApplicationOptions) -> Result<Self> {
        let driver = CrosstermDriver::new(options.terminal());
        Self::with_drivers(
            Box::new(driver),
            Box::new(CrosstermMainLoop::new()),
            options,
        )
    }

    /// An application on caller-supplied drivers.
    pub fn with_drivers(
        driver: Box<dyn ConsoleDriver>,
        main_loop: Box<dyn MainLoopDriver>,
        options: ApplicationOptions,
    ) -> Result<Self> {
        let main_loop = MainLoop::new(main_loop)?;
        let mut tree = ViewTree::new();
        tree.set_base_scheme(options.color_scheme);
        Ok(Self {
            tree,
            driver,
            main_loop,
            stack: VecDeque::new(),
            top: None,
            current: None,
            grab: None,
            grab_inside: false,
            mouse_over: None,
            root_key_handler: None,
            listeners: Vec::new(),
            options,
            pending_error: None,
            initialized: false,
            ui_thread: thread::current().id(),
            last_cursor: None,
        })
    }

    /// Take over the terminal. Called implicitly by the first
    /// [`begin`](Application::begin).
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if let Some(path) = self.options.log_file.clone() {
            crate::logging::log_to_file(path)?;
        }
        self.driver.init()?;
        self.initialized = true;
        self.ui_thread = thread::current().id();
        tracing::info!(
            cols = self.driver.cols(),
            rows = self.driver.rows(),
            "application initialized"
        );
        Ok(())
    }

    /// Give the terminal back and close the main loop. Toplevels still on
    /// the stack are abandoned; pending [`SyncContext`] calls fail with
    /// [`Error::LoopClosed`].
    pub fn shutdown(&mut self) -> Result<()> {
        while let Some(toplevel) = self.stack.pop_front() {
            self.set_running(toplevel, false);
        }
        self.current = None;
        self.top = None;
        self.grab = None;
        self.mouse_over = None;
        self.main_loop.tear_down();
        if self.initialized {
            self.initialized = false;
            self.driver.end()?;
        }
        tracing::info!("application shut down");
        Ok(())
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ViewTree {
        &mut self.tree
    }

    pub fn driver(&self) -> &dyn ConsoleDriver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn ConsoleDriver {
        self.driver.as_mut()
    }

    /// The console driver as its concrete type.
    pub fn driver_as<T: ConsoleDriver>(&self) -> Option<&T> {
        let driver: &dyn std::any::Any = self.driver.as_ref();
        driver.downcast_ref::<T>()
    }

    pub fn main_loop(&self) -> &MainLoop<Application> {
        &self.main_loop
    }

    /// A handle other threads use to run code on this application's thread.
    pub fn sync_context(&self) -> SyncContext {
        SyncContext::new(self.main_loop.handle().clone(), self.ui_thread)
    }

    pub fn add_timeout(
        &self,
        period: Duration,
        callback: impl FnMut(&mut Application) -> bool + Send + 'static,
    ) -> TimeoutId {
        self.main_loop.add_timeout(period, callback)
    }

    pub fn remove_timeout(&self, id: TimeoutId) -> bool {
        self.main_loop.remove_timeout(id)
    }

    pub fn add_idle(&self, callback: impl FnMut(&mut Application) -> bool + Send + 'static) -> IdleId {
        self.main_loop.add_idle(callback)
    }

    pub fn remove_idle(&self, id: IdleId) -> bool {
        self.main_loop.remove_idle(id)
    }

    pub fn options(&self) -> &ApplicationOptions {
        &self.options
    }

    /// The root toplevel.
    pub fn top(&self) -> Option<ViewId> {
        self.top
    }

    /// The toplevel receiving input.
    pub fn current(&self) -> Option<ViewId> {
        self.current
    }

    /// Stacked toplevels, most recently begun first.
    pub fn toplevels(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.stack.iter().copied()
    }

    /// The whole screen as reported by the driver.
    pub fn screen(&self) -> Rect {
        Rect::new(0, 0, self.driver.cols(), self.driver.rows())
    }

    /// Observe every [`AppEvent`]. Listeners run after the concerned view's
    /// widget and may cancel pre-events.
    pub fn add_listener(&mut self, listener: impl FnMut(&mut AppEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Install a hook that sees every key press before the dispatch passes;
    /// returning `true` consumes the key.
    pub fn set_root_key_handler(&mut self, handler: impl FnMut(&KeyEvent) -> bool + 'static) {
        self.root_key_handler = Some(Box::new(handler));
    }

    /// Record a failure to be returned by the next
    /// [`run_iteration`](Application::run_iteration). Only the first pending
    /// failure is kept.
    pub fn fail(&mut self, err: Error) {
        tracing::error!(%err, "application callback failed");
        if self.pending_error.is_none() {
            self.pending_error = Some(err);
        }
    }

    /// Push `toplevel` onto the stack and show it.
    ///
    /// The returned [`RunState`] must be handed back to
    /// [`end`](Application::end) once the toplevel has stopped.
    pub fn begin(&mut self, toplevel: ViewId) -> Result<RunState> {
        let view = self.tree.get(toplevel)?;
        if !view.is_toplevel() {
            tracing::error!(?toplevel, "begin on a view that is not a toplevel");
            return Err(Error::NotAToplevel(toplevel));
        }
        let is_container = view.is_overlapped_container();
        if is_container && self.overlapped_top().is_some_and(|c| c != toplevel) {
            tracing::error!(?toplevel, "a second overlapped container was begun");
            return Err(Error::SecondOverlappedContainer);
        }

        self.init()?;
        if !self.tree.node(toplevel).is_initialized() {
            self.tree.initialize(toplevel);
            self.bind_quit_key(toplevel);
        }
        self.push_toplevel(toplevel)?;
        self.set_running(toplevel, true);
        if self.top.is_none() || is_container {
            self.top = Some(toplevel);
        }

        let show = self.place_new_toplevel(toplevel);

        let screen = self.screen();
        self.tree.layout_root(toplevel, screen)?;
        if self.tree.node(toplevel).focused().is_none() {
            self.tree.focus_first(toplevel);
            // Placement already decided which toplevel is current.
            self.tree.pending_activation = None;
        }

        if show {
            if let Some(container) = self.overlapped_top().filter(|&c| c != toplevel) {
                self.emit(AppEvent::ChildLoaded {
                    container,
                    child: toplevel,
                });
            }
            self.emit(AppEvent::Loaded(toplevel));
            self.tree.set_needs_display_all(toplevel);
            self.redraw_toplevel(toplevel)?;
            self.flush(true)?;
        }
        self.emit(AppEvent::NewRunState(toplevel));
        self.apply_requests();

        tracing::debug!(?toplevel, depth = self.stack.len(), current = ?self.current, "toplevel begun");
        Ok(RunState {
            toplevel: Some(toplevel),
        })
    }

    fn push_toplevel(&mut self, toplevel: ViewId) -> Result<()> {
        let id = self.tree.node(toplevel).id().to_owned();
        if self.stack.contains(&toplevel) {
            tracing::error!(?toplevel, id, "toplevel begun twice");
            return Err(Error::DuplicateToplevelId(id));
        }
        if id.is_empty() {
            let mut count = 1;
            let unique = loop {
                let candidate = (self.stack.len() + count).to_string();
                if !self.stack.iter().any(|&t| self.tree.node(t).id() == candidate) {
                    break candidate;
                }
                count += 1;
            };
            self.tree.node_mut(toplevel).set_id(unique);
        } else if self.stack.iter().any(|&t| self.tree.node(t).id() == id) {
            tracing::error!(?toplevel, id, "duplicate toplevel id");
            return Err(Error::DuplicateToplevelId(id));
        }
        self.stack.push_front(toplevel);
        Ok(())
    }

    fn bind_quit_key(&mut self, toplevel: ViewId) {
        let quit_key = self.options.quit_key;
        let bindings = self.tree.node_mut(toplevel).key_bindings_mut();
        if let Some(old) = bindings.key_for(&Command::QuitToplevel) {
            bindings.remove(&old);
        }
        bindings.add(quit_key, [Command::QuitToplevel]);
    }

    /// Decide whether a freshly pushed toplevel becomes current. Returns
    /// whether it should be drawn right away.
    fn place_new_toplevel(&mut self, toplevel: ViewId) -> bool {
        let container = self.overlapped_top();
        let new_modal = self.tree.node(toplevel).is_modal();
        let current_modal = self.current.map(|c| self.tree.node(c).is_modal());
        let current_running = self.current.is_some_and(|c| self.is_running(c));

        let takes_over = container.is_none()
            || container == Some(toplevel)
            || current_modal != Some(true)
            || new_modal;
        if takes_over {
            if self.tree.node(toplevel).is_visible() {
                self.set_current(Some(toplevel));
                self.set_current_as_top();
                return true;
            }
            return false;
        }

        let front_modal = self
            .stack
            .front()
            .is_some_and(|&t| self.tree.node(t).is_modal());
        if Some(toplevel) != container
            && ((current_modal == Some(true) && !front_modal) || !current_running)
        {
            self.move_current(toplevel);
        } else if let Some(current) = self.current {
            self.move_current(current);
        }
        false
    }

    /// Iterate until `state`'s toplevel stops running.
    pub fn run_loop(&mut self, state: &RunState) -> Result<()> {
        let Some(toplevel) = state.toplevel else {
            return Ok(());
        };
        let mut first = true;
        while self.is_running(toplevel) {
            if self.options.end_after_first_iteration && !first {
                break;
            }
            first = false;
            self.run_iteration(state, true)?;
        }
        Ok(())
    }

    /// One scheduler tick for `state`'s toplevel: pump the main loop, let a
    /// modal preempt the current toplevel, then redraw whatever is dirty.
    ///
    /// With `wait`, blocks until input, a due timer or a wakeup arrives.
    /// Returns the first failure reported by a callback since the previous
    /// iteration.
    pub fn run_iteration(&mut self, state: &RunState, wait: bool) -> Result<()> {
        let Some(toplevel) = state.toplevel else {
            return Ok(());
        };
        if !self.tree.contains(toplevel) {
            return Err(Error::UnknownView(toplevel));
        }
        if let Some(top) = self.tree.node_mut(toplevel).toplevel.as_mut() {
            if !top.ready_sent {
                top.ready_sent = true;
                self.emit(AppEvent::Ready(toplevel));
            }
        }

        if self.pump(wait) {
            self.ensure_modal_or_visible_always_on_top(toplevel);
            self.apply_requests();
        }
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        self.redraw_stack(toplevel)
    }

    /// Fire due timers, dispatch collected input and run idle handlers once.
    /// Returns whether anything was pending.
    pub fn pump(&mut self, wait: bool) -> bool {
        let main_loop = self.main_loop.clone();
        if !main_loop.events_pending(wait) {
            return false;
        }
        main_loop.run_iteration(self, |app, event| app.process_input(event));
        self.apply_requests();
        self.emit(AppEvent::Iteration);
        true
    }

    /// Pop `state`'s toplevel, which must be the top of the stack, and
    /// dispose it. The next toplevel becomes current and the screen is
    /// repainted.
    pub fn end(&mut self, mut state: RunState) -> Result<()> {
        let bound = state.toplevel.take();
        let front = self.stack.front().copied();
        let Some(toplevel) = bound.filter(|&t| Some(t) == front) else {
            tracing::error!(expected = ?front, actual = ?bound, "unbalanced end");
            return Err(Error::UnbalancedEnd {
                expected: front,
                actual: bound,
            });
        };

        let container = self.overlapped_top().filter(|&c| c != toplevel);
        match container {
            Some(container) => self.emit(AppEvent::ChildUnloaded {
                container,
                child: toplevel,
            }),
            None => self.emit(AppEvent::Unloaded(toplevel)),
        };
        self.pop_toplevel(toplevel);
        match container {
            Some(container) => self.emit(AppEvent::ChildClosed {
                container,
                child: toplevel,
            }),
            None => self.emit(AppEvent::Closed(toplevel)),
        };

        if let Some(next) = self.current {
            if self.stack.len() == 1 && Some(next) == self.overlapped_top() {
                self.emit(AppEvent::AllChildClosed(next));
            }
            self.tree.ensure_focus(next);
            self.tree.pending_activation = None;
        }
        self.tree.dispose(toplevel)?;
        self.apply_requests();
        tracing::debug!(?toplevel, depth = self.stack.len(), current = ?self.current, "toplevel ended");
        if self.stack.is_empty() {
            return Ok(());
        }
        self.refresh()
    }

    /// Remove `toplevel` from the stack without disposing it and make the new
    /// stack top current.
    fn pop_toplevel(&mut self, toplevel: ViewId) {
        self.stack.retain(|&t| t != toplevel);
        self.set_running(toplevel, false);
        if let Some(top) = self.tree.node_mut(toplevel).toplevel.as_mut() {
            top.ready_sent = false;
        }
        if self
            .grab
            .is_some_and(|g| g == toplevel || self.tree.is_descendant(g, toplevel))
        {
            self.grab = None;
        }
        if self
            .mouse_over
            .is_some_and(|v| v == toplevel || self.tree.is_descendant(v, toplevel))
        {
            self.mouse_over = None;
        }
        if self.top == Some(toplevel) {
            self.top = self.stack.back().copied();
        }
        let next = self.stack.front().copied();
        self.set_current(next);
        if next.is_some() {
            self.set_current_as_top();
        }
    }

    /// [`begin`](Application::begin), [`run_loop`](Application::run_loop)
    /// and [`end`](Application::end) in one call.
    pub fn run(&mut self, toplevel: ViewId) -> Result<()> {
        self.run_with(toplevel, |_| false)
    }

    /// Like [`run`](Application::run), but a failure raised while the loop
    /// runs is handed to `on_error`: `true` resumes by beginning the
    /// toplevel again, `false` returns the error.
    pub fn run_with(&mut self, toplevel: ViewId, mut on_error: impl FnMut(&Error) -> bool) -> Result<()> {
        loop {
            let mut state = self.begin(toplevel)?;
            match self.run_loop(&state) {
                Ok(()) => return self.end(state),
                Err(err) => {
                    if state.toplevel.take().is_some() && self.stack.front() == Some(&toplevel) {
                        self.pop_toplevel(toplevel);
                    }
                    if !on_error(&err) {
                        return Err(err);
                    }
                    tracing::info!(%err, ?toplevel, "resuming after error");
                }
            }
        }
    }

    /// Offer `event` to the widget of the view it concerns, then to every
    /// listener. Returns the event so callers can check cancellation.
    pub(crate) fn emit(&mut self, mut event: AppEvent) -> AppEvent {
        tracing::trace!(?event, "app event");
        if let Some(target) = event.target() {
            self.tree
                .with_widget(target, |w, cx| w.on_event(cx, &mut event));
        }
        for listener in &mut self.listeners {
            listener(&mut event);
        }
        event
    }

    /// Apply everything widgets asked for during the last dispatch.
    pub(crate) fn apply_requests(&mut self) {
        loop {
            let activation = self.tree.pending_activation.take();
            let requests = self.tree.take_requests();
            if activation.is_none() && requests.is_empty() {
                break;
            }
            if let Some(toplevel) = activation {
                self.activate_from_focus(toplevel);
            }
            for request in requests {
                match request {
                    Request::Stop(toplevel) => self.request_stop(toplevel),
                    Request::GrabMouse(view) => {
                        self.grab_mouse(view);
                    }
                    Request::UngrabMouse => {
                        self.ungrab_mouse();
                    }
                    Request::Refresh => {
                        if let Err(err) = self.refresh() {
                            self.fail(err);
                        }
                    }
                    Request::Suspend => {
                        if let Err(err) = self.suspend() {
                            self.fail(err);
                        }
                    }
                    Request::Fail(err) => self.fail(err),
                    Request::Invoke(f) => f(self),
                }
            }
        }
    }

    pub(crate) fn is_running(&self, toplevel: ViewId) -> bool {
        self.tree.view(toplevel).is_some_and(|v| v.is_running())
    }

    pub(crate) fn set_running(&mut self, toplevel: ViewId, running: bool) {
        if let Some(top) = self
            .tree
            .view_mut(toplevel)
            .and_then(|v| v.toplevel.as_mut())
        {
            top.running = running;
        }
    }

    fn redraw_toplevel(&mut self, toplevel: ViewId) -> Result<()> {
        if self.tree.node(toplevel).layout_needed() {
            let screen = self.screen();
            self.tree.layout_root(toplevel, screen)?;
        }
        let bounds = self.tree.node(toplevel).bounds();
        self.tree.redraw(self.driver.as_mut(), toplevel, bounds)
    }

    /// Redraw after an iteration. When anything beneath the active toplevel
    /// is dirty the whole stack is repainted bottom-up, so an overlay never
    /// sits on stale content.
    fn redraw_stack(&mut self, bound: ViewId) -> Result<()> {
        let active = self.current.unwrap_or(bound);
        if !self.tree.contains(active) {
            return Ok(());
        }
        let mut drawn = false;

        let beneath: Vec<ViewId> = self
            .stack
            .iter()
            .rev()
            .copied()
            .filter(|&t| t != active)
            .collect();
        if beneath.iter().any(|&t| self.tree.is_dirty(t)) {
            for toplevel in beneath {
                self.tree.set_needs_display_all(toplevel);
                self.redraw_toplevel(toplevel)?;
            }
            self.tree.set_needs_display_all(active);
        }

        if self.tree.is_dirty(active) {
            let size = self.tree.node(active).frame();
            let screen = self.screen();
            if self.stack.len() == 1
                && self.top == Some(active)
                && (size.width, size.height) != (screen.width, screen.height)
            {
                self.driver.clear_contents();
                self.tree.set_needs_display_all(active);
            }
            self.redraw_toplevel(active)?;
            drawn = true;
        }
        self.flush(drawn)
    }

    /// Clear the screen and repaint every stacked toplevel bottom-up.
    pub fn refresh(&mut self) -> Result<()> {
        self.driver.clear_contents();
        let toplevels: Vec<ViewId> = self.stack.iter().rev().copied().collect();
        for toplevel in toplevels {
            self.tree.set_needs_display_all(toplevel);
            self.redraw_toplevel(toplevel)?;
        }
        self.flush(true)
    }

    /// Adopt a new terminal size: lay every toplevel out again and repaint.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        tracing::debug!(cols, rows, "terminal resized");
        self.driver.resize(cols, rows);
        let screen = self.screen();
        let toplevels: Vec<ViewId> = self.stack.iter().copied().collect();
        for toplevel in toplevels {
            self.tree.set_needs_layout(toplevel);
            self.tree.layout_root(toplevel, screen)?;
        }
        self.emit(AppEvent::Resized { cols, rows });
        self.refresh()
    }

    /// Hand the terminal to the shell (job control), then repaint.
    pub fn suspend(&mut self) -> Result<()> {
        tracing::debug!("suspending");
        self.driver.suspend()?;
        self.refresh()
    }

    /// Where the cursor belongs: the focus leaf of the current toplevel,
    /// if its widget asks for one and it is not clipped away.
    pub fn cursor_position(&self) -> Option<Position> {
        let active = self.current?;
        let leaf = self.tree.most_focused(active)?;
        let view = self.tree.view(leaf)?;
        if !view.has_focus() {
            return None;
        }
        let local = view.widget.as_ref()?.cursor_position()?;
        let point = self
            .tree
            .view_to_screen(leaf, i32::from(local.x), i32::from(local.y));
        let position = Position::new(u16::try_from(point.x).ok()?, u16::try_from(point.y).ok()?);
        self.tree
            .clip_rect(leaf)
            .contains(position)
            .then_some(position)
    }

    /// Flush to the terminal when something was drawn or the cursor moved.
    fn flush(&mut self, drawn: bool) -> Result<()> {
        let cursor = self.cursor_position();
        if drawn || cursor != self.last_cursor {
            self.driver.set_cursor(cursor);
            self.driver.refresh()?;
            self.last_cursor = cursor;
        }
        Ok(())
    }
}
