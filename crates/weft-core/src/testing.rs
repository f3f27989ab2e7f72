//! Headless drivers for exercising the runtime without a terminal.
//!
//! [`test_application`] wires an [`Application`] to a [`FakeDriver`] of a
//! fixed size and a [`FakeMainLoop`] fed by a [`FakeInput`], so a plain
//! `#[test]` can script keystrokes, mouse events and resizes and then inspect
//! the drawn cells with [`buffer_to_string`].
//!
//! ```rust,ignore
//! use weft_core::testing::{buffer_to_string, test_application};
//!
//! let (mut app, input) = test_application(20, 4);
//! let top = app.tree_mut().insert(View::toplevel());
//! let state = app.begin(top)?;
//! input.push_key(KeyCode::Char('x'));
//! app.run_iteration(&state, false)?;
//! assert!(buffer_to_string(app.driver().contents()).contains("..."));
//! ```

use crate::application::{Application, ApplicationOptions};
use crate::driver::{ConsoleDriver, Surface};
use crate::event::{InputEvent, MouseEvent};
use crate::scheduler::{MainLoopDriver, Wakeup};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect};
use ratatui::style::Style;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A [`ConsoleDriver`] that only draws into memory.
#[derive(Debug, Clone)]
pub struct FakeDriver {
    surface: Surface,
    cursor: Option<Position>,
    initialized: bool,
    mouse_cooked: bool,
    refreshes: usize,
    suspends: usize,
}

impl FakeDriver {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            surface: Surface::new(cols, rows),
            cursor: None,
            initialized: false,
            mouse_cooked: false,
            refreshes: 0,
            suspends: 0,
        }
    }

    /// The cursor position set for the last refresh.
    pub fn cursor(&self) -> Option<Position> {
        self.cursor
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_mouse_cooked(&self) -> bool {
        self.mouse_cooked
    }

    /// How many times the screen was flushed.
    pub fn refresh_count(&self) -> usize {
        self.refreshes
    }

    pub fn suspend_count(&self) -> usize {
        self.suspends
    }
}

impl ConsoleDriver for FakeDriver {
    fn cols(&self) -> u16 {
        self.surface.area().width
    }

    fn rows(&self) -> u16 {
        self.surface.area().height
    }

    fn init(&mut self) -> crate::Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn end(&mut self) -> crate::Result<()> {
        self.initialized = false;
        Ok(())
    }

    fn move_to(&mut self, col: i32, row: i32) {
        self.surface.move_to(col, row);
    }

    fn add_rune(&mut self, ch: char) {
        self.surface.add_rune(ch);
    }

    fn set_attribute(&mut self, style: Style) {
        self.surface.set_attribute(style);
    }

    fn clip(&self) -> Rect {
        self.surface.clip()
    }

    fn set_clip(&mut self, clip: Rect) {
        self.surface.set_clip(clip);
    }

    fn refresh(&mut self) -> crate::Result<()> {
        self.refreshes += 1;
        Ok(())
    }

    fn clear_contents(&mut self) {
        self.surface.clear();
    }

    fn contents(&self) -> &Buffer {
        self.surface.buffer()
    }

    fn set_cursor(&mut self, position: Option<Position>) {
        self.cursor = position;
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.surface.resize(cols, rows);
    }

    fn cook_mouse(&mut self) {
        self.mouse_cooked = true;
    }

    fn uncook_mouse(&mut self) {
        self.mouse_cooked = false;
    }

    fn suspend(&mut self) -> crate::Result<()> {
        self.suspends += 1;
        Ok(())
    }
}

/// Longest a [`FakeMainLoop`] blocks, even when asked to wait indefinitely,
/// so a test that forgets to feed input fails instead of hanging.
const MAX_WAIT: Duration = Duration::from_millis(250);

#[derive(Default)]
struct InputState {
    queue: VecDeque<InputEvent>,
    woken: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<InputState>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct FakeWaker(Arc<Shared>);

impl Wakeup for FakeWaker {
    fn wake(&self) {
        self.0.lock().woken = true;
        self.0.ready.notify_all();
    }
}

/// A [`MainLoopDriver`] whose input is scripted through a [`FakeInput`].
pub struct FakeMainLoop {
    shared: Arc<Shared>,
    torn_down: bool,
}

impl FakeMainLoop {
    /// A driver and the handle feeding it.
    pub fn new() -> (Self, FakeInput) {
        let shared = Arc::new(Shared::default());
        let input = FakeInput {
            shared: Arc::clone(&shared),
        };
        (
            Self {
                shared,
                torn_down: false,
            },
            input,
        )
    }
}

impl MainLoopDriver for FakeMainLoop {
    fn setup(&mut self) -> crate::Result<Arc<dyn Wakeup>> {
        Ok(Arc::new(FakeWaker(Arc::clone(&self.shared))))
    }

    fn events_pending(&mut self, timeout: Option<Duration>) -> bool {
        if self.torn_down {
            return false;
        }
        let mut state = self.shared.lock();
        let wait = timeout.map_or(MAX_WAIT, |t| t.min(MAX_WAIT));
        if state.queue.is_empty() && !state.woken && !wait.is_zero() {
            state = self
                .shared
                .ready
                .wait_timeout_while(state, wait, |s| s.queue.is_empty() && !s.woken)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.woken = false;
        !state.queue.is_empty()
    }

    fn iteration(&mut self) -> Vec<InputEvent> {
        self.shared.lock().queue.drain(..).collect()
    }

    fn tear_down(&mut self) {
        self.torn_down = true;
        self.shared.lock().queue.clear();
    }
}

/// Feeds input to a [`FakeMainLoop`]; cloneable and usable from any thread.
#[derive(Clone)]
pub struct FakeInput {
    shared: Arc<Shared>,
}

impl FakeInput {
    pub fn push(&self, event: InputEvent) {
        self.shared.lock().queue.push_back(event);
        self.shared.ready.notify_all();
    }

    /// Queue a key press without modifiers.
    pub fn push_key(&self, code: KeyCode) {
        self.push_key_with(code, KeyModifiers::NONE);
    }

    pub fn push_key_with(&self, code: KeyCode, modifiers: KeyModifiers) {
        self.push(InputEvent::Key(KeyEvent::new(code, modifiers)));
    }

    /// Queue a key release.
    pub fn push_key_up(&self, code: KeyCode) {
        self.push(InputEvent::Key(KeyEvent::new_with_kind(
            code,
            KeyModifiers::NONE,
            KeyEventKind::Release,
        )));
    }

    /// Queue a mouse event at screen position (`x`, `y`).
    pub fn push_mouse(&self, kind: MouseEventKind, x: i32, y: i32) {
        self.push(InputEvent::Mouse(MouseEvent::new(kind, x, y)));
    }

    pub fn push_resize(&self, cols: u16, rows: u16) {
        self.push(InputEvent::Resize(cols, rows));
    }

    /// Number of events not yet collected.
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }
}

/// An [`Application`] on a `cols` x `rows` [`FakeDriver`] and a scripted
/// input queue.
pub fn test_application(cols: u16, rows: u16) -> (Application, FakeInput) {
    let (main_loop, input) = FakeMainLoop::new();
    let options = ApplicationOptions {
        alt_screen: false,
        mouse: false,
        catch_panics: false,
        ..ApplicationOptions::default()
    };
    let app = Application::with_drivers(
        Box::new(FakeDriver::new(cols, rows)),
        Box::new(main_loop),
        options,
    )
    .expect("fake main loop setup cannot fail");
    (app, input)
}

/// The buffer's symbols, one line per row, each terminated by `\n`.
pub fn buffer_to_string(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut output = String::with_capacity(usize::from(area.width + 1) * usize::from(area.height));
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            output.push_str(buffer[(x, y)].symbol());
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn fake_driver_draws_in_memory() {
        let mut driver = FakeDriver::new(5, 2);
        driver.move_to(1, 1);
        driver.add_str("hey");
        driver.refresh().unwrap();
        assert_eq!(buffer_to_string(driver.contents()), "     \n hey \n");
        assert_eq!(driver.refresh_count(), 1);
    }

    #[test]
    fn pushed_input_is_collected_once() {
        let (mut driver, input) = FakeMainLoop::new();
        input.push_key(KeyCode::Enter);
        input.push_resize(10, 2);
        assert!(driver.events_pending(Some(Duration::ZERO)));
        assert_eq!(driver.iteration().len(), 2);
        assert!(!driver.events_pending(Some(Duration::ZERO)));
    }

    #[test]
    fn wakeup_cuts_a_wait_short() {
        let (mut driver, _input) = FakeMainLoop::new();
        let waker = driver.setup().unwrap();
        let started = Instant::now();
        waker.wake();
        assert!(!driver.events_pending(None));
        assert!(started.elapsed() < MAX_WAIT);
    }

    #[test]
    fn input_from_another_thread_wakes_the_wait() {
        let (mut driver, input) = FakeMainLoop::new();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            input.push_key(KeyCode::Esc);
        });
        let started = Instant::now();
        let mut pending = false;
        while !pending && started.elapsed() < Duration::from_secs(2) {
            pending = driver.events_pending(None);
        }
        worker.join().unwrap();
        assert!(pending);
    }
}
