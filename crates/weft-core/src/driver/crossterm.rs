//! Crossterm-backed drivers.
//!
//! [`CrosstermDriver`] keeps a ratatui back buffer that views draw into and
//! flushes it through [`ratatui::Terminal`], which diffs against the previous
//! frame. [`CrosstermMainLoop`] waits on crossterm's async [`EventStream`] from
//! a private current-thread tokio runtime, so the cooperative loop stays on the
//! calling thread while other threads can still interrupt its wait.

use super::{ConsoleDriver, Surface};
use crate::event::InputEvent;
use crate::scheduler::{MainLoopDriver, Wakeup};
use crate::Error;
use crossterm::{
    cursor,
    event::{
        DisableBracketedPaste, DisableFocusChange, DisableMouseCapture, EnableBracketedPaste,
        EnableFocusChange, EnableMouseCapture, EventStream,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::{FutureExt, StreamExt};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect};
use ratatui::style::Style;
use ratatui::Terminal;
use std::io::{self, stderr, stdout, Stderr, Stdout, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Output target for the terminal UI.
///
/// By default the UI renders to **stdout**. When stdout is piped, switch to
/// [`Stderr`](OutputTarget::Stderr) so the UI still reaches the terminal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to stdout (default).
    #[default]
    Stdout,
    /// Write to stderr (useful when stdout is piped).
    Stderr,
}

/// Writer that wraps either stdout or stderr.
enum Output {
    Stdout(Stdout),
    Stderr(Stderr),
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(w) => w.write(buf),
            Output::Stderr(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(w) => w.flush(),
            Output::Stderr(w) => w.flush(),
        }
    }
}

impl Output {
    fn new(target: OutputTarget) -> Self {
        match target {
            OutputTarget::Stdout => Output::Stdout(stdout()),
            OutputTarget::Stderr => Output::Stderr(stderr()),
        }
    }
}

/// How [`CrosstermDriver`] sets the terminal up.
#[derive(Debug, Clone, Copy)]
pub struct TerminalOptions {
    pub alt_screen: bool,
    pub mouse: bool,
    pub catch_panics: bool,
    pub output: OutputTarget,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            alt_screen: true,
            mouse: true,
            catch_panics: true,
            output: OutputTarget::default(),
        }
    }
}

/// A [`ConsoleDriver`] that renders through ratatui's crossterm backend.
pub struct CrosstermDriver {
    options: TerminalOptions,
    terminal: Option<Terminal<CrosstermBackend<Output>>>,
    surface: Surface,
    cursor: Option<Position>,
    full_repaint: bool,
}

impl CrosstermDriver {
    pub fn new(options: TerminalOptions) -> Self {
        Self {
            options,
            terminal: None,
            surface: Surface::new(0, 0),
            cursor: None,
            full_repaint: true,
        }
    }

    fn with_writer(&mut self, f: impl FnOnce(&mut CrosstermBackend<Output>) -> io::Result<()>) {
        if let Some(terminal) = self.terminal.as_mut() {
            if let Err(err) = f(terminal.backend_mut()) {
                tracing::warn!(%err, "terminal mode switch failed");
            }
        }
    }
}

impl ConsoleDriver for CrosstermDriver {
    fn cols(&self) -> u16 {
        self.surface.area().width
    }

    fn rows(&self) -> u16 {
        self.surface.area().height
    }

    fn init(&mut self) -> crate::Result<()> {
        let terminal = init_terminal(&self.options).map_err(|source| {
            tracing::error!(%source, "console driver failed to initialize");
            Error::DriverInit { source }
        })?;
        let size = terminal.size().map_err(|source| Error::DriverInit { source })?;
        self.surface.resize(size.width, size.height);
        self.terminal = Some(terminal);
        self.full_repaint = true;
        tracing::debug!(cols = size.width, rows = size.height, "console driver initialized");
        Ok(())
    }

    fn end(&mut self) -> crate::Result<()> {
        if self.terminal.take().is_some() {
            restore_terminal(&self.options)?;
        }
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
        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };
        if self.full_repaint {
            terminal.clear()?;
            self.full_repaint = false;
        }
        if terminal.current_buffer_mut().area != self.surface.area() {
            terminal.resize(self.surface.area())?;
        }
        terminal.current_buffer_mut().merge(self.surface.buffer());
        terminal.flush()?;
        terminal.swap_buffers();
        match self.cursor {
            Some(position) => {
                terminal.set_cursor_position(position)?;
                terminal.show_cursor()?;
            }
            None => terminal.hide_cursor()?,
        }
        Backend::flush(terminal.backend_mut())?;
        Ok(())
    }

    fn clear_contents(&mut self) {
        self.surface.clear();
        self.full_repaint = true;
    }

    fn contents(&self) -> &Buffer {
        self.surface.buffer()
    }

    fn set_cursor(&mut self, position: Option<Position>) {
        self.cursor = position;
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.surface.resize(cols, rows);
        self.full_repaint = true;
    }

    fn cook_mouse(&mut self) {
        self.with_writer(|w| execute!(w, DisableMouseCapture));
    }

    fn uncook_mouse(&mut self) {
        self.with_writer(|w| execute!(w, EnableMouseCapture));
    }

    fn suspend(&mut self) -> crate::Result<()> {
        restore_terminal(&self.options)?;

        #[cfg(unix)]
        {
            unsafe {
                libc::raise(libc::SIGTSTP);
            }
        }

        self.terminal = None;
        self.init()
    }
}

impl Drop for CrosstermDriver {
    fn drop(&mut self) {
        if self.terminal.is_some() {
            let _ = restore_terminal(&self.options);
        }
    }
}

fn init_terminal(options: &TerminalOptions) -> io::Result<Terminal<CrosstermBackend<Output>>> {
    // Install panic hook that restores terminal (only once to avoid stacking)
    if options.catch_panics {
        use std::sync::Once;
        static HOOK_INSTALLED: Once = Once::new();
        let options = *options;
        HOOK_INSTALLED.call_once(|| {
            let original_hook = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                let _ = restore_terminal(&options);
                original_hook(info);
            }));
        });
    }

    enable_raw_mode()?;
    let mut writer = Output::new(options.output);

    if options.alt_screen {
        execute!(writer, EnterAlternateScreen)?;
    }
    execute!(writer, EnableBracketedPaste, EnableFocusChange)?;
    if options.mouse {
        execute!(writer, EnableMouseCapture)?;
    }
    execute!(writer, cursor::Hide)?;

    Terminal::new(CrosstermBackend::new(writer))
}

fn restore_terminal(options: &TerminalOptions) -> io::Result<()> {
    // Best-effort cleanup: keep going so as much terminal state as possible
    // is restored, then report the raw mode failure.
    let raw = disable_raw_mode();
    let mut writer = Output::new(options.output);
    execute!(writer, DisableBracketedPaste).ok();
    execute!(writer, DisableMouseCapture).ok();
    execute!(writer, DisableFocusChange).ok();
    execute!(writer, cursor::Show).ok();
    if options.alt_screen {
        execute!(writer, LeaveAlternateScreen).ok();
    }
    raw
}

struct NotifyWaker(Arc<Notify>);

impl Wakeup for NotifyWaker {
    fn wake(&self) {
        // notify_one stores a permit, so a wake issued before the wait is not lost.
        self.0.notify_one();
    }
}

/// A [`MainLoopDriver`] reading crossterm's [`EventStream`].
pub struct CrosstermMainLoop {
    runtime: Option<tokio::runtime::Runtime>,
    events: Option<EventStream>,
    notify: Arc<Notify>,
    pending: Vec<InputEvent>,
}

impl CrosstermMainLoop {
    pub fn new() -> Self {
        Self {
            runtime: None,
            events: None,
            notify: Arc::new(Notify::new()),
            pending: Vec::new(),
        }
    }
}

impl Default for CrosstermMainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl MainLoopDriver for CrosstermMainLoop {
    fn setup(&mut self) -> crate::Result<Arc<dyn Wakeup>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| Error::DriverInit { source })?;
        self.runtime = Some(runtime);
        self.events = Some(EventStream::new());
        Ok(Arc::new(NotifyWaker(Arc::clone(&self.notify))))
    }

    fn events_pending(&mut self, timeout: Option<Duration>) -> bool {
        if !self.pending.is_empty() {
            return true;
        }
        let (Some(runtime), Some(events)) = (self.runtime.as_ref(), self.events.as_mut()) else {
            return false;
        };
        let notify = Arc::clone(&self.notify);
        let pending = &mut self.pending;

        runtime.block_on(async {
            let deadline = async {
                match timeout {
                    Some(timeout) => tokio::time::sleep(timeout).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let first = tokio::select! {
                biased;
                event = events.next() => event,
                _ = notify.notified() => None,
                _ = deadline => None,
            };
            let mut next = first;
            while let Some(event) = next {
                match event {
                    Ok(event) => pending.push(InputEvent::from(event)),
                    Err(err) => {
                        tracing::warn!(%err, "failed to read terminal input");
                        break;
                    }
                }
                // Drain whatever is already buffered without blocking.
                next = events.next().now_or_never().flatten();
            }
        });

        !self.pending.is_empty()
    }

    fn iteration(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.pending)
    }

    fn tear_down(&mut self) {
        self.events = None;
        self.runtime = None;
        self.pending.clear();
    }
}
