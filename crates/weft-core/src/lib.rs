//! Core runtime for the **weft** terminal UI framework.
//!
//! `weft-core` runs stacked, possibly modal or overlapping windows on a
//! character terminal. Applications build a tree of views, hand its root
//! (a *toplevel*) to an [`Application`], and the runtime takes care of
//! scheduling, layout, redraw, focus and input routing.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Application`] | Owns the tree, the driver and the main loop; runs the toplevel stack |
//! | [`ViewTree`] / [`View`] | Arena of views with frames, Pos/Dim layout, focus and dirty regions |
//! | [`Widget`] | Behaviour attached to a view: drawing, keys, mouse, lifecycle events |
//! | [`MainLoop`] | Cooperative scheduler: timeouts, idle handlers and the input wait |
//! | [`SyncContext`] | Posts work onto the UI thread from any other thread |
//! | [`ConsoleDriver`] | Cell-grid output back-end; [`CrosstermDriver`] drives a real terminal |
//! | [`KeyBindings`] | Per-view map from key combinations to [`Command`]s |
//! | [`test_application`](testing::test_application) | Headless application for unit tests |
//!
//! # Lifecycle
//!
//! 1. **begin** -- [`Application::begin`] pushes a toplevel, lays it out,
//!    focuses its first tab stop and draws it.
//! 2. **iterate** -- [`Application::run_loop`] waits for input, fires due
//!    timeouts, routes input through the stack, runs idle handlers and
//!    redraws whatever became dirty.
//! 3. **stop** -- [`Application::request_stop`] (or a quit key) clears the
//!    toplevel's running flag unless a [`AppEvent::Closing`] handler cancels.
//! 4. **end** -- [`Application::end`] pops the toplevel, activates the next
//!    one and repaints.
//!
//! [`Application::run`] wraps all four steps.
//!
//! # Quick example
//!
//! ```ignore
//! use weft_core::{Application, ApplicationOptions, Canvas, View, Widget};
//!
//! struct Hello;
//!
//! impl Widget for Hello {
//!     fn draw(&mut self, canvas: &mut Canvas<'_>) {
//!         canvas.clear();
//!         let style = canvas.normal_attribute();
//!         canvas.print(1, 1, "Hello, weft! (Ctrl+Q quits)", style);
//!     }
//! }
//!
//! fn main() -> weft_core::Result<()> {
//!     let mut app = Application::new(ApplicationOptions::default())?;
//!     let top = app.tree_mut().insert(View::toplevel().with_handler(Hello));
//!     app.run(top)?;
//!     app.shutdown()
//! }
//! ```

pub mod application;
pub mod canvas;
pub mod driver;
pub mod error;
pub mod event;
pub mod focus;
pub mod input;
pub mod key;
pub mod layout;
pub mod logging;
pub mod routing;
pub mod scheduler;
pub mod scheme;
pub mod stack;
pub mod sync;
pub mod testing;
pub mod tree;
pub mod widget;

pub use application::{Application, ApplicationOptions, RunState};
pub use canvas::Canvas;
pub use driver::crossterm::{CrosstermDriver, CrosstermMainLoop, OutputTarget, TerminalOptions};
pub use driver::{ConsoleDriver, Surface};
pub use error::{Error, Result};
pub use event::{AppEvent, InputEvent, MouseEvent, Point};
pub use key::{Command, KeyBinding, KeyBindingScope, KeyBindings, KeyCombination};
pub use layout::{Dim, LayoutStyle, Pos};
pub use logging::log_to_file;
pub use scheduler::{IdleId, LoopHandle, MainLoop, MainLoopDriver, TimeoutId, Wakeup};
pub use scheme::ColorScheme;
pub use sync::SyncContext;
pub use tree::{FocusDirection, View, ViewId, ViewTree};
pub use widget::{Cx, Deferred, Request, Widget};
