//! **weft** -- a stacked-window terminal UI runtime for [`ratatui`] and
//! [`crossterm`].
//!
//! This is the umbrella crate that re-exports everything you need to build a
//! weft application from a single dependency:
//!
//! ```toml
//! [dependencies]
//! weft = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`weft_core`] are available at the crate root
//!   ([`Application`], [`View`], [`ViewTree`], [`Widget`], [`MainLoop`],
//!   [`SyncContext`], etc.).
//! * [`ratatui`], [`crossterm`], and [`tokio`] are re-exported so downstream
//!   crates do not need to depend on them directly.
//!
//! # Quick start
//!
//! ```ignore
//! use weft::{Application, ApplicationOptions, Canvas, View, Widget};
//!
//! struct Hello;
//!
//! impl Widget for Hello {
//!     fn draw(&mut self, canvas: &mut Canvas<'_>) {
//!         canvas.clear();
//!         let style = canvas.normal_attribute();
//!         canvas.print(1, 1, "Hello, weft!", style);
//!     }
//! }
//!
//! fn main() -> weft::Result<()> {
//!     let mut app = Application::new(ApplicationOptions::default())?;
//!     let top = app.tree_mut().insert(View::toplevel().with_handler(Hello));
//!     app.run(top)?;
//!     app.shutdown()
//! }
//! ```

pub use weft_core::*;

// Re-export dependencies for use in demos and downstream crates
pub use crossterm;
pub use ratatui;
pub use tokio;
