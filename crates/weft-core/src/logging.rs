//! File logging for applications that own the terminal.
//!
//! A TUI cannot write diagnostics to stdout or stderr without corrupting the
//! screen, so the runtime's `tracing` output goes to a file instead.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "weft_core=info";

/// Install a global `tracing` subscriber appending to `path`.
///
/// The filter comes from `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`].
/// If a global subscriber is already installed this is a no-op, so calling it
/// once per [`Application`](crate::Application) is harmless.
pub fn log_to_file(path: impl AsRef<Path>) -> crate::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init();
    if installed.is_err() {
        tracing::debug!("global subscriber already installed; keeping it");
    }
    Ok(())
}
