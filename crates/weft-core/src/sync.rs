//! Marshalling work from other threads onto the UI thread.

use crate::application::Application;
use crate::error::{Error, Result};
use crate::scheduler::LoopHandle;
use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// How often a blocked [`SyncContext::send`] checks whether the loop closed.
const SEND_POLL: Duration = Duration::from_millis(50);

/// Runs closures on the thread that owns an [`Application`].
///
/// Obtained from [`Application::sync_context`]. Closures are queued as
/// one-shot idle handlers, so they run in posting order on the next
/// iteration of the main loop.
#[derive(Clone)]
pub struct SyncContext {
    handle: LoopHandle<Application>,
    ui_thread: ThreadId,
}

impl SyncContext {
    pub(crate) fn new(handle: LoopHandle<Application>, ui_thread: ThreadId) -> Self {
        Self { handle, ui_thread }
    }

    /// Queue `f` and return immediately.
    pub fn post(&self, f: impl FnOnce(&mut Application) + Send + 'static) -> Result<()> {
        if self.handle.is_closed() {
            return Err(Error::LoopClosed);
        }
        let mut f = Some(f);
        self.handle.add_idle(move |app| {
            if let Some(f) = f.take() {
                f(app);
            }
            false
        });
        Ok(())
    }

    /// Queue `f` and block until it has run, returning its result.
    ///
    /// Fails with [`Error::SendOnUiThread`] when called from the UI thread,
    /// which would otherwise wait on itself forever.
    pub fn send<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut Application) -> R + Send + 'static,
    ) -> Result<R> {
        if thread::current().id() == self.ui_thread {
            return Err(Error::SendOnUiThread);
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.post(move |app| {
            let _ = tx.send(f(app));
        })?;
        loop {
            match rx.recv_timeout(SEND_POLL) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) if !self.handle.is_closed() => {}
                Err(_) => return Err(Error::LoopClosed),
            }
        }
    }

    /// Queue `f` now and resolve with its result once the loop has run it.
    pub fn invoke<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut Application) -> R + Send + 'static,
    ) -> impl Future<Output = Result<R>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let posted = self.post(move |app| {
            let _ = tx.send(f(app));
        });
        async move {
            posted?;
            rx.await.map_err(|_| Error::LoopClosed)
        }
    }

    /// Whether the caller is on the UI thread.
    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }
}
