use crate::tree::ViewId;

/// Errors raised by the weft runtime.
///
/// Contract violations (unbalanced [`end`](crate::Application::end) calls,
/// duplicate toplevel ids, focusing a view outside a container, cyclic
/// layout expressions) are reported synchronously and never downgraded.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error from terminal output or teardown.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The console driver could not take over the terminal.
    #[error("failed to initialize console driver: {source}")]
    DriverInit {
        #[source]
        source: std::io::Error,
    },

    /// `end` was called with a run state whose toplevel is not the stack top.
    #[error("unbalanced end: run state is bound to {actual:?} but the stack top is {expected:?}")]
    UnbalancedEnd {
        expected: Option<ViewId>,
        actual: Option<ViewId>,
    },

    /// Two stacked toplevels ended up with the same id.
    #[error("duplicate toplevel id {0:?}")]
    DuplicateToplevelId(String),

    /// Only one overlapped container may be running at a time.
    #[error("only one overlapped container is allowed")]
    SecondOverlappedContainer,

    /// The view asked to receive focus is not inside the container.
    #[error("{view:?} is not a descendant of {container:?}")]
    NotDescendant { container: ViewId, view: ViewId },

    /// Pos/Dim expressions of a container's subviews reference each other in a loop.
    #[error("layout cycle among the subviews of {superview:?}: {views:?}")]
    LayoutCycle {
        superview: ViewId,
        views: Vec<ViewId>,
    },

    /// A Pos/Dim expression references a view that is not a sibling.
    #[error("layout of {superview:?} references {target:?}, which is not one of its subviews")]
    LayoutForeignView { superview: ViewId, target: ViewId },

    /// A view was added below itself.
    #[error("cannot add {child:?} to {parent:?}: it would become its own ancestor")]
    WouldCycle { parent: ViewId, child: ViewId },

    /// The id does not name a live view.
    #[error("unknown view {0:?}")]
    UnknownView(ViewId),

    /// A view was disposed while still attached to a superview.
    #[error("{0:?} is still attached to a superview")]
    StillAttached(ViewId),

    /// A toplevel-only operation was given an ordinary view.
    #[error("{0:?} is not a toplevel")]
    NotAToplevel(ViewId),

    /// A blocking `send` was issued from the UI thread itself.
    #[error("blocking send issued from the UI thread")]
    SendOnUiThread,

    /// The application owning the main loop has shut down.
    #[error("the main loop is closed")]
    LoopClosed,

    /// An application callback reported a failure.
    #[error("callback failed: {0}")]
    Callback(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
