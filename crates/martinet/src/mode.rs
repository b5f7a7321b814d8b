//! The fail-fast mode flags and their snapshots.
//!
//! [`Mode`] owns the four strict-mode switches (errexit, errtrace, nounset,
//! pipefail), the field separator used for word splitting, and the registered
//! failure handler. [`Mode::enable`] flips everything on in one step;
//! [`Mode::snapshot`] / [`Mode::restore`] let callers suspend and later
//! reinstate an exact configuration, handler registration included.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::trace::{FailureHandler, TraceHandler};

/// The relaxed field separator: split on spaces, tabs, and newlines.
pub const DEFAULT_IFS: &str = " \t\n";

/// The strict field separator: newline and tab only, so spaces survive
/// unquoted expansion.
pub const STRICT_IFS: &str = "\n\t";

/// The strict-mode switchboard for one session.
#[derive(Clone, Default)]
pub struct Mode {
    errexit: bool,
    errtrace: bool,
    nounset: bool,
    pipefail: bool,
    ifs: Option<String>,
    handler: Option<Arc<dyn FailureHandler>>,
}

/// A point-in-time copy of a [`Mode`], for restoring later.
///
/// Restoring reinstates the flags, the separator, and the exact handler
/// registration held when the snapshot was taken.
#[derive(Clone)]
pub struct ModeSnapshot {
    mode: Mode,
}

impl Mode {
    /// A relaxed mode: every flag off, default separator, no handler.
    pub fn new() -> Self {
        Mode::default()
    }

    /// Turn the whole strict configuration on in one step.
    ///
    /// Sets errexit, errtrace, nounset, and pipefail, narrows the separator
    /// to [`STRICT_IFS`], and registers the default text [`TraceHandler`]
    /// unless a handler is already in place. Calling this twice is a no-op.
    pub fn enable(&mut self) {
        self.errexit = true;
        self.errtrace = true;
        self.nounset = true;
        self.pipefail = true;
        self.ifs = Some(STRICT_IFS.to_string());
        if self.handler.is_none() {
            self.handler = Some(Arc::new(TraceHandler::text()));
        }
        debug!("strict mode enabled");
    }

    /// Return every flag to the relaxed default, reset the separator, and
    /// unregister the failure handler.
    pub fn disable(&mut self) {
        self.errexit = false;
        self.errtrace = false;
        self.nounset = false;
        self.pipefail = false;
        self.ifs = None;
        self.handler = None;
        debug!("strict mode disabled");
    }

    /// Capture the current configuration.
    pub fn snapshot(&self) -> ModeSnapshot {
        ModeSnapshot { mode: self.clone() }
    }

    /// Reinstate a previously captured configuration.
    pub fn restore(&mut self, snapshot: &ModeSnapshot) {
        *self = snapshot.mode.clone();
        debug!(
            errexit = self.errexit,
            nounset = self.nounset,
            pipefail = self.pipefail,
            "mode restored from snapshot"
        );
    }

    /// Whether a failing command terminates the scope.
    pub fn errexit(&self) -> bool {
        self.errexit
    }

    /// Whether sub-scopes inherit the failure handler.
    pub fn errtrace(&self) -> bool {
        self.errtrace
    }

    /// Whether expanding an unset variable is an error.
    pub fn nounset(&self) -> bool {
        self.nounset
    }

    /// Whether any failing pipeline stage fails the pipeline.
    pub fn pipefail(&self) -> bool {
        self.pipefail
    }

    /// The active field separator characters.
    pub fn ifs(&self) -> &str {
        self.ifs.as_deref().unwrap_or(DEFAULT_IFS)
    }

    pub fn set_errexit(&mut self, on: bool) {
        self.errexit = on;
    }

    pub fn set_errtrace(&mut self, on: bool) {
        self.errtrace = on;
    }

    pub fn set_nounset(&mut self, on: bool) {
        self.nounset = on;
    }

    pub fn set_pipefail(&mut self, on: bool) {
        self.pipefail = on;
    }

    /// Override the field separator. `None` falls back to [`DEFAULT_IFS`].
    pub fn set_ifs(&mut self, ifs: Option<String>) {
        self.ifs = ifs;
    }

    /// The registered failure handler, if any.
    pub fn handler(&self) -> Option<Arc<dyn FailureHandler>> {
        self.handler.clone()
    }

    /// Register a failure handler, replacing any previous one.
    pub fn set_handler(&mut self, handler: Arc<dyn FailureHandler>) {
        self.handler = Some(handler);
    }

    /// Drop the failure handler.
    pub fn clear_handler(&mut self) {
        self.handler = None;
    }

    /// The mode a freshly entered sub-scope starts with.
    ///
    /// Flags and separator carry over; the handler carries over only under
    /// errtrace, matching how traps are inherited.
    pub fn clone_for_subscope(&self) -> Mode {
        let mut sub = self.clone();
        if !sub.errtrace {
            sub.handler = None;
        }
        sub
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mode")
            .field("errexit", &self.errexit)
            .field("errtrace", &self.errtrace)
            .field("nounset", &self.nounset)
            .field("pipefail", &self.pipefail)
            .field("ifs", &self.ifs())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl fmt::Debug for ModeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModeSnapshot").field(&self.mode).finish()
    }
}

impl PartialEq for ModeSnapshot {
    fn eq(&self, other: &Self) -> bool {
        let a = &self.mode;
        let b = &other.mode;
        let handlers_match = match (&a.handler, &b.handler) {
            (Some(x), Some(y)) => Arc::ptr_eq(x, y),
            (None, None) => true,
            _ => false,
        };
        a.errexit == b.errexit
            && a.errtrace == b.errtrace
            && a.nounset == b.nounset
            && a.pipefail == b.pipefail
            && a.ifs() == b.ifs()
            && handlers_match
    }
}
