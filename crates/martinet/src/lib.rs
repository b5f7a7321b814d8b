//! martinet: fail-fast discipline for process-running code.
//!
//! This crate provides:
//!
//! - **Mode**: the strict-mode switchboard — errexit, errtrace, nounset,
//!   pipefail, the strict field separator — with atomic enable/disable and
//!   snapshot/restore
//! - **Session**: the execution context that runs commands and pipelines,
//!   tracks `$?` and per-stage statuses, and sorts every failure into
//!   honored, suppressed, or captured
//! - **Capture**: the guarded executor — run a command for its status with
//!   fail-fast suspended and reinstated around it, failures as data
//! - **Probe**: `errexit_honored` — detect from inside a suppressing
//!   construct that fail-fast silently stopped applying
//! - **Traces**: failure reports with source locations, pipeline statuses,
//!   and a pluggable call-stack inspector
//!
//! Commands are built from [`Word`]s, so variable references expand against
//! the session's table under its mode — word splitting and unset-variable
//! strictness behave the same for ordinary runs and guarded ones.

pub mod error;
pub mod exec;
pub mod mode;
pub mod session;
pub mod status;
pub mod trace;
pub mod word;

pub use error::{Error, Result};
pub use exec::{Cmd, Invocation, ProcessRunner, RunOutcome, Runner};
pub use mode::{Mode, ModeSnapshot, DEFAULT_IFS, STRICT_IFS};
pub use session::{ScopeFuture, Session, SessionConfig, VarTable, Verdict};
pub use status::StatusCode;
pub use trace::{
    FailureHandler, FailureReport, FrameStack, ReportFormat, SourceLocation, StackInspector,
    TraceFrame, TraceHandler,
};
pub use word::{Word, WordPart};

use std::sync::LazyLock;

use tokio::sync::Mutex;

static GLOBAL: LazyLock<Mutex<Session>> = LazyLock::new(|| Mutex::new(Session::transient()));

/// The process-wide default session.
///
/// Exists for code that wants one ambient strict-mode context rather than
/// threading a [`Session`] through. The lock is async-aware, so it may be
/// held across command runs; everything else should prefer an owned
/// session.
pub fn global() -> &'static Mutex<Session> {
    &GLOBAL
}
