//! Error taxonomy for strict-mode execution.
//!
//! Only honored failures surface as errors; suppressed and captured failures
//! are delivered as plain status codes. This keeps `?` equivalent to the
//! fail-fast termination of the source idiom: an unhandled `Error` unwinds
//! the script, and its status is what the process should exit with.

use thiserror::Error;

use crate::status::StatusCode;

/// Errors produced by strict-mode execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A command (or pipeline) failed while fail-fast was active and the
    /// ambient context honored it.
    #[error("command failed with status {status}: {command}")]
    CommandFailed {
        /// The failing command's (or pipeline's) aggregate status.
        status: StatusCode,
        /// Rendered command text, as shown in the failure report.
        command: String,
    },

    /// A word expansion referenced a variable that is not set while
    /// undefined-variable checking was active.
    #[error("{name}: unbound variable")]
    UndefinedVariable {
        /// The variable that was not set.
        name: String,
    },
}

impl Error {
    /// The status an isolated scope terminates with when this error ends it.
    ///
    /// Unbound-variable expansion failures carry status 1, matching the host
    /// shell's exit status for the same condition.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::CommandFailed { status, .. } => *status,
            Error::UndefinedVariable { .. } => StatusCode::FAILURE,
        }
    }
}

/// Result type for strict-mode execution.
pub type Result<T> = std::result::Result<T, Error>;
