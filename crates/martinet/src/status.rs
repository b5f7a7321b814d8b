//! Status codes — the single value that crosses scope boundaries.
//!
//! Every command, pipeline, and isolated scope in martinet reduces to a
//! `StatusCode` in the shell range [0, 255]. Guarded execution delivers one
//! as data; honored failures carry one inside the error they propagate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An exit status in the shell range 0–255.
///
/// 0 means success; everything else is a failure of some flavor. Spawn
/// problems use the shell conventions: 127 for a command that could not be
/// found, 126 for one that could not be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u8);

impl StatusCode {
    /// The command completed successfully.
    pub const SUCCESS: StatusCode = StatusCode(0);
    /// Generic failure (the shell's `false`).
    pub const FAILURE: StatusCode = StatusCode(1);
    /// The command was found but could not be executed.
    pub const NOT_EXECUTABLE: StatusCode = StatusCode(126);
    /// The command was not found.
    pub const NOT_FOUND: StatusCode = StatusCode(127);

    /// Create a status from a raw byte.
    pub const fn new(code: u8) -> Self {
        StatusCode(code)
    }

    /// Create a status from a wider integer, masked into [0, 255] the way
    /// the shell masks `exit` arguments.
    pub const fn from_raw(code: i32) -> Self {
        StatusCode((code & 0xff) as u8)
    }

    /// Map a finished process's wait status into the shell convention:
    /// the exit code if the process exited, 128+signal if a signal killed it.
    pub fn from_wait(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return StatusCode::from_raw(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return StatusCode::from_raw(128 + signal);
            }
        }
        StatusCode::FAILURE
    }

    /// The raw code.
    pub const fn code(self) -> u8 {
        self.0
    }

    /// True if the status is 0.
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// True if the status is non-zero.
    pub const fn is_failure(self) -> bool {
        self.0 != 0
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::SUCCESS
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for StatusCode {
    fn from(code: u8) -> Self {
        StatusCode(code)
    }
}

impl From<StatusCode> for u8 {
    fn from(status: StatusCode) -> u8 {
        status.0
    }
}

impl From<StatusCode> for i32 {
    fn from(status: StatusCode) -> i32 {
        i32::from(status.0)
    }
}

impl From<bool> for StatusCode {
    fn from(ok: bool) -> Self {
        if ok {
            StatusCode::SUCCESS
        } else {
            StatusCode::FAILURE
        }
    }
}
