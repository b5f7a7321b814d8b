//! The probe: would fail-fast actually fire here?
//!
//! Code that must know whether it runs inside a suppressing construct — the
//! condition of a conditional, a negation — cannot just read the errexit
//! flag: inside those constructs the flag looks enabled but failures no
//! longer terminate anything, and nothing run there can re-arm it. The
//! probe answers empirically. It runs a two-step experiment in an isolated
//! scope: force errexit on, fail, then succeed. Where fail-fast works the
//! scope dies at the failure and aggregates non-zero; where it is
//! suppressed the scope runs to the succeeding step and aggregates zero.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::Session;
use crate::status::StatusCode;

/// What the probe found out about the calling context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// A failing command here would terminate the scope.
    Honored,
    /// A suppressing construct is active; failures only set the status.
    Suppressed,
}

impl Verdict {
    /// `true` when fail-fast would fire.
    pub fn as_bool(self) -> bool {
        matches!(self, Verdict::Honored)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Honored => "honored",
            Verdict::Suppressed => "suppressed",
        })
    }
}

impl Session {
    /// Probe whether a failure at this point would be honored.
    ///
    /// Setup suspends fail-fast and unregisters the handler; the isolated
    /// experiment scope inherits that silence, so its deliberate failure is
    /// never reported even when honored. The scope then re-arms errexit for
    /// itself — the order matters and is what makes the probe work: only
    /// suppression inherited from the calling context can keep the failure
    /// from terminating the scope. The caller's mode is reinstated
    /// afterwards.
    pub async fn errexit_honored(&mut self) -> Verdict {
        let snapshot = self.mode_mut().snapshot();
        self.mode_mut().set_errexit(false);
        self.mode_mut().clear_handler();

        let aggregate = self
            .run_isolated(|probe| {
                Box::pin(async move {
                    // Step one must kill the scope when honored; step two
                    // proves it survived when not.
                    probe.mode_mut().set_errexit(true);
                    probe.run_status(StatusCode::FAILURE)?;
                    probe.run_status(StatusCode::SUCCESS)?;
                    Ok(())
                })
            })
            .await;

        self.mode_mut().restore(&snapshot);
        let verdict = if aggregate.is_failure() {
            Verdict::Honored
        } else {
            Verdict::Suppressed
        };
        debug!(%verdict, "errexit probe");
        verdict
    }

    /// [`errexit_honored`](Session::errexit_honored), writing `"true"` or
    /// `"false"` into the variable named by `dest`.
    pub async fn errexit_honored_into(&mut self, dest: &str) {
        let verdict = self.errexit_honored().await;
        self.vars_mut().assign(dest, verdict.as_bool().to_string());
    }
}
