//! Status capture: run a command for its status, never for an error.
//!
//! [`Session::capture`] is the guarded path around [`Session::run`]. The
//! protocol suspends fail-fast in the caller's mode, runs the command in an
//! isolated sub-scope with the caller's flags reinstated (so word splitting
//! and nounset behave exactly as configured) but no failure handler, and
//! reinstates the caller's mode afterwards. Failure becomes data: the
//! status comes back, the handler never fires, nothing propagates.

use tracing::debug;

use crate::exec::Cmd;
use crate::session::Session;
use crate::status::StatusCode;

impl Session {
    /// Run `cmd` and hand back its status, whatever it is.
    ///
    /// The caller's mode is snapshotted before and reinstated after, flags
    /// and handler registration both, so guarded runs nest cleanly. Inside,
    /// the command sees the snapshotted flags — nounset still rejects unset
    /// variables, turning the expansion failure into its status — but no
    /// handler and no propagation. Stdout and stderr stay wherever the
    /// session's commands normally write; only the status is captured.
    pub async fn capture(&mut self, cmd: &Cmd) -> StatusCode {
        let snapshot = self.mode_mut().snapshot();
        // Suspend fail-fast around the scope switch itself.
        self.mode_mut().set_errexit(false);
        self.mode_mut().clear_handler();

        let guarded = snapshot.clone();
        let guarded_cmd = cmd.clone();
        let status = self
            .run_isolated(move |sub| {
                Box::pin(async move {
                    sub.mode_mut().restore(&guarded);
                    sub.mode_mut().clear_handler();
                    sub.run(&guarded_cmd).await?;
                    Ok(())
                })
            })
            .await;

        self.mode_mut().restore(&snapshot);
        debug!(status = %status, command = %cmd.render(), "captured status");
        status
    }

    /// [`capture`](Session::capture), writing the status into the variable
    /// named by `dest`. An empty destination discards it.
    pub async fn capture_into(&mut self, dest: &str, cmd: &Cmd) {
        let status = self.capture(cmd).await;
        self.vars_mut().assign(dest, status.to_string());
    }
}
