//! The session: mode, variables, frames, and the run loop.
//!
//! A [`Session`] owns everything one script-like execution context needs —
//! the strict-mode flags, the variable table, the tracked call stack, and
//! the [`Runner`] that launches processes. Every command outcome lands in
//! one of three buckets:
//!
//! - *honored*: the command failed, errexit is on, and no suppressing
//!   construct is active. The failure handler fires once and the error
//!   propagates via `?`.
//! - *suppressed*: the command failed inside a [`check`](Session::check) /
//!   [`check_not`](Session::check_not) extent, or with errexit off. The
//!   status is recorded and execution continues.
//! - *captured*: the command ran under [`capture`](Session::capture), which
//!   converts any failure into a plain status without ever involving the
//!   handler.
//!
//! Suppression is depth-counted and inherited by isolated sub-scopes, so a
//! scope entered inside a condition cannot re-arm fail-fast from within —
//! the behavior [`errexit_honored`](Session::errexit_honored) exists to
//! detect.

mod capture;
mod probe;
mod vars;

pub use probe::Verdict;
pub use vars::VarTable;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::exec::{Cmd, Invocation, ProcessRunner, RunOutcome, Runner};
use crate::mode::Mode;
use crate::status::StatusCode;
use crate::trace::{FailureReport, FrameStack, SourceLocation, StackInspector, TraceFrame};

/// Boxed future a scope body returns.
///
/// Bodies are written as `|s| Box::pin(async move { ... })`; anything they
/// capture besides the session itself must be owned.
pub type ScopeFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Construction-time settings for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name used in log output.
    pub name: String,
    /// Working directory for launched commands, unless a command overrides
    /// it. `None` inherits the process working directory.
    pub cwd: Option<PathBuf>,
    /// Whether launched commands inherit the parent environment.
    pub inherit_env: bool,
}

impl SessionConfig {
    /// An anonymous throwaway session configuration.
    pub fn transient() -> Self {
        SessionConfig {
            name: "transient".to_string(),
            cwd: None,
            inherit_env: true,
        }
    }

    /// A named configuration with the transient defaults.
    pub fn named(name: impl Into<String>) -> Self {
        SessionConfig {
            name: name.into(),
            ..SessionConfig::transient()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig::transient()
    }
}

/// One execution context: mode, variables, frames, runner.
pub struct Session {
    config: SessionConfig,
    mode: Mode,
    vars: VarTable,
    frames: FrameStack,
    runner: Arc<dyn Runner>,
    inspector: Option<Arc<dyn StackInspector>>,
    suppress_depth: u32,
    last_status: StatusCode,
    last_pipeline: Vec<StatusCode>,
}

impl Session {
    /// A session launching real processes.
    pub fn new(config: SessionConfig) -> Self {
        Session::with_runner(config, Arc::new(ProcessRunner))
    }

    /// A throwaway session launching real processes.
    pub fn transient() -> Self {
        Session::new(SessionConfig::transient())
    }

    /// A session with a custom launching backend.
    pub fn with_runner(config: SessionConfig, runner: Arc<dyn Runner>) -> Self {
        Session {
            config,
            mode: Mode::new(),
            vars: VarTable::new(),
            frames: FrameStack::new(),
            runner,
            inspector: None,
            suppress_depth: 0,
            last_status: StatusCode::SUCCESS,
            last_pipeline: Vec::new(),
        }
    }

    /// Turn the full strict configuration on. See [`Mode::enable`].
    pub fn enable_strict(&mut self) {
        self.mode.enable();
    }

    /// Return to the relaxed defaults. See [`Mode::disable`].
    pub fn disable_strict(&mut self) {
        self.mode.disable();
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn mode_mut(&mut self) -> &mut Mode {
        &mut self.mode
    }

    pub fn vars(&self) -> &VarTable {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarTable {
        &mut self.vars
    }

    /// Status of the most recent command, the `$?` analog.
    pub fn last_status(&self) -> StatusCode {
        self.last_status
    }

    /// Per-stage statuses of the most recent command or pipeline.
    pub fn last_pipeline(&self) -> &[StatusCode] {
        &self.last_pipeline
    }

    /// Whether a suppressing construct is currently active.
    pub fn suppressed(&self) -> bool {
        self.suppress_depth > 0
    }

    /// Replace the frame source used for failure reports.
    pub fn set_stack_inspector(&mut self, inspector: Arc<dyn StackInspector>) {
        self.inspector = Some(inspector);
    }

    /// Expand and run one command.
    ///
    /// A failing status is an `Err` only when honored — errexit on and no
    /// suppressing construct active. A command that expands to nothing is a
    /// successful no-op. Referencing an unset variable under nounset is
    /// fatal regardless of suppression.
    pub async fn run(&mut self, cmd: &Cmd) -> Result<StatusCode> {
        let invocation = match cmd.expand(&self.vars, &self.mode) {
            Ok(Some(mut invocation)) => {
                self.prepare(&mut invocation);
                invocation
            }
            Ok(None) => {
                debug!(session = %self.config.name, "command expanded to nothing");
                return self.finish_command(
                    cmd.render(),
                    Some(cmd.location().clone()),
                    RunOutcome::new(StatusCode::SUCCESS),
                    None,
                );
            }
            Err(err) => {
                return Err(self.expansion_failure(cmd.render(), cmd.location().clone(), err));
            }
        };
        trace!(session = %self.config.name, command = %invocation.line(), "running");
        let runner = Arc::clone(&self.runner);
        let outcome = runner.run(&invocation).await;
        self.finish_command(cmd.render(), Some(cmd.location().clone()), outcome, None)
    }

    /// Record a bare status, the `true` / `false` style unit.
    ///
    /// No process is launched; the status flows through the same honored /
    /// suppressed taxonomy as a real command.
    #[track_caller]
    pub fn run_status(&mut self, status: StatusCode) -> Result<StatusCode> {
        let location = SourceLocation::caller();
        self.finish_command(
            format!("status {status}"),
            Some(location),
            RunOutcome::new(status),
            None,
        )
    }

    /// Run a pipeline: stdout of each stage feeds the next.
    ///
    /// Every stage is awaited and its status recorded — the
    /// [`last_pipeline`](Session::last_pipeline) analog of `PIPESTATUS`.
    /// The aggregate is the last stage's status, or under pipefail the
    /// rightmost failing stage's. Stages that expand to nothing drop out;
    /// an empty pipeline is a successful no-op.
    pub async fn pipeline(&mut self, stages: &[Cmd]) -> Result<StatusCode> {
        if let [only] = stages {
            return self.run(only).await;
        }
        let command = stages.iter().map(Cmd::render).collect::<Vec<_>>().join(" | ");
        let location = stages.first().map(|cmd| cmd.location().clone());

        let mut invocations = Vec::with_capacity(stages.len());
        for cmd in stages {
            match cmd.expand(&self.vars, &self.mode) {
                Ok(Some(mut invocation)) => {
                    self.prepare(&mut invocation);
                    invocations.push(invocation);
                }
                Ok(None) => {}
                Err(err) => {
                    let at = location.clone().unwrap_or_else(|| cmd.location().clone());
                    return Err(self.expansion_failure(command, at, err));
                }
            }
        }
        if invocations.is_empty() {
            return self.finish_command(command, location, RunOutcome::default(), None);
        }

        trace!(session = %self.config.name, stages = invocations.len(), "running pipeline");
        let runner = Arc::clone(&self.runner);
        let outcomes = runner.run_pipeline(&invocations).await;
        let statuses: Vec<StatusCode> = outcomes.iter().map(|outcome| outcome.status).collect();
        let aggregate = if self.mode.pipefail() {
            statuses
                .iter()
                .rev()
                .find(|status| status.is_failure())
                .copied()
                .unwrap_or(StatusCode::SUCCESS)
        } else {
            statuses.last().copied().unwrap_or(StatusCode::SUCCESS)
        };
        let detail = outcomes.iter().rev().find_map(|outcome| outcome.detail.clone());
        self.finish_command(
            command,
            location,
            RunOutcome { status: aggregate, detail },
            Some(statuses),
        )
    }

    /// Run `body` with fail-fast suppressed, as the condition position of a
    /// conditional does. Returns whether the body's last status succeeded.
    ///
    /// Suppression nests and is inherited by isolated scopes entered inside
    /// the body; nothing run within can re-arm fail-fast.
    pub async fn check<F>(&mut self, body: F) -> Result<bool>
    where
        F: for<'a> FnOnce(&'a mut Session) -> ScopeFuture<'a>,
    {
        self.suppress_depth += 1;
        let result = body(self).await;
        self.suppress_depth -= 1;
        result?;
        Ok(self.last_status.is_success())
    }

    /// [`check`](Session::check) with the truth value negated.
    pub async fn check_not<F>(&mut self, body: F) -> Result<bool>
    where
        F: for<'a> FnOnce(&'a mut Session) -> ScopeFuture<'a>,
    {
        Ok(!self.check(body).await?)
    }

    /// Run `body` in an isolated sub-scope and return its aggregate status.
    ///
    /// The sub-scope works on copies of the variables, frames, and mode, so
    /// nothing it changes survives; suppression depth carries over, and the
    /// failure handler carries over only under errtrace. An error inside
    /// becomes that error's status. The aggregate is recorded as the
    /// caller's last status but never honored — subshell-style.
    pub async fn run_isolated<F>(&mut self, body: F) -> StatusCode
    where
        F: for<'a> FnOnce(&'a mut Session) -> ScopeFuture<'a>,
    {
        let mut sub = self.subscope();
        let status = match body(&mut sub).await {
            Ok(()) => sub.last_status,
            Err(err) => err.status(),
        };
        self.last_status = status;
        self.last_pipeline = vec![status];
        status
    }

    /// Push a call frame; pair with [`pop_frame`](Session::pop_frame).
    #[track_caller]
    pub fn push_frame(&mut self, label: impl Into<String>, args: Vec<String>) {
        self.frames.push(TraceFrame {
            label: label.into(),
            location: SourceLocation::caller(),
            args,
        });
    }

    /// Pop the innermost call frame.
    ///
    /// Panics when no frame is pushed.
    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Current call-frame depth.
    pub fn frame_depth(&self) -> usize {
        self.frames.depth()
    }

    /// Run `body` inside a named call frame.
    ///
    /// The frame is visible to failure reports produced within and popped
    /// on the way out, error or not.
    #[track_caller]
    pub fn frame<'s, F>(
        &'s mut self,
        label: impl Into<String>,
        args: Vec<String>,
        body: F,
    ) -> impl Future<Output = Result<()>> + Send + 's
    where
        F: for<'a> FnOnce(&'a mut Session) -> ScopeFuture<'a> + Send + 's,
    {
        let frame = TraceFrame {
            label: label.into(),
            location: SourceLocation::caller(),
            args,
        };
        async move {
            self.frames.push(frame);
            let result = body(self).await;
            self.frames.pop();
            result
        }
    }

    /// Hand a report to the registered failure handler, if any.
    pub fn report_failure(&self, report: &FailureReport) {
        if let Some(handler) = self.mode.handler() {
            handler.on_failure(report);
        }
    }

    /// The frames a report would show right now, most recent call first.
    pub fn stack_frames(&self) -> Vec<TraceFrame> {
        match &self.inspector {
            Some(inspector) => inspector.frames(),
            None => self.frames.walk(),
        }
    }

    /// Apply session-level launch settings an invocation does not override.
    fn prepare(&self, invocation: &mut Invocation) {
        if invocation.cwd.is_none() {
            invocation.cwd = self.config.cwd.clone();
        }
        if !self.config.inherit_env {
            invocation.env_clear = true;
        }
    }

    fn subscope(&self) -> Session {
        Session {
            config: self.config.clone(),
            mode: self.mode.clone_for_subscope(),
            vars: self.vars.clone(),
            frames: self.frames.clone(),
            runner: Arc::clone(&self.runner),
            inspector: self.inspector.clone(),
            suppress_depth: self.suppress_depth,
            last_status: StatusCode::SUCCESS,
            last_pipeline: Vec::new(),
        }
    }

    /// Fold one outcome into the session: record it, then decide between
    /// honoring the failure and tolerating it.
    fn finish_command(
        &mut self,
        command: String,
        location: Option<SourceLocation>,
        outcome: RunOutcome,
        stage_statuses: Option<Vec<StatusCode>>,
    ) -> Result<StatusCode> {
        let status = outcome.status;
        self.last_status = status;
        self.last_pipeline = stage_statuses
            .clone()
            .unwrap_or_else(|| vec![status]);
        if status.is_success() {
            return Ok(status);
        }
        if !self.mode.errexit() || self.suppress_depth > 0 {
            debug!(status = %status, command = %command, "failure tolerated");
            return Ok(status);
        }
        let report = FailureReport {
            status,
            command: command.clone(),
            location,
            pipeline: stage_statuses,
            detail: outcome.detail,
            frames: self.stack_frames(),
        };
        self.report_failure(&report);
        warn!(status = %status, command = %command, "command failed");
        Err(Error::CommandFailed { status, command })
    }

    /// An unset-variable expansion failure: fatal even under suppression.
    fn expansion_failure(
        &mut self,
        command: String,
        location: SourceLocation,
        err: Error,
    ) -> Error {
        let status = err.status();
        self.last_status = status;
        self.last_pipeline = vec![status];
        let report = FailureReport {
            status,
            command: command.clone(),
            location: Some(location),
            pipeline: None,
            detail: Some(err.to_string()),
            frames: self.stack_frames(),
        };
        self.report_failure(&report);
        warn!(command = %command, error = %err, "expansion failed");
        err
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.config.name)
            .field("mode", &self.mode)
            .field("vars", &self.vars)
            .field("suppress_depth", &self.suppress_depth)
            .field("last_status", &self.last_status)
            .finish_non_exhaustive()
    }
}
