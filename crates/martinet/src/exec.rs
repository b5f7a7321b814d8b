//! Command construction and process launching.
//!
//! [`Cmd`] is the builder side: program and argument [`Word`]s, per-command
//! environment, working directory, and the source location of the call site.
//! Expansion turns a `Cmd` into an [`Invocation`] — plain argv strings —
//! which the session hands to a [`Runner`].
//!
//! [`Runner`] is the seam between session semantics and the operating
//! system. [`ProcessRunner`] is the real backend on tokio's process support;
//! tests substitute a scripted implementation to get deterministic statuses.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::trace;

use crate::error::Result;
use crate::mode::Mode;
use crate::session::VarTable;
use crate::status::StatusCode;
use crate::trace::{quote, quote_join, SourceLocation};
use crate::word::Word;

/// A command under construction.
///
/// Arguments are [`Word`]s, so variable references and quoting survive until
/// the session expands them against its own table and mode. The builder
/// records where it was constructed; failure reports point there.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: Word,
    args: Vec<Word>,
    env: Vec<(String, String)>,
    env_clear: bool,
    cwd: Option<PathBuf>,
    at: SourceLocation,
}

impl Cmd {
    /// Start building a command.
    #[track_caller]
    pub fn new(program: impl Into<Word>) -> Self {
        Cmd {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            env_clear: false,
            cwd: None,
            at: SourceLocation::caller(),
        }
    }

    /// A `/bin/sh -c` one-liner.
    #[track_caller]
    pub fn sh(script: impl Into<String>) -> Self {
        Cmd::new("/bin/sh").arg("-c").arg(script.into())
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<Word>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, W>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<Word>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable for this command only.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Launch with an empty environment instead of inheriting.
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// Run in `dir` instead of the session's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Where this command was built.
    pub fn location(&self) -> &SourceLocation {
        &self.at
    }

    /// The command as written, for traces: unexpanded, shell-quoted where
    /// a rendered word contains whitespace.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, word) in std::iter::once(&self.program).chain(&self.args).enumerate() {
            if index > 0 {
                out.push(' ');
            }
            let rendered = word.render();
            if !word.is_quoted() && rendered.contains(char::is_whitespace) {
                out.push_str(&quote(&rendered));
            } else {
                out.push_str(&rendered);
            }
        }
        out
    }

    /// Expand every word into argv fields.
    ///
    /// All fields flatten into one list; the first becomes the program, as
    /// when an unquoted expansion produces several. `Ok(None)` means the
    /// whole command expanded to nothing, which runs as a successful no-op.
    pub(crate) fn expand(&self, vars: &VarTable, mode: &Mode) -> Result<Option<Invocation>> {
        let mut fields = self.program.expand(vars, mode)?;
        for arg in &self.args {
            fields.extend(arg.expand(vars, mode)?);
        }
        if fields.is_empty() {
            return Ok(None);
        }
        let program = fields.remove(0);
        Ok(Some(Invocation {
            program,
            args: fields,
            env: self.env.clone(),
            env_clear: self.env_clear,
            cwd: self.cwd.clone(),
        }))
    }
}

/// A fully expanded command, ready to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub env_clear: bool,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// The invocation as a single shell-quoted line.
    pub fn line(&self) -> String {
        quote_join(
            std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str)),
        )
    }
}

/// What one launch produced: a status, plus an optional diagnostic line
/// when the status had to be synthesized (spawn failure, wait error).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutcome {
    pub status: StatusCode,
    pub detail: Option<String>,
}

impl RunOutcome {
    /// An outcome with the given status and no diagnostic.
    pub fn new(status: StatusCode) -> Self {
        RunOutcome { status, detail: None }
    }

    /// An outcome carrying a diagnostic line.
    pub fn with_detail(status: StatusCode, detail: impl Into<String>) -> Self {
        RunOutcome {
            status,
            detail: Some(detail.into()),
        }
    }
}

/// The process-launching backend.
///
/// Runners only launch and report; whether a non-zero status becomes an
/// error is the session's call. Implementations must therefore never fail —
/// anything that goes wrong launching is itself an outcome.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Launch one invocation and wait for it.
    async fn run(&self, invocation: &Invocation) -> RunOutcome;

    /// Launch a pipeline and wait for every stage, in order.
    ///
    /// The default runs stages sequentially without connecting them, which
    /// is enough for scripted backends; real backends wire stdout to stdin.
    async fn run_pipeline(&self, stages: &[Invocation]) -> Vec<RunOutcome> {
        let mut outcomes = Vec::with_capacity(stages.len());
        for stage in stages {
            outcomes.push(self.run(stage).await);
        }
        outcomes
    }
}

/// The real backend: spawns operating-system processes via tokio.
///
/// Stdio is inherited from the parent, so command output goes wherever the
/// host program's does. Spawn failures map to the shell's reserved statuses:
/// 127 for a missing program, 126 for one that cannot be executed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(invocation: &Invocation) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&invocation.program);
        command.args(&invocation.args);
        if invocation.env_clear {
            command.env_clear();
        }
        for (name, value) in &invocation.env {
            command.env(name, value);
        }
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        command
    }

    fn spawn_failure(invocation: &Invocation, err: &std::io::Error) -> RunOutcome {
        let status = match err.kind() {
            std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => StatusCode::NOT_EXECUTABLE,
            _ => StatusCode::FAILURE,
        };
        RunOutcome::with_detail(status, format!("{}: {err}", invocation.program))
    }

    async fn wait(invocation: &Invocation, child: &mut tokio::process::Child) -> RunOutcome {
        match child.wait().await {
            Ok(wait_status) => RunOutcome::new(StatusCode::from_wait(wait_status)),
            Err(err) => RunOutcome::with_detail(
                StatusCode::FAILURE,
                format!("{}: {err}", invocation.program),
            ),
        }
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> RunOutcome {
        trace!(command = %invocation.line(), "launching");
        match Self::command(invocation).spawn() {
            Ok(mut child) => Self::wait(invocation, &mut child).await,
            Err(err) => Self::spawn_failure(invocation, &err),
        }
    }

    async fn run_pipeline(&self, stages: &[Invocation]) -> Vec<RunOutcome> {
        trace!(stages = stages.len(), "launching pipeline");
        let mut children: Vec<Option<tokio::process::Child>> = Vec::with_capacity(stages.len());
        let mut outcomes: Vec<Option<RunOutcome>> = vec![None; stages.len()];
        // Stdout of the previous stage, if it spawned and could be piped.
        let mut upstream: Option<Stdio> = None;

        for (index, stage) in stages.iter().enumerate() {
            let mut command = Self::command(stage);
            match upstream.take() {
                Some(stdin) => {
                    command.stdin(stdin);
                }
                // A dead upstream stage feeds the next one nothing at all.
                None if index > 0 => {
                    command.stdin(Stdio::null());
                }
                None => {}
            }
            let last = index + 1 == stages.len();
            if !last {
                command.stdout(Stdio::piped());
            }
            match command.spawn() {
                Ok(mut child) => {
                    if !last {
                        upstream = child
                            .stdout
                            .take()
                            .and_then(|stdout| TryInto::<Stdio>::try_into(stdout).ok());
                    }
                    children.push(Some(child));
                }
                Err(err) => {
                    outcomes[index] = Some(Self::spawn_failure(stage, &err));
                    children.push(None);
                }
            }
        }

        for (index, slot) in children.into_iter().enumerate() {
            if let Some(mut child) = slot {
                outcomes[index] = Some(Self::wait(&stages[index], &mut child).await);
            }
        }
        outcomes
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect()
    }
}
