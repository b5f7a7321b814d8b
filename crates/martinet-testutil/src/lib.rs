//! Test utilities for martinet.
//!
//! Provides the deterministic pieces integration tests swap in for the real
//! process backend:
//! - [`ScriptedRunner`] — a [`Runner`] that replays scripted statuses per
//!   command line and records every invocation it sees
//! - [`CapturingHandler`] — a [`FailureHandler`] that collects reports
//!   instead of printing them
//! - [`exit_with`] — a real `/bin/sh` command exiting with a chosen status,
//!   for tests that do want a live process

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use martinet::exec::{Invocation, RunOutcome, Runner};
use martinet::status::StatusCode;
use martinet::trace::{FailureHandler, FailureReport};
use martinet::Cmd;

/// A runner that never touches the operating system.
///
/// Statuses are scripted per shell-quoted command line (see
/// [`Invocation::line`]); each scripted status is consumed once, in order.
/// Unscripted commands get the runner's default status. Every invocation is
/// recorded for later assertions.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<StatusCode>>>,
    default: StatusCode,
    seen: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    /// Every unscripted command succeeds.
    pub fn new() -> Self {
        ScriptedRunner::default()
    }

    /// Every unscripted command exits with `default`.
    pub fn failing_with(default: StatusCode) -> Self {
        ScriptedRunner {
            default,
            ..ScriptedRunner::default()
        }
    }

    /// Script the statuses successive runs of `line` will produce.
    pub fn script(self, line: &str, statuses: impl IntoIterator<Item = u8>) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(line.to_string())
            .or_default()
            .extend(statuses.into_iter().map(StatusCode::new));
        self
    }

    /// Everything run so far, in order.
    pub fn seen(&self) -> Vec<Invocation> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The command lines run so far, in order.
    pub fn seen_lines(&self) -> Vec<String> {
        self.seen().iter().map(Invocation::line).collect()
    }

    /// How many launches happened.
    pub fn launches(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Runner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> RunOutcome {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
        let status = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&invocation.line())
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.default);
        RunOutcome::new(status)
    }
}

/// A failure handler that keeps every report it is handed.
#[derive(Debug, Default)]
pub struct CapturingHandler {
    reports: Mutex<Vec<FailureReport>>,
}

impl CapturingHandler {
    /// A fresh handler behind an `Arc`, ready for
    /// [`Mode::set_handler`](martinet::Mode::set_handler).
    pub fn new() -> Arc<Self> {
        Arc::new(CapturingHandler::default())
    }

    /// Everything reported so far.
    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of reports received.
    pub fn count(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The most recent report, if any.
    pub fn last(&self) -> Option<FailureReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl FailureHandler for CapturingHandler {
    fn on_failure(&self, report: &FailureReport) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
    }
}

/// A live `/bin/sh` command that exits with `status`.
pub fn exit_with(status: u8) -> Cmd {
    Cmd::sh(format!("exit {status}"))
}
