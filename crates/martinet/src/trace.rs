//! Failure reports and call-stack traces.
//!
//! When a failure is honored, the session assembles a [`FailureReport`] —
//! status, the literal command text, where it was issued, per-stage pipeline
//! statuses when relevant, and a walk of the tracked call frames — and hands
//! it to the registered [`FailureHandler`]. Reporting never alters control
//! flow; the error that terminates the script is already on its way.
//!
//! Frame walking is a capability, not core logic: the default inspector is
//! the session's own [`FrameStack`], but anything implementing
//! [`StackInspector`] can be injected in its place.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

use crate::status::StatusCode;

/// Rendered invocations longer than this many characters are cut and marked
/// with an ellipsis in trace output.
pub const MAX_INVOCATION_LEN: usize = 255;

/// A source position captured at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file, as reported by the compiler.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl SourceLocation {
    /// Capture the caller's position.
    #[track_caller]
    pub fn caller() -> Self {
        SourceLocation::from(Location::caller())
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        SourceLocation {
            file: location.file().to_string(),
            line: location.line(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One frame of the tracked call stack: who was invoked, from where, and
/// with what arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Function name, or empty to fall back to the source file in output.
    pub label: String,
    /// Where the frame was entered.
    pub location: SourceLocation,
    /// Arguments the frame was invoked with.
    pub args: Vec<String>,
}

impl TraceFrame {
    /// Build a frame labeled `label`, locating it at the caller.
    #[track_caller]
    pub fn here(label: impl Into<String>, args: Vec<String>) -> Self {
        TraceFrame {
            label: label.into(),
            location: SourceLocation::caller(),
            args,
        }
    }

    /// The frame's invocation as a single shell-quoted string.
    pub fn invocation(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        if !self.label.is_empty() {
            parts.push(self.label.clone());
        }
        parts.extend(self.args.iter().cloned());
        quote_join(parts.iter().map(String::as_str))
    }
}

/// The stack of frames a session tracks as script code pushes and pops them.
///
/// Pushes and pops must balance; popping an empty stack is a caller bug.
#[derive(Debug, Clone, Default)]
pub struct FrameStack {
    frames: Vec<TraceFrame>,
}

impl FrameStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        FrameStack::default()
    }

    /// Push a frame.
    pub fn push(&mut self, frame: TraceFrame) {
        self.frames.push(frame);
    }

    /// Pop the innermost frame.
    ///
    /// Panics if no frame is on the stack.
    pub fn pop(&mut self) {
        if self.frames.pop().is_none() {
            panic!("pop_frame without a matching push_frame");
        }
    }

    /// Number of frames currently tracked.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frames ordered most recent call first, ready for a report.
    pub fn walk(&self) -> Vec<TraceFrame> {
        self.frames.iter().rev().cloned().collect()
    }
}

/// Read-only access to an ordered sequence of call frames.
///
/// Implementations differ by environment — the session's own [`FrameStack`]
/// is the default, but a runtime-traced or externally-fed walker can be
/// injected instead.
pub trait StackInspector: Send + Sync {
    /// Frames ordered most recent call first.
    fn frames(&self) -> Vec<TraceFrame>;
}

impl StackInspector for FrameStack {
    fn frames(&self) -> Vec<TraceFrame> {
        self.walk()
    }
}

/// Everything known about one honored failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// The failing command's (or pipeline's) aggregate status.
    pub status: StatusCode,
    /// The literal failing command text, unexpanded.
    pub command: String,
    /// Where the command was issued, when known.
    pub location: Option<SourceLocation>,
    /// Per-stage statuses when the failure occurred inside a pipeline.
    pub pipeline: Option<Vec<StatusCode>>,
    /// Extra diagnostic line, e.g. a spawn error or an unbound variable.
    pub detail: Option<String>,
    /// Call frames, most recent call first.
    pub frames: Vec<TraceFrame>,
}

impl FailureReport {
    /// Render the report as the multi-line text trace.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "martinet: command failed with status {}: `{}`\n",
            self.status, self.command
        ));
        if let Some(location) = &self.location {
            out.push_str(&format!("  at {location}\n"));
        }
        if let Some(detail) = &self.detail {
            out.push_str(&format!("  {detail}\n"));
        }
        if let Some(stages) = &self.pipeline {
            let codes: Vec<String> = stages.iter().map(StatusCode::to_string).collect();
            out.push_str(&format!("  pipeline statuses: {}\n", codes.join(" ")));
        }
        if !self.frames.is_empty() {
            out.push_str("  call stack (most recent call first):\n");
            for (index, frame) in self.frames.iter().enumerate() {
                let label = if frame.label.is_empty() {
                    frame.location.file.as_str()
                } else {
                    frame.label.as_str()
                };
                out.push_str(&format!(
                    "    {index}: {label} {} `{}`\n",
                    frame.location,
                    truncate_invocation(&frame.invocation()),
                ));
            }
        }
        out
    }
}

/// Callback invoked on every honored failure.
///
/// Handlers report; they must not recover, retry, or otherwise affect
/// control flow.
pub trait FailureHandler: Send + Sync {
    /// Called once per honored failure, before the error propagates.
    fn on_failure(&self, report: &FailureReport);
}

/// Output format for [`TraceHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable multi-line trace.
    #[default]
    Text,
    /// One JSON object per failure.
    Json,
}

/// The default failure handler: prints the report to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceHandler {
    format: ReportFormat,
}

impl TraceHandler {
    /// Text traces (the default).
    pub fn text() -> Self {
        TraceHandler { format: ReportFormat::Text }
    }

    /// JSON traces, one object per line.
    pub fn json() -> Self {
        TraceHandler { format: ReportFormat::Json }
    }

    /// Render a report in this handler's format.
    pub fn format_report(&self, report: &FailureReport) -> String {
        match self.format {
            ReportFormat::Text => report.render(),
            ReportFormat::Json => match serde_json::to_string(report) {
                Ok(json) => format!("{json}\n"),
                Err(_) => report.render(),
            },
        }
    }
}

impl FailureHandler for TraceHandler {
    fn on_failure(&self, report: &FailureReport) {
        eprint!("{}", self.format_report(report));
    }
}

/// Quote a single argument for display in a trace, shell-style.
///
/// Plain words pass through; anything else is single-quoted with embedded
/// quotes escaped.
pub fn quote(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(is_plain) {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for ch in arg.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Quote and space-join a sequence of arguments.
pub fn quote_join<'a>(args: impl IntoIterator<Item = &'a str>) -> String {
    args.into_iter().map(quote).collect::<Vec<_>>().join(" ")
}

fn is_plain(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | ':' | '=' | '@' | '%' | '+' | ',')
}

fn truncate_invocation(invocation: &str) -> String {
    let mut chars = invocation.chars();
    let head: String = chars.by_ref().take(MAX_INVOCATION_LEN).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_passes_plain_words() {
        assert_eq!(quote("release"), "release");
        assert_eq!(quote("--jobs=4"), "--jobs=4");
        assert_eq!(quote("a/b.txt"), "a/b.txt");
    }

    #[test]
    fn quote_wraps_specials() {
        assert_eq!(quote("two words"), "'two words'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote("a;b"), "'a;b'");
    }

    #[test]
    fn quote_join_spaces_arguments() {
        assert_eq!(quote_join(["grep", "-q", "two words"]), "grep -q 'two words'");
    }

    #[test]
    fn truncation_kicks_in_past_the_limit() {
        let exact: String = "x".repeat(MAX_INVOCATION_LEN);
        assert_eq!(truncate_invocation(&exact), exact);

        let long: String = "x".repeat(MAX_INVOCATION_LEN + 40);
        let cut = truncate_invocation(&long);
        assert_eq!(cut.chars().count(), MAX_INVOCATION_LEN + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long: String = "ü".repeat(MAX_INVOCATION_LEN + 1);
        let cut = truncate_invocation(&long);
        assert_eq!(cut.chars().count(), MAX_INVOCATION_LEN + 3);
    }

    #[test]
    fn frame_here_captures_this_file() {
        let frame = TraceFrame::here("step", vec!["one".into()]);
        assert!(frame.location.file.ends_with("trace.rs"));
        assert_eq!(frame.invocation(), "step one");
    }

    #[test]
    fn frame_stack_walks_most_recent_first() {
        let mut stack = FrameStack::new();
        stack.push(TraceFrame::here("outer", vec![]));
        stack.push(TraceFrame::here("inner", vec![]));
        let frames = stack.walk();
        assert_eq!(frames[0].label, "inner");
        assert_eq!(frames[1].label, "outer");
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    #[should_panic(expected = "matching push_frame")]
    fn unbalanced_pop_panics() {
        FrameStack::new().pop();
    }

    #[test]
    fn render_includes_every_section() {
        let report = FailureReport {
            status: StatusCode::new(2),
            command: "grep -q pattern notes.txt".into(),
            location: Some(SourceLocation { file: "src/main.rs".into(), line: 42 }),
            pipeline: Some(vec![StatusCode::new(0), StatusCode::new(2), StatusCode::new(0)]),
            detail: Some("grep: exited with 2".into()),
            frames: vec![
                TraceFrame {
                    label: "scan".into(),
                    location: SourceLocation { file: "src/main.rs".into(), line: 30 },
                    args: vec!["notes.txt".into()],
                },
                TraceFrame {
                    label: String::new(),
                    location: SourceLocation { file: "src/main.rs".into(), line: 8 },
                    args: vec![],
                },
            ],
        };

        let text = report.render();
        let expected = "martinet: command failed with status 2: `grep -q pattern notes.txt`\n\
                        \x20 at src/main.rs:42\n\
                        \x20 grep: exited with 2\n\
                        \x20 pipeline statuses: 0 2 0\n\
                        \x20 call stack (most recent call first):\n\
                        \x20   0: scan src/main.rs:30 `scan notes.txt`\n\
                        \x20   1: src/main.rs src/main.rs:8 ``\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn render_skips_absent_sections() {
        let report = FailureReport {
            status: StatusCode::FAILURE,
            command: "false".into(),
            location: None,
            pipeline: None,
            detail: None,
            frames: vec![],
        };
        assert_eq!(
            report.render(),
            "martinet: command failed with status 1: `false`\n"
        );
    }

    #[test]
    fn json_format_is_one_object() {
        let handler = TraceHandler::json();
        let report = FailureReport {
            status: StatusCode::NOT_FOUND,
            command: "frobnicate".into(),
            location: None,
            pipeline: None,
            detail: Some("frobnicate: command not found".into()),
            frames: vec![],
        };
        let line = handler.format_report(&report);
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["status"], 127);
        assert_eq!(value["command"], "frobnicate");
        assert_eq!(value["detail"], "frobnicate: command not found");
    }
}
