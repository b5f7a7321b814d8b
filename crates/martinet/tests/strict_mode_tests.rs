//! Strict-mode transitions and their observable behavior.
//!
//! Enabling is atomic (flags, separator, handler in one step), disabling
//! returns word splitting and unset-variable handling to the relaxed
//! defaults, and the unbound-variable failure is the one kind that no
//! suppressing construct softens.

use std::sync::Arc;

use martinet::{
    Cmd, Error, Session, SessionConfig, StatusCode, Word, DEFAULT_IFS, STRICT_IFS,
};
use martinet_testutil::{CapturingHandler, ScriptedRunner};

fn scripted(runner: Arc<ScriptedRunner>) -> Session {
    Session::with_runner(SessionConfig::named("strict-tests"), runner)
}

// ============================================================================
// Enable / disable round trip
// ============================================================================

#[tokio::test]
async fn disabling_restores_relaxed_splitting_and_lookup() {
    let runner = Arc::new(ScriptedRunner::new());
    let mut session = scripted(runner.clone());
    session.vars_mut().set("WORDS", "one two");

    // Relaxed: the space splits.
    session.run(&Cmd::new("log").arg(Word::var("WORDS"))).await.unwrap();
    // Strict: it does not.
    session.enable_strict();
    session.mode_mut().clear_handler();
    session.run(&Cmd::new("log").arg(Word::var("WORDS"))).await.unwrap();
    // Disabled again: back to splitting, and unset variables expand empty
    // instead of failing.
    session.disable_strict();
    session.run(&Cmd::new("log").arg(Word::var("WORDS"))).await.unwrap();
    let status = session
        .run(&Cmd::new("log").arg(Word::var("NEVER_SET")))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::SUCCESS);

    assert_eq!(
        runner.seen_lines(),
        vec!["log one two", "log 'one two'", "log one two", "log"]
    );
}

#[tokio::test]
async fn enable_is_atomic_and_idempotent() {
    let mut session = scripted(Arc::new(ScriptedRunner::new()));
    let handler = CapturingHandler::new();
    session.mode_mut().set_handler(handler.clone());

    session.enable_strict();
    session.enable_strict();

    let mode = session.mode();
    assert!(mode.errexit() && mode.errtrace() && mode.nounset() && mode.pipefail());
    assert_eq!(mode.ifs(), STRICT_IFS);
    // The pre-registered handler survives both calls.
    let kept = mode.handler().unwrap();
    assert!(Arc::ptr_eq(
        &kept,
        &(handler as Arc<dyn martinet::FailureHandler>)
    ));
}

#[test]
fn the_separators_are_what_scripts_rely_on() {
    assert_eq!(DEFAULT_IFS, " \t\n");
    assert_eq!(STRICT_IFS, "\n\t");
}

// ============================================================================
// Unbound variables
// ============================================================================

#[tokio::test]
async fn unguarded_unbound_access_reports_and_errors() {
    let handler = CapturingHandler::new();
    let mut session = scripted(Arc::new(ScriptedRunner::new()));
    session.enable_strict();
    session.mode_mut().set_handler(handler.clone());

    let err = session
        .run(&Cmd::new("tar").arg("-czf").arg(Word::var("ARCHIVE")))
        .await
        .unwrap_err();

    assert_eq!(err, Error::UndefinedVariable { name: "ARCHIVE".into() });
    let report = handler.last().unwrap();
    assert_eq!(report.status, StatusCode::FAILURE);
    assert_eq!(report.command, "tar -czf ${ARCHIVE}");
    assert_eq!(report.detail.as_deref(), Some("ARCHIVE: unbound variable"));
    assert!(report.location.is_some());
}

#[tokio::test]
async fn no_suppressing_construct_softens_unbound_access() {
    let mut session = scripted(Arc::new(ScriptedRunner::new()));
    session.enable_strict();
    session.mode_mut().clear_handler();

    let err = session
        .check(|s| {
            Box::pin(async move {
                s.run(&Cmd::new("log").arg(Word::var("NEVER_SET"))).await?;
                Ok(())
            })
        })
        .await
        .unwrap_err();
    assert_eq!(err, Error::UndefinedVariable { name: "NEVER_SET".into() });
    assert!(!session.suppressed(), "the depth unwound despite the error");
}

// ============================================================================
// Handler inheritance (errtrace)
// ============================================================================

#[tokio::test]
async fn errtrace_carries_the_handler_into_sub_scopes() {
    let handler = CapturingHandler::new();
    let runner = Arc::new(ScriptedRunner::failing_with(StatusCode::FAILURE));
    let mut session = scripted(runner);
    session.enable_strict();
    session.mode_mut().set_handler(handler.clone());

    let status = session
        .run_isolated(|sub| {
            Box::pin(async move {
                sub.run(&Cmd::new("job")).await?;
                Ok(())
            })
        })
        .await;
    assert_eq!(status, StatusCode::FAILURE);
    assert_eq!(handler.count(), 1, "errtrace inherits the handler");

    session.mode_mut().set_errtrace(false);
    let status = session
        .run_isolated(|sub| {
            Box::pin(async move {
                sub.run(&Cmd::new("job")).await?;
                Ok(())
            })
        })
        .await;
    assert_eq!(status, StatusCode::FAILURE);
    assert_eq!(handler.count(), 1, "without errtrace the sub-scope is silent");
}
