//! Pipelines against live processes.
//!
//! These run real `/bin/sh` and coreutils through the default backend:
//! stage wiring, per-stage status recording, pipefail aggregation, and the
//! spawn-failure statuses. Output verification goes through files — the
//! session never captures stdout, so the tests read back what the last
//! stage wrote.

use martinet::{Cmd, Session, StatusCode};
use martinet_testutil::CapturingHandler;

// ============================================================================
// Wiring
// ============================================================================

#[tokio::test]
async fn stdout_feeds_the_next_stage() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("data");
    let out = dir.path().join("out");
    std::fs::write(&data, "alpha\nbeta\nalpha\n")?;

    let mut session = Session::transient();
    let status = session
        .pipeline(&[
            Cmd::new("cat").arg(data.display().to_string()),
            Cmd::sh(format!("grep -c alpha > {}", out.display())),
        ])
        .await?;

    assert_eq!(status, StatusCode::SUCCESS);
    assert_eq!(std::fs::read_to_string(&out)?.trim(), "2");
    Ok(())
}

#[tokio::test]
async fn every_stage_status_is_recorded_in_order() {
    let mut session = Session::transient();
    let status = session
        .pipeline(&[Cmd::sh("exit 1"), Cmd::sh("exit 2"), Cmd::sh("exit 0")])
        .await
        .unwrap();

    // pipefail off: the last stage decides.
    assert_eq!(status, StatusCode::SUCCESS);
    assert_eq!(
        session.last_pipeline(),
        &[StatusCode::new(1), StatusCode::new(2), StatusCode::new(0)]
    );
}

#[tokio::test]
async fn a_single_stage_behaves_like_run() {
    let mut session = Session::transient();
    let status = session.pipeline(&[Cmd::sh("exit 7")]).await.unwrap();
    assert_eq!(status, StatusCode::new(7));
    assert_eq!(session.last_pipeline(), &[StatusCode::new(7)]);
}

#[tokio::test]
async fn an_empty_pipeline_is_a_successful_no_op() {
    let mut session = Session::transient();
    let status = session.pipeline(&[]).await.unwrap();
    assert_eq!(status, StatusCode::SUCCESS);
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn pipefail_surfaces_an_early_failing_stage() {
    let handler = CapturingHandler::new();
    let mut session = Session::transient();
    session.enable_strict();
    session.mode_mut().set_handler(handler.clone());

    let err = session
        .pipeline(&[Cmd::sh("exit 3"), Cmd::new("cat")])
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::new(3));
    let report = handler.last().unwrap();
    assert_eq!(report.command, "/bin/sh -c 'exit 3' | cat");
    assert_eq!(
        report.pipeline.as_deref(),
        Some(&[StatusCode::new(3), StatusCode::new(0)][..])
    );
}

#[tokio::test]
async fn without_pipefail_the_last_stage_wins() {
    let mut session = Session::transient();
    session.enable_strict();
    session.mode_mut().clear_handler();
    session.mode_mut().set_pipefail(false);

    let status = session
        .pipeline(&[Cmd::sh("exit 3"), Cmd::new("cat")])
        .await
        .unwrap();
    assert_eq!(status, StatusCode::SUCCESS);
    assert_eq!(
        session.last_pipeline(),
        &[StatusCode::new(3), StatusCode::new(0)]
    );
}

// ============================================================================
// Spawn failures and signals
// ============================================================================

#[tokio::test]
async fn a_dead_stage_leaves_127_and_feeds_nothing_downstream() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");

    let mut session = Session::transient();
    let status = session
        .pipeline(&[
            Cmd::new("martinet-no-such-binary"),
            Cmd::sh(format!("cat > {}", out.display())),
        ])
        .await?;

    assert_eq!(status, StatusCode::SUCCESS);
    assert_eq!(
        session.last_pipeline(),
        &[StatusCode::NOT_FOUND, StatusCode::SUCCESS]
    );
    // The downstream stage saw end-of-input, not a hang.
    assert_eq!(std::fs::read_to_string(&out)?, "");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn a_signal_death_reads_as_128_plus_signal() {
    let mut session = Session::transient();
    let status = session.run(&Cmd::sh("kill -TERM $$")).await.unwrap();
    assert_eq!(status, StatusCode::new(143));
}
