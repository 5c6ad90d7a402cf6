mod common;

use common::{success_calls, Call, Failures, Harness, SHORT_URL};
use spaced::pipeline::{Outcome, Rejection, Stage, StopReason};
use spaced::watch::{ChangeEvent, ChangeKind, WatchStreams};
use spaced::SpacedError;
use std::path::PathBuf;
use std::time::Duration;
use tokio_test::{assert_pending, assert_ready};
use tokio_util::sync::CancellationToken;

const TTL: Duration = Duration::from_secs(20 * 60);

fn created(path: &str) -> ChangeEvent {
    ChangeEvent::new(path, ChangeKind::Created)
}

#[tokio::test]
async fn test_screenshot_is_shared_under_prefix() {
    let harness = Harness::new("shots", TTL, Failures::default());

    let outcome = harness
        .pipeline
        .handle_event(&created("/home/me/Desktop/screenshot.png"))
        .await;

    assert_eq!(
        outcome,
        Outcome::Shared {
            short_url: SHORT_URL.parse().unwrap(),
            copied: true,
        }
    );
    assert_eq!(
        harness.log.calls(),
        success_calls("shots/screenshot.png", "/home/me/Desktop/screenshot.png", TTL)
    );
}

#[tokio::test]
async fn test_empty_prefix_uses_bare_name() {
    let harness = Harness::new("", Duration::from_secs(90), Failures::default());

    harness.pipeline.handle_event(&created("/tmp/a.png")).await;

    assert_eq!(
        harness.log.calls(),
        success_calls("a.png", "/tmp/a.png", Duration::from_secs(90))
    );
}

#[tokio::test]
async fn test_only_created_events_are_acted_on() {
    let harness = Harness::new("shots", TTL, Failures::default());

    for kind in [ChangeKind::Written, ChangeKind::Removed, ChangeKind::Renamed] {
        let outcome = harness
            .pipeline
            .handle_event(&ChangeEvent::new("/d/screenshot.png", kind))
            .await;
        assert_eq!(outcome, Outcome::Skipped(Rejection::NotCreated));
    }

    assert!(harness.log.is_empty());
}

#[tokio::test]
async fn test_hidden_and_non_png_files_are_ignored() {
    let harness = Harness::new("shots", TTL, Failures::default());

    let hidden = harness.pipeline.handle_event(&created("/d/.DS_Store")).await;
    let text = harness.pipeline.handle_event(&created("/d/notes.txt")).await;
    let temp = harness
        .pipeline
        .handle_event(&created("/d/.screenshot.png"))
        .await;

    assert_eq!(hidden, Outcome::Skipped(Rejection::Hidden));
    assert_eq!(text, Outcome::Skipped(Rejection::WrongExtension));
    assert_eq!(temp, Outcome::Skipped(Rejection::Hidden));
    assert!(harness.log.is_empty());
}

#[tokio::test]
async fn test_upload_failure_stops_before_presign() {
    let harness = Harness::new(
        "shots",
        TTL,
        Failures {
            put: true,
            ..Default::default()
        },
    );

    let outcome = harness.pipeline.handle_event(&created("/d/a.png")).await;

    assert_eq!(outcome, Outcome::Abandoned(Stage::Upload));
    assert_eq!(
        harness.log.calls(),
        vec![Call::Put {
            key: "shots/a.png".to_string(),
            path: PathBuf::from("/d/a.png"),
        }]
    );
}

#[tokio::test]
async fn test_presign_failure_keeps_upload_and_skips_shortener() {
    let harness = Harness::new(
        "shots",
        TTL,
        Failures {
            presign: true,
            ..Default::default()
        },
    );

    let outcome = harness.pipeline.handle_event(&created("/d/a.png")).await;

    assert_eq!(outcome, Outcome::Abandoned(Stage::Presign));
    // nothing is rolled back: the put stays the last storage interaction
    assert_eq!(
        harness.log.calls(),
        success_calls("shots/a.png", "/d/a.png", TTL)[..2].to_vec()
    );
}

#[tokio::test]
async fn test_shorten_failure_skips_clipboard() {
    let harness = Harness::new(
        "shots",
        TTL,
        Failures {
            shorten: true,
            ..Default::default()
        },
    );

    let outcome = harness.pipeline.handle_event(&created("/d/a.png")).await;

    assert_eq!(outcome, Outcome::Abandoned(Stage::Shorten));
    assert_eq!(
        harness.log.calls(),
        success_calls("shots/a.png", "/d/a.png", TTL)[..3].to_vec()
    );
}

#[tokio::test]
async fn test_clipboard_write_failure_still_closes_and_waits() {
    let harness = Harness::new(
        "shots",
        TTL,
        Failures {
            write: true,
            wait: true,
            ..Default::default()
        },
    );

    let outcome = harness.pipeline.handle_event(&created("/d/a.png")).await;

    assert_eq!(
        outcome,
        Outcome::Shared {
            short_url: SHORT_URL.parse().unwrap(),
            copied: false,
        }
    );
    assert_eq!(
        harness.log.calls(),
        success_calls("shots/a.png", "/d/a.png", TTL)
    );
}

#[tokio::test]
async fn test_clipboard_close_failure_still_waits() {
    let harness = Harness::new(
        "shots",
        TTL,
        Failures {
            close: true,
            ..Default::default()
        },
    );

    harness.pipeline.handle_event(&created("/d/a.png")).await;

    let calls = harness.log.calls();
    assert_eq!(calls.last(), Some(&Call::ClipWait));
}

#[tokio::test]
async fn test_clipboard_open_failure_skips_session() {
    let harness = Harness::new(
        "shots",
        TTL,
        Failures {
            open: true,
            ..Default::default()
        },
    );

    let outcome = harness.pipeline.handle_event(&created("/d/a.png")).await;

    assert!(matches!(outcome, Outcome::Shared { copied: false, .. }));
    assert_eq!(
        harness.log.calls(),
        success_calls("shots/a.png", "/d/a.png", TTL)[..4].to_vec()
    );
}

#[tokio::test]
async fn test_stop_while_idle_makes_no_calls() {
    let harness = Harness::new("shots", TTL, Failures::default());
    let (_event_tx, _error_tx, streams) = WatchStreams::channel();
    let stop = CancellationToken::new();

    let mut task = tokio_test::task::spawn(harness.pipeline.run(streams, stop.clone()));
    assert_pending!(task.poll());

    stop.cancel();
    assert!(task.is_woken());
    let reason = assert_ready!(task.poll());

    assert_eq!(reason, StopReason::Requested);
    assert!(harness.log.is_empty());
}

#[tokio::test]
async fn test_closed_error_stream_stops_pipeline() {
    let harness = Harness::new("shots", TTL, Failures::default());
    let (_event_tx, error_tx, streams) = WatchStreams::channel();
    let stop = CancellationToken::new();

    let mut task = tokio_test::task::spawn(harness.pipeline.run(streams, stop.clone()));
    assert_pending!(task.poll());

    drop(error_tx);
    assert!(task.is_woken());
    let reason = assert_ready!(task.poll());

    assert_eq!(reason, StopReason::WatchClosed);
    assert!(stop.is_cancelled());
}

#[tokio::test]
async fn test_watch_errors_are_logged_and_processing_continues() {
    let harness = Harness::new("shots", TTL, Failures::default());
    let log = harness.log.clone();
    let (event_tx, error_tx, streams) = WatchStreams::channel();
    let stop = CancellationToken::new();

    let worker = tokio::spawn(harness.pipeline.run(streams, stop.clone()));

    error_tx
        .send(SpacedError::Watch("queue overflow".to_string()))
        .unwrap();
    event_tx.send(created("/d/after-error.png")).unwrap();

    log.wait_for(7).await;
    assert!(!stop.is_cancelled());

    stop.cancel();
    assert_eq!(worker.await.unwrap(), StopReason::Requested);
    assert_eq!(
        log.calls(),
        success_calls("shots/after-error.png", "/d/after-error.png", TTL)
    );
}

#[tokio::test]
async fn test_events_are_processed_one_at_a_time_in_order() {
    let harness = Harness::new("shots", TTL, Failures::default());
    let log = harness.log.clone();
    let (event_tx, _error_tx, streams) = WatchStreams::channel();
    let stop = CancellationToken::new();

    event_tx.send(created("/d/first.png")).unwrap();
    event_tx.send(created("/d/notes.txt")).unwrap();
    event_tx.send(created("/d/second.png")).unwrap();

    let worker = tokio::spawn(harness.pipeline.run(streams, stop.clone()));

    log.wait_for(14).await;
    stop.cancel();
    worker.await.unwrap();

    let mut expected = success_calls("shots/first.png", "/d/first.png", TTL);
    expected.extend(success_calls("shots/second.png", "/d/second.png", TTL));
    assert_eq!(log.calls(), expected);
}

#[tokio::test]
async fn test_closed_event_stream_does_not_stop_pipeline() {
    let harness = Harness::new("shots", TTL, Failures::default());
    let (event_tx, _error_tx, streams) = WatchStreams::channel();
    let stop = CancellationToken::new();

    let mut task = tokio_test::task::spawn(harness.pipeline.run(streams, stop.clone()));
    assert_pending!(task.poll());

    drop(event_tx);
    assert_pending!(task.poll());
    assert!(!stop.is_cancelled());

    stop.cancel();
    assert_eq!(assert_ready!(task.poll()), StopReason::Requested);
}
