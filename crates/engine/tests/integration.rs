//! End-to-end runs over in-memory row streams and a stub delivery client.
//!
//! These cover the orchestrator's contract: aggregate exit status, per-row
//! error isolation, fail-fast escalation and the startup preconditions.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::{Stream, stream};

use courier_common::config::RunConfig;
use courier_common::types::MessageRow;
use courier_engine::processor::RowError;
use courier_engine::runner::{self, RunError};
use courier_notifier::{Delivery, DeliveryError};

// ============================================================
// Shared helpers
// ============================================================

/// Stub delivery client recording accepted messages, optionally rejecting
/// everything with a fixed reason.
#[derive(Default)]
struct StubDelivery {
    sent: Mutex<Vec<(String, String)>>,
    reject_with: Option<String>,
}

impl StubDelivery {
    fn rejecting(reason: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject_with: Some(reason.to_string()),
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delivery for StubDelivery {
    async fn deliver(&self, channel: &str, message: &str) -> Result<(), DeliveryError> {
        if let Some(reason) = &self.reject_with {
            return Err(DeliveryError::Rejected {
                channel: channel.to_string(),
                reason: reason.clone(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), message.to_string()));
        Ok(())
    }
}

fn make_config() -> RunConfig {
    RunConfig {
        database_url: "postgres://localhost/courier".to_string(),
        sql: "SELECT * FROM messages".to_string(),
        slack_token: Some("xoxb-test".to_string()),
        slack_channel: None,
        template_path: None,
        date_valid: "2025-06-16".to_string(),
        fail_fast: false,
        dry_run: false,
        db_max_connections: 5,
    }
}

fn make_row(frequency: &str, channel: &str, template: &str, params: &str) -> MessageRow {
    MessageRow {
        frequency: (!frequency.is_empty()).then(|| frequency.to_string()),
        slack_channel: (!channel.is_empty()).then(|| channel.to_string()),
        message_template: (!template.is_empty()).then(|| template.to_string()),
        message_params: (!params.is_empty()).then(|| params.to_string()),
    }
}

fn rows(rows: Vec<MessageRow>) -> impl Stream<Item = Result<MessageRow, sqlx::Error>> {
    stream::iter(rows.into_iter().map(Ok))
}

// ============================================================
// Aggregate status
// ============================================================

#[tokio::test]
async fn test_daily_row_delivers_exactly_once() {
    let config = make_config();
    let delivery = StubDelivery::default();
    let fixtures = vec![make_row(
        "daily",
        "reports",
        "You have $count alerts",
        r#"{"count": 2}"#,
    )];

    let status = runner::run(&config, rows(fixtures), &delivery).await.unwrap();

    assert_eq!(status, 0);
    assert_eq!(
        delivery.sent(),
        vec![("reports".to_string(), "You have 2 alerts".to_string())]
    );
}

#[tokio::test]
async fn test_never_row_is_skipped_with_clean_status() {
    let config = make_config();
    let delivery = StubDelivery::default();
    let fixtures = vec![make_row("never", "reports", "hi", "")];

    let status = runner::run(&config, rows(fixtures), &delivery).await.unwrap();

    assert_eq!(status, 0);
    assert!(delivery.sent().is_empty());
}

#[tokio::test]
async fn test_failed_row_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greeting.txt"), "Hi $name").unwrap();

    let config = RunConfig {
        template_path: Some(dir.path().to_path_buf()),
        ..make_config()
    };
    let delivery = StubDelivery::default();
    let fixtures = vec![
        make_row("daily", "reports", "missing.txt", ""),
        make_row("daily", "reports", "greeting.txt", r#"{"name": "ada"}"#),
    ];

    let status = runner::run(&config, rows(fixtures), &delivery).await.unwrap();

    // The broken row flips the aggregate; the good row still goes out.
    assert_eq!(status, 1);
    assert_eq!(
        delivery.sent(),
        vec![("reports".to_string(), "Hi ada".to_string())]
    );
}

#[tokio::test]
async fn test_missing_channel_flips_status_and_run_continues() {
    let config = make_config();
    let delivery = StubDelivery::default();
    let fixtures = vec![
        make_row("daily", "", "first", ""),
        make_row("daily", "reports", "second", ""),
    ];

    let status = runner::run(&config, rows(fixtures), &delivery).await.unwrap();

    assert_eq!(status, 1);
    assert_eq!(delivery.sent().len(), 1);
}

#[tokio::test]
async fn test_mixed_skips_and_deliveries_stay_clean() {
    let config = make_config();
    let delivery = StubDelivery::default();
    let fixtures = vec![
        make_row("never", "a", "one", ""),
        make_row("always", "b", "two", ""),
        make_row("", "c", "three", ""),
    ];

    let status = runner::run(&config, rows(fixtures), &delivery).await.unwrap();

    assert_eq!(status, 0);
    // `never` stays home; `always` and the untagged row both fire.
    assert_eq!(delivery.sent().len(), 2);
}

// ============================================================
// Fail-fast escalation
// ============================================================

#[tokio::test]
async fn test_fail_fast_surfaces_the_delivery_error_unmodified() {
    let config = RunConfig {
        fail_fast: true,
        ..make_config()
    };
    let delivery = StubDelivery::rejecting("channel_not_found");
    let fixtures = vec![
        make_row("daily", "reports", "hi", ""),
        make_row("daily", "reports", "never reached", ""),
    ];

    let err = runner::run(&config, rows(fixtures), &delivery)
        .await
        .unwrap_err();

    match err {
        RunError::FailFast(RowError::Delivery(DeliveryError::Rejected { channel, reason })) => {
            assert_eq!(channel, "reports");
            assert_eq!(reason, "channel_not_found");
        }
        other => panic!("expected fail-fast delivery error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fail_fast_aborts_before_later_rows() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("good.txt"), "fine").unwrap();

    let config = RunConfig {
        template_path: Some(dir.path().to_path_buf()),
        fail_fast: true,
        ..make_config()
    };
    let delivery = StubDelivery::default();
    let fixtures = vec![
        make_row("daily", "reports", "missing.txt", ""),
        make_row("daily", "reports", "good.txt", ""),
    ];

    let err = runner::run(&config, rows(fixtures), &delivery)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::FailFast(RowError::Render(_))
    ));
    assert!(delivery.sent().is_empty());
}

#[tokio::test]
async fn test_without_fail_fast_rejections_only_flip_status() {
    let config = make_config();
    let delivery = StubDelivery::rejecting("ratelimited");
    let fixtures = vec![make_row("daily", "reports", "hi", "")];

    let status = runner::run(&config, rows(fixtures), &delivery).await.unwrap();

    assert_eq!(status, 1);
}

// ============================================================
// Preconditions and source failures
// ============================================================

#[tokio::test]
async fn test_malformed_date_fails_before_any_row() {
    let config = RunConfig {
        date_valid: "16-06-2025".to_string(),
        ..make_config()
    };
    let delivery = StubDelivery::default();
    let fixtures = vec![make_row("daily", "reports", "hi", "")];

    let err = runner::run(&config, rows(fixtures), &delivery)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Config(_)));
    assert!(delivery.sent().is_empty());
}

#[tokio::test]
async fn test_missing_template_directory_fails_the_run() {
    let config = RunConfig {
        template_path: Some("/nonexistent/templates".into()),
        ..make_config()
    };
    let delivery = StubDelivery::default();

    let err = runner::run(&config, rows(vec![]), &delivery).await.unwrap_err();

    assert!(matches!(err, RunError::Config(_)));
}

#[tokio::test]
async fn test_source_error_aborts_the_run() {
    let config = make_config();
    let delivery = StubDelivery::default();
    let fixtures = stream::iter(vec![
        Ok(make_row("daily", "reports", "hi", "")),
        Err(sqlx::Error::RowNotFound),
    ]);

    let err = runner::run(&config, fixtures, &delivery).await.unwrap_err();

    assert!(matches!(err, RunError::Source(_)));
    // The row before the failure was still processed.
    assert_eq!(delivery.sent().len(), 1);
}

// ============================================================
// Dry run
// ============================================================

#[tokio::test]
async fn test_dry_run_renders_everything_and_delivers_nothing() {
    let config = RunConfig {
        dry_run: true,
        ..make_config()
    };
    let delivery = StubDelivery::default();
    let fixtures = vec![
        make_row("never", "reports", "hi", ""),
        make_row("daily", "reports", "hello", ""),
    ];

    let status = runner::run(&config, rows(fixtures), &delivery).await.unwrap();

    assert_eq!(status, 0);
    assert!(delivery.sent().is_empty());
}

#[tokio::test]
async fn test_dry_run_still_reports_broken_rows() {
    let config = RunConfig {
        dry_run: true,
        ..make_config()
    };
    let delivery = StubDelivery::default();
    let fixtures = vec![make_row("daily", "", "no channel anywhere", "")];

    let status = runner::run(&config, rows(fixtures), &delivery).await.unwrap();

    assert_eq!(status, 1);
}
