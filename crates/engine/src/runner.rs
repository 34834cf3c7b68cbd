//! Run orchestrator — drives one batch to completion.
//!
//! The row stream and delivery client are handed in by the caller, so the
//! data source and Slack stay substitutable. The orchestrator validates run
//! preconditions, owns the renderer for the run's duration, pulls rows one
//! at a time and folds each outcome into the aggregate exit status. Under
//! `--fail-fast` the first row failure aborts the run and surfaces the
//! original error unmodified.

use chrono::NaiveDate;
use futures::{Stream, TryStreamExt};
use thiserror::Error;

use courier_common::config::RunConfig;
use courier_common::types::MessageRow;
use courier_notifier::Delivery;

use crate::processor::{RowError, RowOutcome, RowProcessor};
use crate::renderer::{Renderer, TemplateStore};

/// Failures that abort the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A precondition failed before any row was processed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The data source failed while streaming rows.
    #[error("data source error: {0}")]
    Source(#[from] sqlx::Error),

    /// The first row failure, escalated because `--fail-fast` is set.
    #[error(transparent)]
    FailFast(RowError),
}

/// Process every row the source yields and return the aggregate exit
/// status: 0 when all rows were delivered or skipped, 1 when at least one
/// row failed without fail-fast.
pub async fn run<S, D>(config: &RunConfig, rows: S, delivery: &D) -> Result<i32, RunError>
where
    S: Stream<Item = Result<MessageRow, sqlx::Error>>,
    D: Delivery,
{
    let date_valid = NaiveDate::parse_from_str(&config.date_valid, "%Y-%m-%d").map_err(|err| {
        RunError::Config(format!("invalid date `{}`: {err}", config.date_valid))
    })?;

    let renderer = match &config.template_path {
        Some(dir) => Renderer::Store(
            TemplateStore::open(dir).map_err(|err| RunError::Config(err.to_string()))?,
        ),
        None => Renderer::Literal,
    };

    let processor = RowProcessor::new(config, &renderer, delivery, date_valid);

    let mut status = 0;
    let mut delivered = 0u64;
    let mut skipped = 0u64;
    let mut failed = 0u64;

    let mut rows = std::pin::pin!(rows);
    while let Some(row) = rows.try_next().await? {
        match processor.process(&row).await {
            RowOutcome::Failed(err) if config.fail_fast => {
                return Err(RunError::FailFast(err));
            }
            outcome => {
                status |= outcome.status_code();
                match outcome {
                    RowOutcome::Delivered | RowOutcome::DryRun => delivered += 1,
                    RowOutcome::Skipped => skipped += 1,
                    RowOutcome::Failed(_) => failed += 1,
                }
            }
        }
    }

    tracing::info!(delivered, skipped, failed, date_valid = %date_valid, "Run finished");
    Ok(status)
}
