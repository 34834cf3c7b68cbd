//! Row processor — the per-row delivery pipeline.
//!
//! For one row: parse schedule tags, gate on the frequency matcher, resolve
//! the destination channel, render the message body, deliver. Every failure
//! is caught at the row boundary, logged with the row's context, and
//! returned as a classified value — escalation under fail-fast is the run
//! orchestrator's decision, not the processor's.

use chrono::NaiveDate;
use thiserror::Error;

use courier_common::config::RunConfig;
use courier_common::types::MessageRow;
use courier_notifier::{Delivery, DeliveryError};

use crate::matcher;
use crate::renderer::{RenderError, Renderer};

/// Failures scoped to a single row.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("row has no slack channel and no `--slack-channel` override was given")]
    MissingChannel,

    #[error("missing `message_template` column or this column is empty")]
    MissingTemplate,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// What processing one row produced.
#[derive(Debug)]
pub enum RowOutcome {
    /// Message rendered and accepted by the delivery client.
    Delivered,
    /// Message rendered and printed; delivery suppressed by `--dry-run`.
    DryRun,
    /// Frequency conditions not met; nothing was attempted.
    Skipped,
    /// The row failed; the error has already been logged with row context.
    Failed(RowError),
}

impl RowOutcome {
    /// Contribution to the run's aggregate exit status.
    pub fn status_code(&self) -> i32 {
        match self {
            RowOutcome::Failed(_) => 1,
            _ => 0,
        }
    }
}

/// Per-row pipeline. Borrows the run's renderer and delivery client for the
/// run's duration and holds no state of its own across rows.
pub struct RowProcessor<'a, D> {
    config: &'a RunConfig,
    renderer: &'a Renderer,
    delivery: &'a D,
    date_valid: NaiveDate,
}

impl<'a, D: Delivery> RowProcessor<'a, D> {
    pub fn new(
        config: &'a RunConfig,
        renderer: &'a Renderer,
        delivery: &'a D,
        date_valid: NaiveDate,
    ) -> Self {
        Self {
            config,
            renderer,
            delivery,
            date_valid,
        }
    }

    /// Run one row through the pipeline.
    pub async fn process(&self, row: &MessageRow) -> RowOutcome {
        let tags = matcher::parse_tags(row.frequency.as_deref());

        // Dry runs bypass the frequency gate entirely.
        if !self.config.dry_run && !matcher::should_fire(self.date_valid, &tags) {
            tracing::debug!(
                channel = row.slack_channel.as_deref().unwrap_or(""),
                frequency = row.frequency.as_deref().unwrap_or(""),
                "Frequency conditions not met, row skipped"
            );
            return RowOutcome::Skipped;
        }

        match self.deliver_row(row).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    channel = row.slack_channel.as_deref().unwrap_or(""),
                    template = row.message_template.as_deref().unwrap_or(""),
                    params = row.message_params.as_deref().unwrap_or("{}"),
                    error = %err,
                    "Row failed"
                );
                RowOutcome::Failed(err)
            }
        }
    }

    async fn deliver_row(&self, row: &MessageRow) -> Result<RowOutcome, RowError> {
        let channel = self
            .config
            .slack_channel
            .as_deref()
            .filter(|channel| !channel.is_empty())
            .or_else(|| row.slack_channel.as_deref().filter(|channel| !channel.is_empty()))
            .ok_or(RowError::MissingChannel)?;

        let template_ref = row
            .message_template
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(RowError::MissingTemplate)?;

        let params = row.params();
        let rendered = self.renderer.render(template_ref, &params)?;

        if self.config.dry_run {
            tracing::info!(channel, "Dry run, printing message instead of delivering");
            println!("{rendered}");
            return Ok(RowOutcome::DryRun);
        }

        self.delivery.deliver(channel, &rendered).await?;
        tracing::info!(channel, "Message delivered");
        Ok(RowOutcome::Delivered)
    }
}
