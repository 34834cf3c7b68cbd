//! `slack-courier` — send scheduled messages from a SQL database into
//! Slack.
//!
//! One invocation is one run: execute the configured SQL, process every
//! row, exit. Exit code 0 means every row was delivered or skipped; 1 means
//! at least one row failed; configuration errors and fail-fast escalations
//! exit non-zero through the error path before any aggregate is computed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use courier_common::config::RunConfig;
use courier_engine::runner;
use courier_notifier::SlackClient;
use courier_source::MessageSource;

#[derive(Parser)]
#[command(
    name = "slack-courier",
    about = "Send scheduled messages from a SQL database into Slack",
    version
)]
struct Cli {
    /// PostgreSQL connection string for the message source
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// SQL command producing the message rows
    #[arg(long, env = "SQL")]
    sql: String,

    /// Slack bot token used for delivery
    #[arg(long, env = "SLACK_TOKEN")]
    slack_token: Option<String>,

    /// Slack channel. This parameter overrides the value from the database.
    #[arg(long)]
    slack_channel: Option<String>,

    /// Directory with message templates. Omit to treat each row's
    /// `message_template` as the message text itself.
    #[arg(long, env = "TEMPLATE_PATH")]
    template_path: Option<PathBuf>,

    /// Date valid (YYYY-MM-DD). Default: current date.
    #[arg(long, default_value_t = default_date_valid())]
    date_valid: String,

    /// Stop the whole run on the first row failure instead of continuing
    #[arg(long)]
    fail_fast: bool,

    /// Print rendered messages to stdout. Do not send them to Slack.
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of PostgreSQL connections in the pool
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    db_max_connections: u32,
}

fn default_date_valid() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            database_url: self.database_url,
            sql: self.sql,
            slack_token: self.slack_token,
            slack_channel: self.slack_channel,
            template_path: self.template_path,
            date_valid: self.date_valid,
            fail_fast: self.fail_fast,
            dry_run: self.dry_run,
            db_max_connections: self.db_max_connections,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "slack_courier=info,courier_engine=info,courier_source=info,courier_notifier=info"
                    .into()
            }),
        )
        .init();

    let config = Cli::parse().into_config();

    if let Err(err) = config.validate() {
        tracing::error!(error = %err, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    match execute(&config).await {
        Ok(status) => ExitCode::from(status as u8),
        Err(err) => {
            tracing::error!(error = %err, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

/// Open the source, drive the run, and close the source on every exit path.
async fn execute(config: &RunConfig) -> anyhow::Result<i32> {
    let source = MessageSource::connect(&config.database_url, config.db_max_connections).await?;
    let delivery = SlackClient::new(config.slack_token.clone().unwrap_or_default());

    let result = runner::run(config, source.fetch(&config.sql), &delivery).await;
    source.close().await;

    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_date_valid_parses_back() {
        let date = default_date_valid();
        assert!(chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_ok());
    }
}
