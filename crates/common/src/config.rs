use std::path::PathBuf;

/// Configuration for a single run, assembled by the CLI from flags and
/// environment variables. Every option is a named, typed field; defaults
/// are documented on the CLI surface.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// PostgreSQL connection string for the message source
    pub database_url: String,

    /// SQL command producing the candidate message rows
    pub sql: String,

    /// Slack bot token; may be absent only when `dry_run` is set
    pub slack_token: Option<String>,

    /// Channel override; takes precedence over each row's `slack_channel`
    pub slack_channel: Option<String>,

    /// Directory containing message templates. `None` switches the renderer
    /// to literal-text mode, where each row carries its message verbatim.
    pub template_path: Option<PathBuf>,

    /// Reference date for frequency evaluation, `YYYY-MM-DD`
    pub date_valid: String,

    /// Abort the whole run on the first row failure
    pub fail_fast: bool,

    /// Render and print messages instead of delivering them
    pub dry_run: bool,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,
}

impl RunConfig {
    /// Check the preconditions that must hold before the run opens any
    /// connection: a delivery credential is required unless running dry.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.slack_token.is_none() && !self.dry_run {
            anyhow::bail!(
                "Slack token parameter is missing. Please use `--slack-token` \
                 or run with `--dry-run`!"
            );
        }
        Ok(())
    }
}
