//! Data source — streams candidate message rows out of PostgreSQL.
//!
//! The configured SQL runs once per run and its result set is pulled one
//! row at a time. The stream is lazy, single-pass and never materializes
//! the full result set, so arbitrarily large queries stay in constant
//! memory.

use std::time::Duration;

use futures::{Stream, StreamExt};
use sqlx::Row as _;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use courier_common::types::MessageRow;

/// Message source backed by a PostgreSQL connection pool.
///
/// The pool is the run's only data-source resource: acquired once, held for
/// the run's duration, released with [`MessageSource::close`].
pub struct MessageSource {
    pool: PgPool,
}

impl MessageSource {
    /// Connect to the database.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool. Used by tests.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Execute `sql` and stream the resulting rows one at a time, in the
    /// order the database returns them.
    pub fn fetch<'a>(
        &'a self,
        sql: &'a str,
    ) -> impl Stream<Item = Result<MessageRow, sqlx::Error>> + 'a {
        sqlx::query(sql)
            .fetch(&self.pool)
            .map(|fetched| fetched.map(|row| extract_row(&row)))
    }

    /// Close the pool, releasing all connections.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Pull the message columns out of a result row.
///
/// A column the query did not project reads as `None`; lookups never fail.
fn extract_row(row: &PgRow) -> MessageRow {
    MessageRow {
        frequency: column(row, "frequency"),
        slack_channel: column(row, "slack_channel"),
        message_template: column(row, "message_template"),
        message_params: column(row, "message_params"),
    }
}

fn column(row: &PgRow, name: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(name).ok().flatten()
}
