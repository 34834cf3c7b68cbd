//! Slack delivery client.
//!
//! Wraps the Slack Web API `chat.postMessage` call. The rendered message
//! body is posted as Block Kit `blocks`, with the same string as the
//! plain-text fallback. Rejections surface the API's machine-readable
//! `error` reason (`channel_not_found`, `invalid_auth`, `ratelimited`, ...).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by a delivery client.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The API accepted the request but refused the message.
    #[error("slack rejected message for `{channel}`: {reason}")]
    Rejected { channel: String, reason: String },

    /// The request never completed (connect, TLS, HTTP status, decode).
    #[error("slack transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A destination that accepts rendered messages.
///
/// Implemented by [`SlackClient`] for real deliveries and by stubs in the
/// engine's tests.
#[async_trait]
pub trait Delivery {
    async fn deliver(&self, channel: &str, message: &str) -> Result<(), DeliveryError>;
}

const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Slack Web API client.
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    post_message_url: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            post_message_url: SLACK_POST_MESSAGE_URL.to_string(),
        }
    }

    /// Point the client at a different `chat.postMessage` endpoint.
    /// Used by tests to talk to a local server.
    pub fn with_post_message_url(mut self, url: impl Into<String>) -> Self {
        self.post_message_url = url.into();
        self
    }
}

/// Response envelope shared by Slack Web API methods.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
}

impl ApiResponse {
    fn into_result(self, channel: &str) -> Result<(), DeliveryError> {
        if self.ok {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                channel: channel.to_string(),
                reason: self.error.unwrap_or_else(|| "unknown_error".to_string()),
            })
        }
    }
}

#[async_trait]
impl Delivery for SlackClient {
    async fn deliver(&self, channel: &str, message: &str) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(&self.post_message_url)
            .bearer_auth(&self.token)
            .json(&json!({
                "channel": channel,
                "blocks": message,
                "text": message,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse = response.json().await?;
        body.into_result(channel)?;

        tracing::debug!(channel, "Slack accepted message");
        Ok(())
    }
}
