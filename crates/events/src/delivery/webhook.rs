//! CRM webhook delivery with exponential-backoff retry.
//!
//! [`CrmWebhook`] posts a [`CrmPayload`] to `{base}/submit-to-zoho`.
//! Complete events are retried up to three times with exponential backoff
//! (1 s, 2 s, 4 s); progress pings are sent once.

use std::time::Duration;

use async_trait::async_trait;
use onboard_core::submission::{CrmEventType, CrmPayload};
use serde::Deserialize;

use crate::error::CollaboratorError;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

const SUBMIT_PATH: &str = "submit-to-zoho";

/// Anything that can accept CRM payloads.
#[async_trait]
pub trait CrmSink: Send + Sync {
    async fn send(&self, payload: &CrmPayload) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// CrmWebhook
// ---------------------------------------------------------------------------

pub struct CrmWebhook {
    client: reqwest::Client,
    url: String,
    retry_delays: Vec<Duration>,
}

impl CrmWebhook {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: crate::endpoint(base_url, SUBMIT_PATH),
            retry_delays: RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }

    /// Override the backoff schedule for complete events.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a payload. Complete events retry with backoff and return the
    /// last error once every attempt has failed.
    pub async fn deliver(&self, payload: &CrmPayload) -> Result<(), CollaboratorError> {
        let event_type = payload.event_type.as_str();
        if payload.event_type == CrmEventType::Progress {
            return self.try_send(payload).await;
        }

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %self.url,
                        event_type,
                        error = %e,
                        "CRM delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(payload).await.map_err(|e| {
            tracing::error!(
                url = %self.url,
                event_type,
                error = %e,
                "CRM delivery failed after all retries"
            );
            e
        })
    }

    /// Execute a single POST and check both status and reply body.
    async fn try_send(&self, payload: &CrmPayload) -> Result<(), CollaboratorError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<WebhookReply>(&body) {
            Ok(reply) if !reply.success => Err(CollaboratorError::Rejected(
                reply.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            // Non-JSON or successful replies both count as delivered.
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CrmSink for CrmWebhook {
    async fn send(&self, payload: &CrmPayload) -> Result<(), CollaboratorError> {
        self.deliver(payload).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
