// src/notify/mod.rs
//! Alert transports. From the pipeline's point of view every send is
//! fire-and-forget: failures come back as `AlertDeliveryError` and get logged.

pub mod bark;
pub mod discord;
pub mod slack;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::AlertDeliveryError;

pub use bark::BarkNotifier;
pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, title: &str, content: &str) -> Result<(), AlertDeliveryError>;

    /// Short channel name for logs ("bark", "discord", ...).
    fn channel_name(&self) -> &str;
}

/// Writes alerts to the log only. Default channel when nothing else is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl AlertSink for LogNotifier {
    async fn notify(&self, title: &str, content: &str) -> Result<(), AlertDeliveryError> {
        tracing::info!(target: "alert", %title, %content, "alert");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

/// Delay before the retry following `attempt`, capped at 32s.
fn backoff_ms(attempt: u8) -> u64 {
    500u64 << attempt.saturating_sub(1).min(6)
}

/// POST `payload` as JSON, retrying with exponential backoff (500ms, 1s, 2s, ...).
pub(crate) async fn post_json_with_retry<P: Serialize + Sync>(
    client: &Client,
    url: &str,
    payload: &P,
    timeout: Duration,
    max_retries: u8,
) -> Result<(), AlertDeliveryError> {
    let max_retries = max_retries.max(1);
    let mut attempt: u8 = 0;
    loop {
        attempt += 1;
        let res = client.post(url).timeout(timeout).json(payload).send().await;

        let err = match res {
            Ok(rsp) if rsp.status().is_success() => return Ok(()),
            Ok(rsp) => AlertDeliveryError::Status(rsp.status().as_u16()),
            Err(e) => AlertDeliveryError::Http(e),
        };
        if attempt >= max_retries {
            return Err(err);
        }
        tracing::debug!(error = %err, attempt, "alert delivery failed, retrying");
        tokio::time::sleep(Duration::from_millis(backoff_ms(attempt))).await;
    }
}
