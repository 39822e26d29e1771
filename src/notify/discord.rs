// src/notify/discord.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{post_json_with_retry, AlertSink};
use crate::error::AlertDeliveryError;

/// Discord caps embed descriptions at 4096 chars.
const MAX_DESCRIPTION: usize = 4096;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }
}

#[async_trait]
impl AlertSink for DiscordNotifier {
    async fn notify(&self, title: &str, content: &str) -> Result<(), AlertDeliveryError> {
        let payload = DiscordWebhookPayload::embed(title, content);
        post_json_with_retry(&self.client, &self.webhook, &payload, self.timeout, self.max_retries).await
    }

    fn channel_name(&self) -> &str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(title: &str, description: &str) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: title.to_string(),
                description: description.chars().take(MAX_DESCRIPTION).collect(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        let p = DiscordWebhookPayload::embed("Rate 2021-03-04 10:00", "body");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["content"], serde_json::Value::Null);
        assert_eq!(v["embeds"][0]["title"], "Rate 2021-03-04 10:00");
        assert_eq!(v["embeds"][0]["description"], "body");
    }
}
