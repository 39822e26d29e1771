// src/notify/slack.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{post_json_with_retry, AlertSink};
use crate::error::AlertDeliveryError;

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
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
impl AlertSink for SlackNotifier {
    async fn notify(&self, title: &str, content: &str) -> Result<(), AlertDeliveryError> {
        let body = serde_json::json!({ "text": format!("*{title}*\n{content}") });
        post_json_with_retry(&self.client, &self.webhook_url, &body, self.timeout, self.max_retries).await
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}
