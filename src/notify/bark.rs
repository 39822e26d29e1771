// src/notify/bark.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{post_json_with_retry, AlertSink};
use crate::error::AlertDeliveryError;

pub const DEFAULT_BARK_SERVER: &str = "https://api.day.app";

/// iOS push through a Bark server (`POST {server}/push`).
#[derive(Clone)]
pub struct BarkNotifier {
    server: String,
    device_key: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
struct BarkPush<'a> {
    device_key: &'a str,
    title: &'a str,
    body: &'a str,
}

impl BarkNotifier {
    pub fn new(device_key: String) -> Self {
        Self {
            server: DEFAULT_BARK_SERVER.to_string(),
            device_key,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn push_url(&self) -> String {
        format!("{}/push", self.server)
    }
}

#[async_trait]
impl AlertSink for BarkNotifier {
    async fn notify(&self, title: &str, content: &str) -> Result<(), AlertDeliveryError> {
        if self.device_key.trim().is_empty() {
            return Err(AlertDeliveryError::Config("bark device key is empty".into()));
        }
        let push = BarkPush {
            device_key: &self.device_key,
            title,
            body: content,
        };
        post_json_with_retry(&self.client, &self.push_url(), &push, self.timeout, self.max_retries).await
    }

    fn channel_name(&self) -> &str {
        "bark"
    }
}
