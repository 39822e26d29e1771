// src/fetch/transport.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::error::FetchError;

/// Raw HTTP exchange result.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One request, one response. Any error is a hard failure for the page.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, url: &str) -> Result<TransportResponse, FetchError>;
}

/// `reqwest`-backed transport; the timeout bounds every page request.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feed-harvester/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, method: Method, url: &str) -> Result<TransportResponse, FetchError> {
        let rsp = self.client.request(method, url).send().await?;
        let status = rsp.status().as_u16();
        let body = rsp.text().await?;
        Ok(TransportResponse { status, body })
    }
}
