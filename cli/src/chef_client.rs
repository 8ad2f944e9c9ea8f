use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use pantry_chef_core::chef::{ChefTransport, HttpReply};
use pantry_chef_core::error::TransportError;

use crate::config::{AI_TIMEOUT, CONNECT_TIMEOUT};

/// POSTs `{action, payload}` envelopes to the AI backend's single endpoint.
pub struct HttpChefTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpChefTransport {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "pantry-chef/{} (pantry recipes)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(AI_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ChefTransport for HttpChefTransport {
    async fn post(&self, body: &Value) -> Result<HttpReply, TransportError> {
        let resp = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}
