use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{FetchedPage, PageSource};
use crate::error::FetchError;

/// Plain HTTP GET. Only useful where the directory serves its content
/// without client-side rendering.
pub struct HttpSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    waited_ms: self.timeout.as_millis() as u64,
                }
            } else {
                FetchError::unreachable(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::unreachable(url, e))?;

        Ok(FetchedPage { url: final_url, html })
    }
}
