// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Retrieval of section pages from the legislature website.

use crate::config::UpstreamConfig;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Fetch error types.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Something that can return the body of a page.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP client for the legislature website.
pub struct HttpDocumentSource {
    client: reqwest::Client,
}

impl HttpDocumentSource {
    /// Build a client with the configured user agent and timeout.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "Fetched section page");

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
