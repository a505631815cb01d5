//! Retrieval of status list credentials published by other issuers.

use crate::server::error::UpstreamError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

const SERVICE: &str = "status list host";

/// Media type of a StatusList2021 credential.
pub const VC_LD_JSON: &str = "application/vc+ld+json";

#[async_trait]
pub trait ListFetcher: Send + Sync + 'static {
    /// Downloads the credential published at `status_url` and returns its
    /// raw bytes.
    async fn fetch_credential(&self, status_url: &reqwest::Url) -> Result<Vec<u8>, UpstreamError>;
}

/// Fetches over HTTP, refusing bodies longer than `max_body_bytes`.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub const fn new(client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }
}

#[async_trait]
impl ListFetcher for HttpFetcher {
    async fn fetch_credential(&self, status_url: &reqwest::Url) -> Result<Vec<u8>, UpstreamError> {
        // Publishers negotiate on either header.
        let mut response = self
            .client
            .get(status_url.clone())
            .header(ACCEPT, VC_LD_JSON)
            .header(CONTENT_TYPE, VC_LD_JSON)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(url = %status_url, %status, "status list fetch failed");
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let limit = self.max_body_bytes;
        let too_large = || UpstreamError::TooLarge {
            service: SERVICE,
            limit,
        };
        if response
            .content_length()
            .is_some_and(|len| len > limit as u64)
        {
            tracing::warn!(url = %status_url, limit, "status list credential too large");
            return Err(too_large());
        }

        // Content-Length may be absent or wrong; count what actually arrives.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|source| UpstreamError::Transport {
            service: SERVICE,
            source,
        })? {
            if body.len() + chunk.len() > limit {
                tracing::warn!(url = %status_url, limit, "status list credential too large");
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
