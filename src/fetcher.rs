//! Page Fetcher - Retrieve, Fingerprint, Snapshot
//!
//! Snapshot keys are content-addressed, so refetching an unchanged page
//! rewrites the same key with the same bytes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::hashing::content_hash;
use crate::ruleset::FetchedPage;
use crate::storage::{BlobStore, PutOptions, StorageError};

pub const SNAPSHOT_CONTENT_TYPE: &str = "text/html";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Snapshot write failed: {0}")]
    Snapshot(#[from] StorageError),
}

/// Text retrieval capability.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpTextFetcher {
    client: reqwest::Client,
}

impl HttpTextFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TextFetcher for HttpTextFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }
}

/// `snapshots/<region-lowercased>/<hash>.html`
pub fn snapshot_key(region: &str, content_hash: &str) -> String {
    format!("snapshots/{}/{}.html", region.to_lowercase(), content_hash)
}

pub struct PageFetcher {
    source: Arc<dyn TextFetcher>,
    snapshots: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl PageFetcher {
    pub fn new(source: Arc<dyn TextFetcher>, snapshots: Arc<dyn BlobStore>) -> Self {
        Self {
            source,
            snapshots,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetch `url`, store its snapshot and return the page record.
    pub async fn fetch_page(&self, url: &str, region: &str) -> Result<FetchedPage, FetchError> {
        let content = self.source.fetch(url).await?;
        let content_hash = content_hash(&content);
        let snapshot_key = snapshot_key(region, &content_hash);
        debug!(url, bytes = content.len(), hash = %content_hash, "fetched page");

        let options = PutOptions::content_type(SNAPSHOT_CONTENT_TYPE)
            .with_metadata("url", url)
            .with_metadata("region", region);
        self.snapshots.put(&snapshot_key, &content, options).await?;
        info!(url, snapshot_key = %snapshot_key, "stored snapshot");

        Ok(FetchedPage {
            url: url.to_string(),
            content,
            content_hash,
            snapshot_key,
            fetched_at: self.clock.now(),
        })
    }
}
