///! HTTP client for the imagery service feeds
use std::time::Duration;

use async_trait::async_trait;
use imagery_common::{Coordinate, FeedKind};
use reqwest::Url;
use serde_json::Value;

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};

/// Source of raw, loosely-typed feed payloads for a coordinate.
///
/// Each lookup is a single request/response: no retries, no caching.
#[async_trait]
pub trait ImagerySource: Send + Sync {
    async fn fetch_recent(&self, coord: Coordinate) -> Result<Value>;

    async fn fetch_archive(&self, coord: Coordinate) -> Result<Value>;

    async fn fetch_opportunities(&self, coord: Coordinate) -> Result<Value>;

    async fn fetch(&self, feed: FeedKind, coord: Coordinate) -> Result<Value> {
        match feed {
            FeedKind::Recent => self.fetch_recent(coord).await,
            FeedKind::Archive => self.fetch_archive(coord).await,
            FeedKind::Opportunities => self.fetch_opportunities(coord).await,
        }
    }
}

/// reqwest-backed [`ImagerySource`]
#[derive(Clone)]
pub struct ImageryClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ImageryClient {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        // Url::join replaces the last path segment unless the base ends with '/'
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&base)
            .map_err(|e| DiscoveryError::Config(format!("api_base_url '{}': {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DiscoveryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout(), &config.user_agent)
    }

    fn feed_url(&self, feed: FeedKind, coord: Coordinate) -> Result<Url> {
        let mut url = self
            .base_url
            .join(feed.path())
            .map_err(|e| DiscoveryError::Config(format!("Invalid {} feed URL: {}", feed, e)))?;
        url.query_pairs_mut()
            .append_pair("lat", &coord.lat().to_string())
            .append_pair("lon", &coord.lon().to_string());
        Ok(url)
    }

    async fn get_feed(&self, feed: FeedKind, coord: Coordinate) -> Result<Value> {
        let url = self.feed_url(feed, coord)?;
        tracing::debug!("Fetching {} feed: {}", feed, url);

        match self.request_json(url).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                tracing::error!("Error fetching {} feed at ({}): {}", feed, coord, e);
                Err(DiscoveryError::feed(feed, e))
            }
        }
    }

    async fn request_json(&self, url: Url) -> std::result::Result<Value, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
}

#[async_trait]
impl ImagerySource for ImageryClient {
    async fn fetch_recent(&self, coord: Coordinate) -> Result<Value> {
        self.get_feed(FeedKind::Recent, coord).await
    }

    async fn fetch_archive(&self, coord: Coordinate) -> Result<Value> {
        self.get_feed(FeedKind::Archive, coord).await
    }

    async fn fetch_opportunities(&self, coord: Coordinate) -> Result<Value> {
        self.get_feed(FeedKind::Opportunities, coord).await
    }
}
