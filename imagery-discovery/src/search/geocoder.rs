///! Forward and reverse geocoding over the Nominatim HTTP API
use std::time::Duration;

use async_trait::async_trait;
use imagery_common::Coordinate;
use reqwest::Url;
use serde::Deserialize;

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};

/// Label used when reverse geocoding fails
pub const UNKNOWN_LOCATION: &str = "Unknown location";

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// First match for `query`; zero matches is [`DiscoveryError::NotFound`]
    async fn forward(&self, query: &str) -> Result<Coordinate>;

    /// Display name for `coord`
    async fn reverse(&self, coord: Coordinate) -> Result<String>;
}

/// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    display_name: Option<String>,
}

#[derive(Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: Url,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&base).map_err(|e| {
            DiscoveryError::Config(format!("geocoder_base_url '{}': {}", base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DiscoveryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        Self::new(&config.geocoder_base_url, config.request_timeout(), &config.user_agent)
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| DiscoveryError::Config(format!("Invalid geocoder URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("format", "json");
        }
        Ok(url)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
    ) -> std::result::Result<T, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn forward(&self, query: &str) -> Result<Coordinate> {
        let url = self.endpoint("search", &[("q", query.to_string())])?;

        let hits: Vec<SearchHit> = self.get(url).await.map_err(|e| {
            tracing::error!("Error fetching location for '{}': {}", query, e);
            DiscoveryError::network("forward geocoding", e)
        })?;

        let Some(first) = hits.into_iter().next() else {
            return Err(DiscoveryError::NotFound {
                query: query.to_string(),
            });
        };

        let lat: f64 = first
            .lat
            .trim()
            .parse()
            .map_err(|e| DiscoveryError::network("forward geocoding", e))?;
        let lon: f64 = first
            .lon
            .trim()
            .parse()
            .map_err(|e| DiscoveryError::network("forward geocoding", e))?;
        Ok(Coordinate::new(lat, lon)?)
    }

    async fn reverse(&self, coord: Coordinate) -> Result<String> {
        let url = self.endpoint(
            "reverse",
            &[("lat", coord.lat().to_string()), ("lon", coord.lon().to_string())],
        )?;

        let hit: ReverseHit = self.get(url).await.map_err(|e| {
            tracing::error!("Error fetching location information for ({}): {}", coord, e);
            DiscoveryError::network("reverse geocoding", e)
        })?;

        hit.display_name.ok_or_else(|| DiscoveryError::NotFound {
            query: coord.to_string(),
        })
    }
}
