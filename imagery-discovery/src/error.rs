use imagery_common::{FeedKind, InvalidCoordinate};

pub type Result<T> = std::result::Result<T, DiscoveryError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Transport failure, timeout, non-2xx status or undecodable body
    #[error("{operation} request failed: {source}")]
    Network {
        operation: String,
        #[source]
        source: BoxError,
    },

    /// Geocoding produced zero results
    #[error("location not found: {query}")]
    NotFound { query: String },

    #[error(transparent)]
    InvalidCoordinate(#[from] InvalidCoordinate),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DiscoveryError {
    pub fn network(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DiscoveryError::Network {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn feed(feed: FeedKind, source: impl Into<BoxError>) -> Self {
        Self::network(format!("{} feed", feed), source)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DiscoveryError::NotFound { .. })
    }
}
