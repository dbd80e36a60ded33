use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated WGS84 point, `lat` in [-90, 90] and `lon` in [-180, 180]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CoordinateRepr")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct CoordinateRepr {
    lat: f64,
    lon: f64,
}

impl TryFrom<CoordinateRepr> for Coordinate {
    type Error = InvalidCoordinate;

    fn try_from(repr: CoordinateRepr) -> Result<Self, Self::Error> {
        Coordinate::new(repr.lat, repr.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("coordinate out of range: lat={lat}, lon={lon}")]
pub struct InvalidCoordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidCoordinate> {
        // NaN fails both range checks
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
            Ok(Self { lat, lon })
        } else {
            Err(InvalidCoordinate { lat, lon })
        }
    }

    /// Build from a GeoJSON position, which is ordered `[lon, lat]`
    pub fn from_geojson_position(lon: f64, lat: f64) -> Result<Self, InvalidCoordinate> {
        Self::new(lat, lon)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Bit-exact identity, usable as a hash key
    pub fn key(&self) -> (u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits())
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.lat, self.lon)
    }
}

/// One satellite image record, whichever feed it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCapture {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    pub resolution: String,
    pub coordinate: Coordinate,
}

/// Forecast capture window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOpportunity {
    pub id: String,
    pub estimated_capture_at: DateTime<Utc>,
    pub confidence: Confidence,
}

/// Confidence label of an opportunity. Labels outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Other(String),
}

impl Confidence {
    pub fn as_str(&self) -> &str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
            Confidence::Other(label) => label,
        }
    }
}

impl From<&str> for Confidence {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Other(s.to_string()),
        }
    }
}

impl From<String> for Confidence {
    fn from(s: String) -> Self {
        Confidence::from(s.as_str())
    }
}

impl From<Confidence> for String {
    fn from(c: Confidence) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which collections the result screen fetches and shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResultMode {
    #[serde(rename = "recent")]
    #[default]
    Recent,
    #[serde(rename = "timeline")]
    Timeline,
}

impl ResultMode {
    pub fn from_show_timeline(show_timeline: bool) -> Self {
        if show_timeline {
            ResultMode::Timeline
        } else {
            ResultMode::Recent
        }
    }

    /// Feeds queried when this mode becomes active
    pub fn feeds(&self) -> &'static [FeedKind] {
        match self {
            ResultMode::Recent => &[FeedKind::Recent],
            ResultMode::Timeline => &[FeedKind::Archive, FeedKind::Opportunities],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultMode::Recent => "recent",
            ResultMode::Timeline => "timeline",
        }
    }
}

impl std::fmt::Display for ResultMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResultMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recent" => Ok(ResultMode::Recent),
            "timeline" => Ok(ResultMode::Timeline),
            _ => Err(format!("Unknown result mode: {}", s)),
        }
    }
}

/// The three upstream feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedKind {
    Recent,
    Archive,
    Opportunities,
}

impl FeedKind {
    /// Upstream path segment
    pub fn path(&self) -> &'static str {
        match self {
            FeedKind::Recent => "search",
            FeedKind::Archive => "archive",
            FeedKind::Opportunities => "opportunities",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Recent => "recent",
            FeedKind::Archive => "archive",
            FeedKind::Opportunities => "opportunities",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
