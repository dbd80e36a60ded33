///! Feed payload normalization
///!
///! The three feeds return mutually incompatible shapes and partial or empty
///! responses are routine. Every function here is total: a payload of the
///! wrong shape yields an empty collection and a malformed element is dropped
///! on its own.

use chrono::{DateTime, NaiveDateTime, Utc};
use imagery_common::{Coordinate, FeedKind, NormalizedCapture, NormalizedOpportunity};
use serde::Deserialize;
use serde_json::Value;

/// A normalized feed result, tagged by collection kind
#[derive(Debug, Clone, PartialEq)]
pub enum FeedData {
    Captures(Vec<NormalizedCapture>),
    Opportunities(Vec<NormalizedOpportunity>),
}

impl FeedData {
    pub fn len(&self) -> usize {
        match self {
            FeedData::Captures(c) => c.len(),
            FeedData::Opportunities(o) => o.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `/search` element: `{captureId, captureDate, resolution, location: {lat, lon}}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecentCapture {
    capture_id: String,
    capture_date: String,
    resolution: String,
    location: RawLocation,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: f64,
    lon: f64,
}

/// `/archive` feature: `{geometry: {coordinates: [lon, lat]}, properties: {...}}`
#[derive(Debug, Deserialize)]
struct RawArchiveFeature {
    geometry: RawGeometry,
    properties: RawArchiveProperties,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: Option<String>,
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArchiveProperties {
    capture_id: String,
    capture_date: String,
    resolution: String,
}

/// `/opportunities` element
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOpportunity {
    opportunity_id: String,
    estimated_capture_date: String,
    confidence: String,
}

/// RFC 3339, or an offset-less ISO-8601 timestamp read as UTC
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

fn non_empty(id: String) -> Option<String> {
    if id.trim().is_empty() { None } else { Some(id) }
}

fn log_dropped(feed: FeedKind, total: usize, kept: usize) {
    if kept < total {
        tracing::debug!("Dropped {} malformed {} element(s) of {}", total - kept, feed, total);
    }
}

fn recent_capture(item: &Value) -> Option<NormalizedCapture> {
    let raw = RawRecentCapture::deserialize(item).ok()?;
    Some(NormalizedCapture {
        id: non_empty(raw.capture_id)?,
        captured_at: parse_timestamp(&raw.capture_date)?,
        resolution: raw.resolution,
        coordinate: Coordinate::new(raw.location.lat, raw.location.lon).ok()?,
    })
}

fn archive_capture(feature: &Value) -> Option<NormalizedCapture> {
    let raw = RawArchiveFeature::deserialize(feature).ok()?;
    if raw.geometry.kind.as_deref().is_some_and(|kind| kind != "Point") {
        return None;
    }
    // GeoJSON positions are [lon, lat, (alt)]
    let (lon, lat) = match raw.geometry.coordinates.as_slice() {
        [lon, lat, ..] => (*lon, *lat),
        _ => return None,
    };
    Some(NormalizedCapture {
        id: non_empty(raw.properties.capture_id)?,
        captured_at: parse_timestamp(&raw.properties.capture_date)?,
        resolution: raw.properties.resolution,
        coordinate: Coordinate::from_geojson_position(lon, lat).ok()?,
    })
}

fn opportunity(item: &Value) -> Option<NormalizedOpportunity> {
    let raw = RawOpportunity::deserialize(item).ok()?;
    Some(NormalizedOpportunity {
        id: non_empty(raw.opportunity_id)?,
        estimated_capture_at: parse_timestamp(&raw.estimated_capture_date)?,
        confidence: raw.confidence.into(),
    })
}

/// Flat list of captures from `/search`
pub fn normalize_recent(raw: &Value) -> Vec<NormalizedCapture> {
    let Some(items) = raw.as_array() else {
        tracing::debug!("recent payload is not a list, treating as empty");
        return Vec::new();
    };
    let captures: Vec<_> = items.iter().filter_map(recent_capture).collect();
    log_dropped(FeedKind::Recent, items.len(), captures.len());
    captures
}

/// GeoJSON-like feature collection from `/archive`
pub fn normalize_archive(raw: &Value) -> Vec<NormalizedCapture> {
    let Some(features) = raw.get("features").and_then(Value::as_array) else {
        tracing::debug!("archive payload has no feature list, treating as empty");
        return Vec::new();
    };
    let captures: Vec<_> = features.iter().filter_map(archive_capture).collect();
    log_dropped(FeedKind::Archive, features.len(), captures.len());
    captures
}

/// Flat list of forecast windows from `/opportunities`
pub fn normalize_opportunities(raw: &Value) -> Vec<NormalizedOpportunity> {
    let Some(items) = raw.as_array() else {
        tracing::debug!("opportunities payload is not a list, treating as empty");
        return Vec::new();
    };
    let opportunities: Vec<_> = items.iter().filter_map(opportunity).collect();
    log_dropped(FeedKind::Opportunities, items.len(), opportunities.len());
    opportunities
}

/// Dispatch on the feed the payload came from
pub fn normalize(feed: FeedKind, raw: &Value) -> FeedData {
    match feed {
        FeedKind::Recent => FeedData::Captures(normalize_recent(raw)),
        FeedKind::Archive => FeedData::Captures(normalize_archive(raw)),
        FeedKind::Opportunities => FeedData::Opportunities(normalize_opportunities(raw)),
    }
}
