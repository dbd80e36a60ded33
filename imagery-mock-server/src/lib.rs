///! Stand-in for the imagery service
///!
///! Serves fixed fixture captures over the same three endpoints and payload
///! shapes as the real service, for local runs and client tests.

pub mod config;

use axum::{
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// (captureId, lat, lon, captureDate, resolution)
const CAPTURES: &[(&str, f64, f64, &str, &str)] = &[
    // Buenos Aires
    ("CAP12346", -34.6037, -58.3816, "2023-11-01T10:15:30Z", "5m"),
    ("CAP12347", -34.6094, -58.3838, "2023-11-02T12:30:00Z", "10m"),
    // New York
    ("CAP12348", 40.7128, -74.0060, "2023-11-05T14:45:00Z", "20m"),
    ("CAP12349", 40.73061, -73.935242, "2023-11-07T09:00:00Z", "15m"),
];

/// (opportunityId, estimatedCaptureDate, confidence)
const OPPORTUNITIES: &[(&str, &str, &str)] = &[
    ("OP12346", "2023-12-01T08:00:00Z", "High"),
    ("OP12347", "2023-12-05T14:00:00Z", "Medium"),
    ("OP12348", "2023-12-10T12:00:00Z", "High"),
    ("OP12349", "2023-12-15T18:00:00Z", "Low"),
];

#[derive(Debug, Deserialize)]
pub struct PointQuery {
    pub lat: f64,
    pub lon: f64,
    /// Only used by `/search`
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

fn default_radius_km() -> f64 {
    50.0
}

#[derive(Debug, Serialize)]
pub struct CaptureLocation {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub capture_id: String,
    pub location: CaptureLocation,
    pub capture_date: String,
    pub resolution: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub capture_id: String,
    pub capture_date: String,
    pub resolution: String,
}

#[derive(Debug, Serialize)]
pub struct FeatureGeometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: FeatureGeometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub opportunity_id: String,
    pub estimated_capture_date: String,
    pub confidence: String,
}

/// Great-circle distance in kilometers
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

fn captures() -> impl Iterator<Item = Capture> {
    CAPTURES.iter().map(|&(id, lat, lon, date, resolution)| Capture {
        capture_id: id.to_string(),
        location: CaptureLocation { lat, lon },
        capture_date: date.to_string(),
        resolution: resolution.to_string(),
    })
}

/// Captures within `radius_km` of the point
async fn search_captures(Query(query): Query<PointQuery>) -> Json<Vec<Capture>> {
    let nearby: Vec<Capture> = captures()
        .filter(|c| {
            haversine_km(query.lat, query.lon, c.location.lat, c.location.lon) <= query.radius_km
        })
        .collect();
    tracing::debug!(
        "search ({}, {}) r={}km: {} capture(s)",
        query.lat,
        query.lon,
        query.radius_km,
        nearby.len()
    );
    Json(nearby)
}

/// Every archived capture as a GeoJSON feature collection
async fn query_archive(Query(_query): Query<PointQuery>) -> Json<FeatureCollection> {
    let features = captures()
        .map(|c| Feature {
            kind: "Feature",
            geometry: FeatureGeometry {
                kind: "Point",
                coordinates: [c.location.lon, c.location.lat],
            },
            properties: FeatureProperties {
                capture_id: c.capture_id,
                capture_date: c.capture_date,
                resolution: c.resolution,
            },
        })
        .collect();

    Json(FeatureCollection {
        kind: "FeatureCollection",
        features,
    })
}

async fn future_opportunities(Query(_query): Query<PointQuery>) -> Json<Vec<Opportunity>> {
    Json(
        OPPORTUNITIES
            .iter()
            .map(|&(id, date, confidence)| Opportunity {
                opportunity_id: id.to_string(),
                estimated_capture_date: date.to_string(),
                confidence: confidence.to_string(),
            })
            .collect(),
    )
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Routes only; the binary adds CORS and tracing layers
pub fn app() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search_captures))
        .route("/archive", get(query_archive))
        .route("/opportunities", get(future_opportunities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(uri: &str) -> (StatusCode, Option<Value>) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).ok())
    }

    #[test]
    fn test_haversine() {
        assert_eq!(haversine_km(10.0, 20.0, 10.0, 20.0), 0.0);
        // Buenos Aires to New York is roughly 8500 km
        let d = haversine_km(-34.6037, -58.3816, 40.7128, -74.0060);
        assert!((8400.0..8600.0).contains(&d), "got {d}");
    }

    #[tokio::test]
    async fn test_search_filters_by_radius() {
        let (status, body) = get_json("/search?lat=40.7128&lon=-74.006").await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = body
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["captureId"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["CAP12348", "CAP12349"]);

        let (_, body) = get_json("/search?lat=40.7128&lon=-74.006&radius_km=1").await;
        assert_eq!(body.unwrap().as_array().unwrap().len(), 1);

        let (_, body) = get_json("/search?lat=0&lon=0").await;
        assert!(body.unwrap().as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archive_is_lon_lat() {
        let (status, body) = get_json("/archive?lat=-34.6037&lon=-58.3816").await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["type"], "FeatureCollection");
        let first = &body["features"][0];
        assert_eq!(first["geometry"]["coordinates"][0], -58.3816);
        assert_eq!(first["geometry"]["coordinates"][1], -34.6037);
        assert_eq!(first["properties"]["captureId"], "CAP12346");
    }

    #[tokio::test]
    async fn test_opportunities() {
        let (_, body) = get_json("/opportunities?lat=1&lon=2").await;
        let body = body.unwrap();
        assert_eq!(body.as_array().unwrap().len(), 4);
        assert_eq!(body[0]["confidence"], "High");
        assert_eq!(body[3]["estimatedCaptureDate"], "2023-12-15T18:00:00Z");
    }

    #[tokio::test]
    async fn test_missing_coordinates_rejected() {
        let (status, _) = get_json("/archive").await;
        assert!(status.is_client_error());

        let (status, _) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}
