use std::sync::Arc;

use imagery_common::{Coordinate, FeedKind};
use tracing::{error, info};

use super::geocoder::{Geocoder, UNKNOWN_LOCATION};
use crate::error::Result;
use crate::imagery::{normalize_archive, normalize_recent, ImagerySource, NavigationHandoff};

/// State of the map/search screen: the selected point and its label
pub struct SearchSession {
    imagery: Arc<dyn ImagerySource>,
    geocoder: Arc<dyn Geocoder>,
    position: Coordinate,
    location_label: Option<String>,
}

impl SearchSession {
    pub fn new(
        imagery: Arc<dyn ImagerySource>,
        geocoder: Arc<dyn Geocoder>,
        initial: Coordinate,
    ) -> Self {
        Self {
            imagery,
            geocoder,
            position: initial,
            location_label: None,
        }
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    /// Reverse-geocoded name of the position, once resolved
    pub fn location_label(&self) -> Option<&str> {
        self.location_label.as_deref()
    }

    /// Move to `coord` and resolve its label. A failed lookup labels it
    /// [`UNKNOWN_LOCATION`] instead of failing.
    pub async fn select_location(&mut self, coord: Coordinate) {
        self.position = coord;
        self.location_label = None;

        let label = match self.geocoder.reverse(coord).await {
            Ok(name) => name,
            Err(e) => {
                error!("Error fetching location information: {}", e);
                UNKNOWN_LOCATION.to_string()
            }
        };
        info!("Selected ({}): {}", coord, label);
        self.location_label = Some(label);
    }

    /// Geocode `query` and move there. Blank queries are ignored (`Ok(None)`).
    ///
    /// When nothing matches, [`crate::DiscoveryError::NotFound`] is returned and
    /// the position stays where it was.
    pub async fn search(&mut self, query: &str) -> Result<Option<Coordinate>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let coord = self.geocoder.forward(query).await?;
        self.select_location(coord).await;
        Ok(Some(coord))
    }

    /// Fetch recent captures at the position and hand off into Recent mode
    pub async fn show_captures(&self) -> Result<NavigationHandoff> {
        let raw = self.imagery.fetch(FeedKind::Recent, self.position).await?;
        Ok(NavigationHandoff {
            captures: normalize_recent(&raw),
            coordinate: self.position,
            show_timeline: false,
        })
    }

    /// Fetch archive captures at the position and hand off into Timeline mode
    pub async fn show_timeline(&self) -> Result<NavigationHandoff> {
        let raw = self.imagery.fetch(FeedKind::Archive, self.position).await?;
        Ok(NavigationHandoff {
            captures: normalize_archive(&raw),
            coordinate: self.position,
            show_timeline: true,
        })
    }
}
