///! Text presentation of a result session
///!
///! Built only from normalized collections; nothing here knows which feed
///! shape a capture came from.

use std::fmt;

use chrono::{DateTime, Utc};
use imagery_common::{Coordinate, FeedKind, NormalizedCapture, NormalizedOpportunity, ResultMode};

use crate::imagery::{FeedStatus, SessionState};

const STATIC_MAP_URL: &str = "https://static-maps.yandex.ru/1.x/";
const NO_RECENT: &str = "No recent captures available.";
const NO_ARCHIVE: &str = "No archive captures available.";

/// `M/D/YYYY`, e.g. `11/1/2023`
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%-m/%-d/%Y").to_string()
}

/// Satellite snapshot URL centered on `coord`; the provider expects `lon,lat`
pub fn static_map_url(coord: Coordinate) -> String {
    format!(
        "{}?ll={},{}&z=16&l=sat&size=650,450",
        STATIC_MAP_URL,
        coord.lon(),
        coord.lat()
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureItem {
    pub id: String,
    pub date: String,
    pub resolution: String,
    pub image_url: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityItem {
    pub id: String,
    pub estimated_date: String,
    pub confidence: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub mode: ResultMode,
    pub heading: &'static str,
    pub origin: Coordinate,
    pub captures: Vec<CaptureItem>,
    pub captures_loading: bool,
    pub opportunities: Vec<OpportunityItem>,
    pub opportunities_loading: bool,
}

impl ResultView {
    pub fn from_state(state: &SessionState) -> Self {
        let (heading, captures, captures_feed) = match state.mode {
            ResultMode::Recent => ("Recent Imagery", &state.recent_captures, FeedKind::Recent),
            ResultMode::Timeline => ("Timeline View", &state.archive_captures, FeedKind::Archive),
        };

        let captures = captures
            .iter()
            .map(|c| capture_item(c, state.mode))
            .collect();

        let (opportunities, opportunities_loading) = match state.mode {
            ResultMode::Recent => (Vec::new(), false),
            ResultMode::Timeline => (
                state.future_opportunities.iter().map(opportunity_item).collect(),
                state.status(FeedKind::Opportunities) == FeedStatus::Loading,
            ),
        };

        Self {
            mode: state.mode,
            heading,
            origin: state.origin,
            captures,
            captures_loading: state.status(captures_feed) == FeedStatus::Loading,
            opportunities,
            opportunities_loading,
        }
    }

    /// Notice shown in place of an empty capture list
    pub fn captures_notice(&self) -> Option<&'static str> {
        if !self.captures.is_empty() || self.captures_loading {
            return None;
        }
        Some(match self.mode {
            ResultMode::Recent => NO_RECENT,
            ResultMode::Timeline => NO_ARCHIVE,
        })
    }
}

fn capture_item(capture: &NormalizedCapture, mode: ResultMode) -> CaptureItem {
    let date = format_date(&capture.captured_at);
    let alt = match mode {
        ResultMode::Recent => format!("Satellite view of {}", capture.id),
        ResultMode::Timeline => format!("Archive capture on {}", date),
    };
    CaptureItem {
        id: capture.id.clone(),
        image_url: static_map_url(capture.coordinate),
        resolution: capture.resolution.clone(),
        date,
        alt,
    }
}

fn opportunity_item(opportunity: &NormalizedOpportunity) -> OpportunityItem {
    OpportunityItem {
        id: opportunity.id.clone(),
        estimated_date: format_date(&opportunity.estimated_capture_at),
        confidence: opportunity.confidence.to_string(),
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ({}) ==", self.heading, self.origin)?;

        if self.captures_loading {
            writeln!(f, "Loading captures...")?;
        }
        if let Some(notice) = self.captures_notice() {
            writeln!(f, "{}", notice)?;
        }
        for item in &self.captures {
            writeln!(f, "- {} | Date: {} | Resolution: {}", item.id, item.date, item.resolution)?;
            writeln!(f, "  {}", item.image_url)?;
        }

        if self.mode == ResultMode::Timeline {
            if self.opportunities_loading {
                writeln!(f, "Loading future opportunities...")?;
            }
            if !self.opportunities.is_empty() {
                writeln!(f, "Future Opportunities")?;
                for item in &self.opportunities {
                    writeln!(
                        f,
                        "- {} | Estimated Date: {} | Confidence: {}",
                        item.id, item.estimated_date, item.confidence
                    )?;
                }
            }
        }
        Ok(())
    }
}
