use imagery_common::{Coordinate, FeedKind, NormalizedCapture, NormalizedOpportunity, ResultMode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::normalizer::FeedData;

/// Load state of one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FeedStatus {
    /// Not requested in this session yet
    #[default]
    Idle,
    Loading,
    Ready,
    /// Last fetch failed; the collection is empty
    Failed,
}

/// What the search screen hands to the result screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationHandoff {
    /// Already normalized captures of the feed matching `show_timeline`
    pub captures: Vec<NormalizedCapture>,
    /// The selected point; every query of the session uses it
    pub coordinate: Coordinate,
    pub show_timeline: bool,
}

/// Result screen state, written only by the discovery workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    /// Generation of the current fetch cycle
    pub epoch: u64,
    pub mode: ResultMode,
    pub origin: Coordinate,
    pub recent_captures: Vec<NormalizedCapture>,
    pub archive_captures: Vec<NormalizedCapture>,
    pub future_opportunities: Vec<NormalizedOpportunity>,
    pub recent_status: FeedStatus,
    pub archive_status: FeedStatus,
    pub opportunities_status: FeedStatus,
}

impl SessionState {
    pub fn from_handoff(handoff: NavigationHandoff) -> Self {
        let mode = ResultMode::from_show_timeline(handoff.show_timeline);
        let mut state = Self {
            session_id: Uuid::now_v7(),
            epoch: 0,
            mode,
            origin: handoff.coordinate,
            recent_captures: Vec::new(),
            archive_captures: Vec::new(),
            future_opportunities: Vec::new(),
            recent_status: FeedStatus::Idle,
            archive_status: FeedStatus::Idle,
            opportunities_status: FeedStatus::Idle,
        };

        if !handoff.captures.is_empty() {
            match mode {
                ResultMode::Recent => {
                    state.recent_captures = handoff.captures;
                    state.recent_status = FeedStatus::Ready;
                }
                ResultMode::Timeline => {
                    state.archive_captures = handoff.captures;
                    state.archive_status = FeedStatus::Ready;
                }
            }
        }

        state
    }

    pub fn status(&self, feed: FeedKind) -> FeedStatus {
        match feed {
            FeedKind::Recent => self.recent_status,
            FeedKind::Archive => self.archive_status,
            FeedKind::Opportunities => self.opportunities_status,
        }
    }

    fn status_mut(&mut self, feed: FeedKind) -> &mut FeedStatus {
        match feed {
            FeedKind::Recent => &mut self.recent_status,
            FeedKind::Archive => &mut self.archive_status,
            FeedKind::Opportunities => &mut self.opportunities_status,
        }
    }

    /// True while any collection of the active mode awaits its fetch
    pub fn is_loading(&self) -> bool {
        self.mode
            .feeds()
            .iter()
            .any(|feed| self.status(*feed) == FeedStatus::Loading)
    }

    /// Start a new generation for `mode`; results of older generations are refused from now on
    pub(crate) fn begin_cycle(&mut self, mode: ResultMode) -> u64 {
        self.epoch += 1;
        self.mode = mode;
        for feed in [FeedKind::Recent, FeedKind::Archive, FeedKind::Opportunities] {
            let status = self.status_mut(feed);
            if mode.feeds().contains(&feed) {
                *status = FeedStatus::Loading;
            } else if *status == FeedStatus::Loading {
                // the cycle that set it is now stale and will never commit
                *status = FeedStatus::Idle;
            }
        }
        self.epoch
    }

    /// Commit one feed's outcome. `None` means the fetch failed.
    ///
    /// Returns false, leaving the state untouched, when `epoch` is stale.
    pub(crate) fn commit(&mut self, epoch: u64, feed: FeedKind, outcome: Option<FeedData>) -> bool {
        if epoch != self.epoch {
            return false;
        }

        let status = match (feed, outcome) {
            (FeedKind::Recent, Some(FeedData::Captures(captures))) => {
                self.recent_captures = captures;
                FeedStatus::Ready
            }
            (FeedKind::Archive, Some(FeedData::Captures(captures))) => {
                self.archive_captures = captures;
                FeedStatus::Ready
            }
            (FeedKind::Opportunities, Some(FeedData::Opportunities(opportunities))) => {
                self.future_opportunities = opportunities;
                FeedStatus::Ready
            }
            (feed, Some(_)) => {
                tracing::warn!("Refusing {} result of the wrong collection kind", feed);
                return false;
            }
            (feed, None) => {
                self.clear(feed);
                FeedStatus::Failed
            }
        };
        *self.status_mut(feed) = status;
        true
    }

    fn clear(&mut self, feed: FeedKind) {
        match feed {
            FeedKind::Recent => self.recent_captures.clear(),
            FeedKind::Archive => self.archive_captures.clear(),
            FeedKind::Opportunities => self.future_opportunities.clear(),
        }
    }
}
