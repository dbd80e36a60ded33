use std::collections::HashMap;

use imagery_common::{Coordinate, FeedKind};
use tracing::debug;

use super::normalizer::FeedData;

/// In-memory memo of normalized feed results, keyed by feed and coordinate.
///
/// Lives for one result session; nothing is written to disk.
#[derive(Debug, Default)]
pub struct CaptureCache {
    entries: HashMap<(FeedKind, (u64, u64)), FeedData>,
}

impl CaptureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feed: FeedKind, coord: Coordinate) -> Option<FeedData> {
        let hit = self.entries.get(&(feed, coord.key())).cloned();
        if hit.is_some() {
            debug!("Cache hit for {} feed at ({})", feed, coord);
        }
        hit
    }

    /// Only store successfully normalized results; failures are always refetched
    pub fn insert(&mut self, feed: FeedKind, coord: Coordinate, data: FeedData) {
        debug!("Caching {} {} item(s) at ({})", data.len(), feed, coord);
        self.entries.insert((feed, coord.key()), data);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
