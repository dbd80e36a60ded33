use std::sync::{Arc, Mutex};

use imagery_common::{Coordinate, FeedKind, ResultMode};
use tokio::sync::RwLock;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::api_client::ImagerySource;
use super::cache::CaptureCache;
use super::normalizer::{self, FeedData};
use super::session::{NavigationHandoff, SessionState};
use crate::config::DiscoveryConfig;
use crate::view::ResultView;

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowOptions {
    /// Memoize feed results per (feed, coordinate) for the session's lifetime
    pub cache_enabled: bool,
}

impl WorkflowOptions {
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            cache_enabled: config.cache_enabled,
        }
    }
}

/// How one feed of a cycle ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedResolution {
    Committed,
    Failed,
    Stale,
}

/// Outcome of one fetch-and-normalize cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub epoch: u64,
    pub mode: ResultMode,
    /// Feeds whose normalized data landed in the session
    pub committed: Vec<FeedKind>,
    /// Feeds that failed; their collection was emptied
    pub failed: Vec<FeedKind>,
    /// Feeds whose result arrived after a newer cycle started and was discarded
    pub stale: Vec<FeedKind>,
    /// The task was cancelled before finishing
    pub aborted: bool,
}

impl CycleReport {
    fn new(epoch: u64, mode: ResultMode) -> Self {
        Self {
            epoch,
            mode,
            committed: Vec::new(),
            failed: Vec::new(),
            stale: Vec::new(),
            aborted: false,
        }
    }

    fn aborted(epoch: u64, mode: ResultMode) -> Self {
        Self {
            aborted: true,
            ..Self::new(epoch, mode)
        }
    }

    fn record(&mut self, feed: FeedKind, resolution: FeedResolution) {
        match resolution {
            FeedResolution::Committed => self.committed.push(feed),
            FeedResolution::Failed => self.failed.push(feed),
            FeedResolution::Stale => self.stale.push(feed),
        }
    }

    pub fn is_stale(&self) -> bool {
        !self.stale.is_empty()
    }
}

/// A running cycle. Dropping it does not cancel the cycle.
pub struct CycleHandle {
    epoch: u64,
    mode: ResultMode,
    handle: JoinHandle<CycleReport>,
}

impl CycleHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn mode(&self) -> ResultMode {
        self.mode
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> CycleReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!("{} cycle (epoch {}) did not complete: {}", self.mode, self.epoch, e);
                CycleReport::aborted(self.epoch, self.mode)
            }
        }
    }
}

/// Result controller: owns the session state and drives the Recent/Timeline
/// state machine.
///
/// Every mode change starts a new epoch. Each feed commits on its own
/// completion, and only if its epoch is still current, so a late answer from
/// an abandoned cycle never lands in the state. Dropping the workflow cancels
/// in-flight cycles.
pub struct DiscoveryWorkflow {
    source: Arc<dyn ImagerySource>,
    state: Arc<RwLock<SessionState>>,
    cache: Option<Arc<RwLock<CaptureCache>>>,
    in_flight: Mutex<Vec<AbortHandle>>,
}

impl DiscoveryWorkflow {
    /// Create the session from the search screen's handoff and start the
    /// initial cycle for the seeded mode.
    pub async fn enter(
        source: Arc<dyn ImagerySource>,
        handoff: NavigationHandoff,
        options: WorkflowOptions,
    ) -> (Self, CycleHandle) {
        let state = SessionState::from_handoff(handoff);
        info!(
            "Result session {} opened at ({}) in {} mode",
            state.session_id, state.origin, state.mode
        );

        let workflow = Self {
            source,
            state: Arc::new(RwLock::new(state)),
            cache: options
                .cache_enabled
                .then(|| Arc::new(RwLock::new(CaptureCache::new()))),
            in_flight: Mutex::new(Vec::new()),
        };
        let initial = workflow.refresh().await;
        (workflow, initial)
    }

    /// Switch to `mode` and start its cycle. Selecting the active mode does nothing.
    pub async fn set_mode(&self, mode: ResultMode) -> Option<CycleHandle> {
        let (epoch, origin) = {
            let mut state = self.state.write().await;
            if state.mode == mode {
                debug!("Already in {} mode", mode);
                return None;
            }
            (state.begin_cycle(mode), state.origin)
        };
        info!("Switching to {} mode (epoch {})", mode, epoch);
        Some(self.spawn_cycle(epoch, mode, origin))
    }

    /// Re-run the active mode's cycle under a new epoch
    pub async fn refresh(&self) -> CycleHandle {
        let (epoch, mode, origin) = {
            let mut state = self.state.write().await;
            let mode = state.mode;
            (state.begin_cycle(mode), mode, state.origin)
        };
        debug!("Starting {} cycle (epoch {})", mode, epoch);
        self.spawn_cycle(epoch, mode, origin)
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn view(&self) -> ResultView {
        ResultView::from_state(&*self.state.read().await)
    }

    pub async fn mode(&self) -> ResultMode {
        self.state.read().await.mode
    }

    pub async fn origin(&self) -> Coordinate {
        self.state.read().await.origin
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().await.clear();
        }
    }

    fn spawn_cycle(&self, epoch: u64, mode: ResultMode, origin: Coordinate) -> CycleHandle {
        let source = self.source.clone();
        let state = self.state.clone();
        let cache = self.cache.clone();

        let handle = tokio::spawn(async move {
            run_cycle(source.as_ref(), &state, cache.as_deref(), epoch, mode, origin).await
        });

        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.retain(|h| !h.is_finished());
            in_flight.push(handle.abort_handle());
        }

        CycleHandle { epoch, mode, handle }
    }
}

impl Drop for DiscoveryWorkflow {
    fn drop(&mut self) {
        if let Ok(in_flight) = self.in_flight.get_mut() {
            for handle in in_flight.drain(..) {
                handle.abort();
            }
        }
    }
}

async fn run_cycle(
    source: &dyn ImagerySource,
    state: &RwLock<SessionState>,
    cache: Option<&RwLock<CaptureCache>>,
    epoch: u64,
    mode: ResultMode,
    origin: Coordinate,
) -> CycleReport {
    let mut report = CycleReport::new(epoch, mode);

    match mode {
        ResultMode::Recent => {
            let recent = run_feed(source, state, cache, epoch, FeedKind::Recent, origin).await;
            report.record(FeedKind::Recent, recent);
        }
        ResultMode::Timeline => {
            // unrelated feeds: both requests are in flight at once
            let (archive, opportunities) = tokio::join!(
                run_feed(source, state, cache, epoch, FeedKind::Archive, origin),
                run_feed(source, state, cache, epoch, FeedKind::Opportunities, origin),
            );
            report.record(FeedKind::Archive, archive);
            report.record(FeedKind::Opportunities, opportunities);
        }
    }

    debug!(
        "{} cycle (epoch {}) done: {} committed, {} failed, {} stale",
        mode,
        epoch,
        report.committed.len(),
        report.failed.len(),
        report.stale.len()
    );
    report
}

async fn run_feed(
    source: &dyn ImagerySource,
    state: &RwLock<SessionState>,
    cache: Option<&RwLock<CaptureCache>>,
    epoch: u64,
    feed: FeedKind,
    origin: Coordinate,
) -> FeedResolution {
    let cached = match cache {
        Some(cache) => cache.read().await.get(feed, origin),
        None => None,
    };

    let outcome: Option<FeedData> = match cached {
        Some(data) => Some(data),
        None => match source.fetch(feed, origin).await {
            Ok(raw) => {
                let data = normalizer::normalize(feed, &raw);
                if let Some(cache) = cache {
                    cache.write().await.insert(feed, origin, data.clone());
                }
                Some(data)
            }
            Err(e) => {
                warn!("{} feed unavailable, showing no data: {}", feed, e);
                None
            }
        },
    };

    let failed = outcome.is_none();
    let mut state = state.write().await;
    if !state.commit(epoch, feed, outcome) {
        debug!(
            "Discarded stale {} result (epoch {}, current {})",
            feed, epoch, state.epoch
        );
        return FeedResolution::Stale;
    }

    if failed {
        FeedResolution::Failed
    } else {
        FeedResolution::Committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiscoveryError, Result};
    use crate::imagery::session::FeedStatus;
    use async_trait::async_trait;
    use imagery_common::{NormalizedCapture, NormalizedOpportunity};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tokio::sync::{mpsc, oneshot};

    fn nyc() -> Coordinate {
        Coordinate::new(40.7128, -74.006).unwrap()
    }

    fn handoff(show_timeline: bool) -> NavigationHandoff {
        NavigationHandoff {
            captures: Vec::new(),
            coordinate: nyc(),
            show_timeline,
        }
    }

    fn recent_payload(id: &str) -> Value {
        json!([{"captureId": id, "location": {"lat": 40.7128, "lon": -74.006},
                "captureDate": "2023-11-01T10:15:30Z", "resolution": "5m"}])
    }

    fn archive_payload(id: &str) -> Value {
        json!({"type": "FeatureCollection", "features": [{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [-74.006, 40.7128]},
            "properties": {"captureId": id, "captureDate": "2023-11-05T14:45:00Z", "resolution": "20m"}
        }]})
    }

    fn opportunities_payload(id: &str) -> Value {
        json!([{"opportunityId": id, "estimatedCaptureDate": "2023-12-01T08:00:00Z", "confidence": "High"}])
    }

    /// Answers immediately; `None` means the feed fails
    struct ScriptedSource {
        responses: HashMap<FeedKind, Option<Value>>,
        calls: std::sync::Mutex<Vec<(FeedKind, Coordinate)>>,
    }

    impl ScriptedSource {
        fn new(responses: impl IntoIterator<Item = (FeedKind, Option<Value>)>) -> Arc<Self> {
            Arc::new(Self {
                responses: responses.into_iter().collect(),
                calls: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn calls(&self, feed: FeedKind) -> usize {
            self.calls.lock().unwrap().iter().filter(|(f, _)| *f == feed).count()
        }

        fn respond(&self, feed: FeedKind, coord: Coordinate) -> Result<Value> {
            self.calls.lock().unwrap().push((feed, coord));
            match self.responses.get(&feed) {
                Some(Some(payload)) => Ok(payload.clone()),
                _ => Err(DiscoveryError::feed(feed, "connection refused")),
            }
        }
    }

    #[async_trait]
    impl ImagerySource for ScriptedSource {
        async fn fetch_recent(&self, coord: Coordinate) -> Result<Value> {
            self.respond(FeedKind::Recent, coord)
        }

        async fn fetch_archive(&self, coord: Coordinate) -> Result<Value> {
            self.respond(FeedKind::Archive, coord)
        }

        async fn fetch_opportunities(&self, coord: Coordinate) -> Result<Value> {
            self.respond(FeedKind::Opportunities, coord)
        }
    }

    type Reply = oneshot::Sender<Result<Value>>;

    /// Hands every request to the test, which answers it whenever it likes
    struct GatedSource {
        requests: mpsc::UnboundedSender<(FeedKind, Reply)>,
    }

    impl GatedSource {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(FeedKind, Reply)>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Arc::new(Self { requests: tx }), rx)
        }

        async fn respond(&self, feed: FeedKind) -> Result<Value> {
            let (tx, rx) = oneshot::channel();
            self.requests
                .send((feed, tx))
                .map_err(|e| DiscoveryError::feed(feed, e.to_string()))?;
            rx.await.map_err(|e| DiscoveryError::feed(feed, e))?
        }
    }

    #[async_trait]
    impl ImagerySource for GatedSource {
        async fn fetch_recent(&self, _coord: Coordinate) -> Result<Value> {
            self.respond(FeedKind::Recent).await
        }

        async fn fetch_archive(&self, _coord: Coordinate) -> Result<Value> {
            self.respond(FeedKind::Archive).await
        }

        async fn fetch_opportunities(&self, _coord: Coordinate) -> Result<Value> {
            self.respond(FeedKind::Opportunities).await
        }
    }

    async fn next_requests(
        requests: &mut mpsc::UnboundedReceiver<(FeedKind, Reply)>,
        n: usize,
    ) -> HashMap<FeedKind, Reply> {
        let mut pending = HashMap::new();
        for _ in 0..n {
            let (feed, reply) = requests.recv().await.unwrap();
            pending.insert(feed, reply);
        }
        pending
    }

    fn capture_ids(captures: &[NormalizedCapture]) -> Vec<&str> {
        captures.iter().map(|c| c.id.as_str()).collect()
    }

    fn opportunity_ids(opportunities: &[NormalizedOpportunity]) -> Vec<&str> {
        opportunities.iter().map(|o| o.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_enter_recent_mode() {
        let source = ScriptedSource::new([(FeedKind::Recent, Some(recent_payload("CAP123")))]);
        let (workflow, initial) = DiscoveryWorkflow::enter(
            source.clone(),
            handoff(false),
            WorkflowOptions::default(),
        )
        .await;

        assert_eq!(initial.mode(), ResultMode::Recent);
        let report = initial.wait().await;
        assert_eq!(report.committed, vec![FeedKind::Recent]);

        let state = workflow.snapshot().await;
        assert_eq!(state.mode, ResultMode::Recent);
        assert_eq!(capture_ids(&state.recent_captures), vec!["CAP123"]);
        assert_eq!(state.recent_status, FeedStatus::Ready);
        assert!(state.archive_captures.is_empty());
        assert_eq!(source.calls(FeedKind::Archive), 0);
        assert_eq!(source.calls(FeedKind::Opportunities), 0);
    }

    #[tokio::test]
    async fn test_enter_timeline_mode_fetches_both_feeds() {
        let source = ScriptedSource::new([
            (FeedKind::Archive, Some(archive_payload("CAP12348"))),
            (FeedKind::Opportunities, Some(opportunities_payload("OP123"))),
        ]);
        let (workflow, initial) = DiscoveryWorkflow::enter(
            source.clone(),
            handoff(true),
            WorkflowOptions::default(),
        )
        .await;

        let report = initial.wait().await;
        assert_eq!(report.committed, vec![FeedKind::Archive, FeedKind::Opportunities]);
        assert_eq!(source.calls(FeedKind::Recent), 0);

        let state = workflow.snapshot().await;
        assert_eq!(state.mode, ResultMode::Timeline);
        assert_eq!(capture_ids(&state.archive_captures), vec!["CAP12348"]);
        assert_eq!(opportunity_ids(&state.future_opportunities), vec!["OP123"]);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_timeline_requests_are_concurrent() {
        let (source, mut requests) = GatedSource::new();
        let (_workflow, initial) =
            DiscoveryWorkflow::enter(source, handoff(true), WorkflowOptions::default()).await;

        // both requests are issued before either is answered
        let mut pending = next_requests(&mut requests, 2).await;
        assert!(pending.contains_key(&FeedKind::Archive));
        assert!(pending.contains_key(&FeedKind::Opportunities));

        pending.remove(&FeedKind::Opportunities).unwrap().send(Ok(json!([]))).unwrap();
        pending.remove(&FeedKind::Archive).unwrap().send(Ok(json!({"features": []}))).unwrap();
        assert_eq!(initial.wait().await.committed.len(), 2);
    }

    #[tokio::test]
    async fn test_opportunities_failure_keeps_archive() {
        let (source, mut requests) = GatedSource::new();
        let (workflow, initial) =
            DiscoveryWorkflow::enter(source, handoff(true), WorkflowOptions::default()).await;
        let mut pending = next_requests(&mut requests, 2).await;

        pending
            .remove(&FeedKind::Archive)
            .unwrap()
            .send(Ok(archive_payload("CAP12346")))
            .unwrap();
        // archive is visible while opportunities is still loading
        tokio::task::yield_now().await;
        while workflow.snapshot().await.archive_status != FeedStatus::Ready {
            tokio::task::yield_now().await;
        }
        let state = workflow.snapshot().await;
        assert_eq!(state.opportunities_status, FeedStatus::Loading);
        assert!(state.is_loading());

        pending
            .remove(&FeedKind::Opportunities)
            .unwrap()
            .send(Err(DiscoveryError::feed(FeedKind::Opportunities, "timed out")))
            .unwrap();
        let report = initial.wait().await;
        assert_eq!(report.committed, vec![FeedKind::Archive]);
        assert_eq!(report.failed, vec![FeedKind::Opportunities]);

        let state = workflow.snapshot().await;
        assert_eq!(capture_ids(&state.archive_captures), vec!["CAP12346"]);
        assert_eq!(state.archive_status, FeedStatus::Ready);
        assert!(state.future_opportunities.is_empty());
        assert_eq!(state.opportunities_status, FeedStatus::Failed);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_archive_failure_does_not_block_opportunities() {
        let source = ScriptedSource::new([
            (FeedKind::Archive, None),
            (FeedKind::Opportunities, Some(opportunities_payload("OP123"))),
        ]);
        let (workflow, initial) =
            DiscoveryWorkflow::enter(source, handoff(true), WorkflowOptions::default()).await;

        let report = initial.wait().await;
        assert_eq!(report.failed, vec![FeedKind::Archive]);
        assert_eq!(report.committed, vec![FeedKind::Opportunities]);

        let state = workflow.snapshot().await;
        assert_eq!(state.mode, ResultMode::Timeline);
        assert!(state.archive_captures.is_empty());
        assert_eq!(state.future_opportunities.len(), 1);
    }

    #[tokio::test]
    async fn test_rapid_toggle_keeps_last_mode_only() {
        let (source, mut requests) = GatedSource::new();
        let (workflow, first_recent) =
            DiscoveryWorkflow::enter(source, handoff(false), WorkflowOptions::default()).await;
        let mut first = next_requests(&mut requests, 1).await;

        let timeline = workflow.set_mode(ResultMode::Timeline).await.unwrap();
        let mut timeline_requests = next_requests(&mut requests, 2).await;

        let second_recent = workflow.set_mode(ResultMode::Recent).await.unwrap();
        let mut second = next_requests(&mut requests, 1).await;
        assert!(second_recent.epoch() > timeline.epoch());
        assert!(timeline.epoch() > first_recent.epoch());

        // the newest cycle answers first, the abandoned ones trickle in afterwards
        second
            .remove(&FeedKind::Recent)
            .unwrap()
            .send(Ok(recent_payload("NEW")))
            .unwrap();
        assert_eq!(second_recent.wait().await.committed, vec![FeedKind::Recent]);

        first
            .remove(&FeedKind::Recent)
            .unwrap()
            .send(Ok(recent_payload("OLD")))
            .unwrap();
        timeline_requests
            .remove(&FeedKind::Archive)
            .unwrap()
            .send(Ok(archive_payload("STALE_ARCHIVE")))
            .unwrap();
        timeline_requests
            .remove(&FeedKind::Opportunities)
            .unwrap()
            .send(Ok(opportunities_payload("STALE_OP")))
            .unwrap();

        let first_report = first_recent.wait().await;
        assert_eq!(first_report.stale, vec![FeedKind::Recent]);
        let timeline_report = timeline.wait().await;
        assert!(timeline_report.is_stale());
        assert!(timeline_report.committed.is_empty());

        let state = workflow.snapshot().await;
        assert_eq!(state.mode, ResultMode::Recent);
        assert_eq!(state.epoch, 3);
        assert_eq!(capture_ids(&state.recent_captures), vec!["NEW"]);
        assert!(state.archive_captures.is_empty());
        assert!(state.future_opportunities.is_empty());
        assert_eq!(state.archive_status, FeedStatus::Idle);
        assert_eq!(state.opportunities_status, FeedStatus::Idle);
    }

    #[tokio::test]
    async fn test_late_failure_of_abandoned_cycle_is_discarded() {
        let (source, mut requests) = GatedSource::new();
        let (workflow, first_recent) =
            DiscoveryWorkflow::enter(source, handoff(false), WorkflowOptions::default()).await;
        let mut first = next_requests(&mut requests, 1).await;

        let timeline = workflow.set_mode(ResultMode::Timeline).await.unwrap();
        let mut timeline_requests = next_requests(&mut requests, 2).await;
        let second_recent = workflow.set_mode(ResultMode::Recent).await.unwrap();
        let mut second = next_requests(&mut requests, 1).await;

        second
            .remove(&FeedKind::Recent)
            .unwrap()
            .send(Ok(recent_payload("NEW")))
            .unwrap();
        assert_eq!(second_recent.wait().await.committed, vec![FeedKind::Recent]);

        // every abandoned request now fails
        first
            .remove(&FeedKind::Recent)
            .unwrap()
            .send(Err(DiscoveryError::feed(FeedKind::Recent, "timed out")))
            .unwrap();
        for feed in [FeedKind::Archive, FeedKind::Opportunities] {
            timeline_requests
                .remove(&feed)
                .unwrap()
                .send(Err(DiscoveryError::feed(feed, "connection reset")))
                .unwrap();
        }

        let first_report = first_recent.wait().await;
        assert_eq!(first_report.stale, vec![FeedKind::Recent]);
        assert!(first_report.failed.is_empty());
        let timeline_report = timeline.wait().await;
        assert_eq!(timeline_report.stale, vec![FeedKind::Archive, FeedKind::Opportunities]);
        assert!(timeline_report.failed.is_empty());

        let state = workflow.snapshot().await;
        assert_eq!(state.epoch, 3);
        assert_eq!(capture_ids(&state.recent_captures), vec!["NEW"]);
        assert_eq!(state.recent_status, FeedStatus::Ready);
        assert_eq!(state.archive_status, FeedStatus::Idle);
        assert_eq!(state.opportunities_status, FeedStatus::Idle);
    }

    #[tokio::test]
    async fn test_same_mode_is_noop() {
        let source = ScriptedSource::new([(FeedKind::Recent, Some(recent_payload("CAP123")))]);
        let (workflow, initial) = DiscoveryWorkflow::enter(
            source.clone(),
            handoff(false),
            WorkflowOptions::default(),
        )
        .await;
        initial.wait().await;

        assert!(workflow.set_mode(ResultMode::Recent).await.is_none());
        assert_eq!(source.calls(FeedKind::Recent), 1);
        assert_eq!(workflow.snapshot().await.epoch, 1);
    }

    #[tokio::test]
    async fn test_every_toggle_refetches_without_cache() {
        let source = ScriptedSource::new([
            (FeedKind::Recent, Some(recent_payload("CAP123"))),
            (FeedKind::Archive, Some(archive_payload("CAP12348"))),
            (FeedKind::Opportunities, Some(opportunities_payload("OP123"))),
        ]);
        let (workflow, initial) = DiscoveryWorkflow::enter(
            source.clone(),
            handoff(false),
            WorkflowOptions::default(),
        )
        .await;
        initial.wait().await;

        for mode in [ResultMode::Timeline, ResultMode::Recent, ResultMode::Timeline] {
            workflow.set_mode(mode).await.unwrap().wait().await;
        }

        assert_eq!(source.calls(FeedKind::Recent), 2);
        assert_eq!(source.calls(FeedKind::Archive), 2);
        assert_eq!(source.calls(FeedKind::Opportunities), 2);
    }

    #[tokio::test]
    async fn test_cache_serves_repeated_toggles() {
        let source = ScriptedSource::new([
            (FeedKind::Recent, Some(recent_payload("CAP123"))),
            (FeedKind::Archive, Some(archive_payload("CAP12348"))),
            (FeedKind::Opportunities, None),
        ]);
        let options = WorkflowOptions { cache_enabled: true };
        let (workflow, initial) =
            DiscoveryWorkflow::enter(source.clone(), handoff(false), options).await;
        initial.wait().await;

        for mode in [ResultMode::Timeline, ResultMode::Recent, ResultMode::Timeline] {
            workflow.set_mode(mode).await.unwrap().wait().await;
        }

        assert_eq!(source.calls(FeedKind::Recent), 1);
        assert_eq!(source.calls(FeedKind::Archive), 1);
        // failures are never cached
        assert_eq!(source.calls(FeedKind::Opportunities), 2);
        assert_eq!(capture_ids(&workflow.snapshot().await.archive_captures), vec!["CAP12348"]);

        workflow.clear_cache().await;
        workflow.refresh().await.wait().await;
        assert_eq!(source.calls(FeedKind::Archive), 2);
    }

    #[tokio::test]
    async fn test_queries_use_handoff_coordinate() {
        let source = ScriptedSource::new([(FeedKind::Recent, Some(recent_payload("CAP123")))]);
        let elsewhere = Coordinate::new(-34.6037, -58.3816).unwrap();
        let handoff = NavigationHandoff {
            captures: normalizer::normalize_recent(&json!([{
                "captureId": "SEED", "location": {"lat": elsewhere.lat(), "lon": elsewhere.lon()},
                "captureDate": "2023-11-01T10:15:30Z", "resolution": "5m"
            }])),
            coordinate: nyc(),
            show_timeline: false,
        };

        let (workflow, initial) =
            DiscoveryWorkflow::enter(source.clone(), handoff, WorkflowOptions::default()).await;
        initial.wait().await;

        let calls = source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(FeedKind::Recent, nyc())]);
        assert_eq!(workflow.origin().await, nyc());
    }

    #[tokio::test]
    async fn test_handoff_captures_shown_until_first_cycle_lands() {
        let (source, mut requests) = GatedSource::new();
        let handoff = NavigationHandoff {
            captures: normalizer::normalize_recent(&recent_payload("SEED")),
            coordinate: nyc(),
            show_timeline: false,
        };
        let (workflow, initial) =
            DiscoveryWorkflow::enter(source, handoff, WorkflowOptions::default()).await;
        let mut pending = next_requests(&mut requests, 1).await;

        let state = workflow.snapshot().await;
        assert_eq!(capture_ids(&state.recent_captures), vec!["SEED"]);
        assert_eq!(state.recent_status, FeedStatus::Loading);

        pending.remove(&FeedKind::Recent).unwrap().send(Ok(recent_payload("FRESH"))).unwrap();
        initial.wait().await;
        assert_eq!(capture_ids(&workflow.snapshot().await.recent_captures), vec!["FRESH"]);
    }

    #[tokio::test]
    async fn test_drop_cancels_in_flight_cycle() {
        let (source, mut requests) = GatedSource::new();
        let (workflow, initial) =
            DiscoveryWorkflow::enter(source, handoff(false), WorkflowOptions::default()).await;
        let _pending = next_requests(&mut requests, 1).await;

        drop(workflow);
        let report = initial.wait().await;
        assert!(report.aborted);
    }
}
