///! Capture discovery for a single point
///!
///! - `api_client`: the three upstream feed lookups
///! - `normalizer`: reshapes each feed into `NormalizedCapture` / `NormalizedOpportunity`
///! - `session`: the result screen's owned state and the navigation handoff
///! - `workflow`: mode state machine with epoch-guarded fetch cycles
///! - `cache`: optional per-session memoization of feed results

pub mod api_client;
pub mod cache;
pub mod normalizer;
pub mod session;
pub mod workflow;

pub use api_client::{ImageryClient, ImagerySource};
pub use cache::CaptureCache;
pub use normalizer::{normalize_archive, normalize_opportunities, normalize_recent, FeedData};
pub use session::{FeedStatus, NavigationHandoff, SessionState};
pub use workflow::{CycleHandle, CycleReport, DiscoveryWorkflow, WorkflowOptions};
