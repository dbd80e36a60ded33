pub mod types;

pub use types::{
    Confidence, Coordinate, FeedKind, InvalidCoordinate, NormalizedCapture,
    NormalizedOpportunity, ResultMode,
};
