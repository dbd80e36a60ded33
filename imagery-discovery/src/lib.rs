pub mod config;
pub mod error;
pub mod imagery;
pub mod logging;
pub mod search;
pub mod view;

pub use error::{DiscoveryError, Result};
