///! Coordinate selection: map clicks, geocoded place search, and the
///! handoff into a result session

pub mod geocoder;
pub mod surface;

pub use geocoder::{Geocoder, NominatimGeocoder, UNKNOWN_LOCATION};
pub use surface::SearchSession;
