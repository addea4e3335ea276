//! Domain models for cyclotrips.
//!
//! ## Submodules
//!
//! - [`credential`] - Account credentials and bearer tokens
//! - [`trip`] - Raw and normalized trips, datasets, summary stats

mod credential;
mod trip;

pub use credential::{AccessToken, Credential};
pub use trip::{
    NormalizedTrip, RawTrip, TripDataset, TripStats, DEFAULT_BIKE_TYPE, DEFAULT_END_STATION,
    DEFAULT_START_STATION,
};
