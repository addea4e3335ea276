// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # cyclotrips Core
//!
//! Core types and trip normalization shared by every cyclotrips crate.
//!
//! ## Key Types
//!
//! ### Credentials
//! - [`Credential`] - Username and secret supplied at start-up
//! - [`AccessToken`] - Bearer token with its reported lifetime
//!
//! ### Trips
//! - [`RawTrip`] - Provider-shaped record (opaque JSON)
//! - [`NormalizedTrip`] - Stable output schema
//! - [`TripDataset`] - Ordered collection written to disk
//! - [`TripStats`] - Count and total duration
//!
//! ### Errors
//! - [`CoreError`] - Errors raised by this crate
//! - [`FailureKind`] - Classification shared by every layer

pub mod error;
pub mod models;
pub mod normalize;

pub use error::{CoreError, FailureKind};
pub use models::{
    AccessToken, Credential, NormalizedTrip, RawTrip, TripDataset, TripStats, DEFAULT_BIKE_TYPE,
    DEFAULT_END_STATION, DEFAULT_START_STATION,
};
pub use normalize::{normalize, normalize_trip};
