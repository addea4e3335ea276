//! Trip types.
//!
//! - [`RawTrip`] - provider-shaped record, kept opaque
//! - [`NormalizedTrip`] - stable output record
//! - [`TripDataset`] - ordered collection written to disk
//! - [`TripStats`] - summary figures for a dataset

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A trip record exactly as the provider returned it.
pub type RawTrip = Value;

/// Station name used when the start station is missing.
pub const DEFAULT_START_STATION: &str = "Départ";

/// Station name used when the end station is missing.
pub const DEFAULT_END_STATION: &str = "Arrivée";

/// Bike type used when the provider does not report one.
pub const DEFAULT_BIKE_TYPE: &str = "classic";

// ============================================================================
// Normalized Trip
// ============================================================================

/// A trip in the stable output schema.
///
/// Every field has a default, so a normalized trip always serializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTrip {
    /// Provider trip identifier.
    pub id: String,
    /// Start timestamp as reported by the provider.
    pub start_time: String,
    /// End timestamp as reported by the provider.
    pub end_time: String,
    /// Duration in minutes.
    pub duration: i64,
    /// Start station display name.
    pub start_station_name: String,
    /// End station display name.
    pub end_station_name: String,
    /// Start station latitude.
    pub start_lat: f64,
    /// Start station longitude.
    pub start_lng: f64,
    /// End station latitude.
    pub end_lat: f64,
    /// End station longitude.
    pub end_lng: f64,
    /// Route geometry, passed through untouched.
    pub geometry: Value,
    /// Bike category (e.g. "classic", "electric").
    pub bike_type: String,
}

impl Default for NormalizedTrip {
    fn default() -> Self {
        Self {
            id: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            duration: 0,
            start_station_name: DEFAULT_START_STATION.to_string(),
            end_station_name: DEFAULT_END_STATION.to_string(),
            start_lat: 0.0,
            start_lng: 0.0,
            end_lat: 0.0,
            end_lng: 0.0,
            geometry: Value::Object(serde_json::Map::new()),
            bike_type: DEFAULT_BIKE_TYPE.to_string(),
        }
    }
}

impl NormalizedTrip {
    /// Returns true if both ends carry non-zero coordinates.
    ///
    /// Zero is the "missing" default, so such trips cannot be drawn.
    pub fn has_coordinates(&self) -> bool {
        self.has_start_coordinates() && self.has_end_coordinates()
    }

    /// Returns true if the start station has non-zero coordinates.
    pub fn has_start_coordinates(&self) -> bool {
        self.start_lat != 0.0 && self.start_lng != 0.0
    }

    /// Returns true if the end station has non-zero coordinates.
    pub fn has_end_coordinates(&self) -> bool {
        self.end_lat != 0.0 && self.end_lng != 0.0
    }
}

// ============================================================================
// Trip Dataset
// ============================================================================

/// Ordered collection of normalized trips, in provider response order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripDataset {
    trips: Vec<NormalizedTrip>,
}

impl TripDataset {
    /// Creates an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a trip, keeping insertion order.
    pub fn push(&mut self, trip: NormalizedTrip) {
        self.trips.push(trip);
    }

    /// Number of trips.
    pub fn len(&self) -> usize {
        self.trips.len()
    }

    /// Returns true if there are no trips.
    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Iterates trips in order.
    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedTrip> {
        self.trips.iter()
    }

    /// Borrows the trips as a slice.
    pub fn trips(&self) -> &[NormalizedTrip] {
        &self.trips
    }

    /// Computes summary figures. The duration total saturates.
    pub fn stats(&self) -> TripStats {
        TripStats {
            trips: self.trips.len(),
            total_duration_minutes: self
                .trips
                .iter()
                .map(|t| t.duration)
                .fold(0i64, i64::saturating_add),
        }
    }
}

impl From<Vec<NormalizedTrip>> for TripDataset {
    fn from(trips: Vec<NormalizedTrip>) -> Self {
        Self { trips }
    }
}

impl FromIterator<NormalizedTrip> for TripDataset {
    fn from_iter<I: IntoIterator<Item = NormalizedTrip>>(iter: I) -> Self {
        Self {
            trips: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TripDataset {
    type Item = &'a NormalizedTrip;
    type IntoIter = std::slice::Iter<'a, NormalizedTrip>;

    fn into_iter(self) -> Self::IntoIter {
        self.trips.iter()
    }
}

// ============================================================================
// Trip Stats
// ============================================================================

/// Summary of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStats {
    /// Number of trips.
    pub trips: usize,
    /// Sum of trip durations in minutes.
    pub total_duration_minutes: i64,
}

impl TripStats {
    /// Renders the total duration as `"{h}h {m}m"`.
    pub fn total_duration_display(&self) -> String {
        let total = self.total_duration_minutes.max(0);
        format!("{}h {}m", total / 60, total % 60)
    }
}

// ============================================================================
// Tests
// ============================================================================
