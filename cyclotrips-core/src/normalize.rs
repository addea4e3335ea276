//! Trip normalization.
//!
//! Maps provider-shaped trip records into [`NormalizedTrip`]s. Records are
//! handled independently: one that cannot be mapped is logged and dropped,
//! and the rest of the batch goes through.
//!
//! # Input Format
//!
//! ```json
//! {
//!   "id": "t1",
//!   "startTime": "2025-03-01T08:12:00Z",
//!   "endTime": "2025-03-01T08:27:00Z",
//!   "duration": 15,
//!   "startStation": {"name": "Part-Dieu", "latitude": 45.76, "longitude": 4.86},
//!   "endStation": {"name": "Bellecour", "position": {"lat": 45.75, "lng": 4.83}},
//!   "geometry": {"type": "LineString", "coordinates": [[4.86, 45.76], [4.83, 45.75]]},
//!   "bikeType": "electric"
//! }
//! ```

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::models::{
    NormalizedTrip, RawTrip, TripDataset, DEFAULT_BIKE_TYPE, DEFAULT_END_STATION,
    DEFAULT_START_STATION,
};

/// Normalizes a batch of raw trips, skipping records that fail to map.
pub fn normalize(raw: &[RawTrip]) -> TripDataset {
    let mut dataset = TripDataset::new();
    let mut skipped = 0usize;

    for (index, record) in raw.iter().enumerate() {
        match normalize_trip(index, record) {
            Ok(trip) => dataset.push(trip),
            Err(e) => {
                skipped += 1;
                warn!(index, error = %e, "Skipping trip record");
            }
        }
    }

    debug!(
        input = raw.len(),
        output = dataset.len(),
        skipped,
        "Normalized trips"
    );
    dataset
}

/// Normalizes a single record. `index` is only used for error reporting.
pub fn normalize_trip(index: usize, record: &RawTrip) -> Result<NormalizedTrip, CoreError> {
    let invalid = |reason: String| CoreError::InvalidRecord { index, reason };

    let trip = record
        .as_object()
        .ok_or_else(|| invalid(format!("expected an object, found {}", type_name(record))))?;

    let start = station(trip, "startStation").map_err(&invalid)?;
    let end = station(trip, "endStation").map_err(&invalid)?;

    Ok(NormalizedTrip {
        id: text(trip.get("id")).unwrap_or_default(),
        start_time: text(trip.get("startTime")).unwrap_or_default(),
        end_time: text(trip.get("endTime")).unwrap_or_default(),
        duration: duration(trip.get("duration")).map_err(&invalid)?,
        start_station_name: text(start.get("name"))
            .unwrap_or_else(|| DEFAULT_START_STATION.to_string()),
        end_station_name: text(end.get("name")).unwrap_or_else(|| DEFAULT_END_STATION.to_string()),
        start_lat: coordinate(start, "latitude", "lat").map_err(&invalid)?,
        start_lng: coordinate(start, "longitude", "lng").map_err(&invalid)?,
        end_lat: coordinate(end, "latitude", "lat").map_err(&invalid)?,
        end_lng: coordinate(end, "longitude", "lng").map_err(&invalid)?,
        geometry: trip
            .get("geometry")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
        bike_type: text(trip.get("bikeType")).unwrap_or_else(|| DEFAULT_BIKE_TYPE.to_string()),
    })
}

// ============================================================================
// Field Helpers
// ============================================================================

static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);

/// Looks up a nested station object. Missing or null yields an empty map.
fn station<'a>(trip: &'a Map<String, Value>, key: &str) -> Result<&'a Map<String, Value>, String> {
    match trip.get(key) {
        None | Some(Value::Null) => Ok(&EMPTY),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(format!("{key} is {}, not an object", type_name(other))),
    }
}

/// Reads a scalar as text. Numbers and booleans are rendered; null is absent.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Parses a numeric string such as `"15"` or `" 45.76 "`.
fn numeric_text(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Reads a duration in minutes. Floats and numeric strings are rounded.
#[allow(clippy::cast_possible_truncation)]
fn duration(value: Option<&Value>) -> Result<i64, String> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| format!("duration {n} is out of range")),
        Some(Value::String(s)) => numeric_text(s)
            .map(|f| f.round() as i64)
            .ok_or_else(|| format!("duration {s:?} is not a number")),
        Some(other) => Err(format!("duration is {}, not a number", type_name(other))),
    }
}

/// Reads a coordinate from `station[primary]`, falling back to
/// `station.position[fallback]`.
fn coordinate(station: &Map<String, Value>, primary: &str, fallback: &str) -> Result<f64, String> {
    let value = station.get(primary).filter(|v| !v.is_null()).or_else(|| {
        station
            .get("position")
            .and_then(Value::as_object)
            .and_then(|p| p.get(fallback))
            .filter(|v| !v.is_null())
    });

    match value {
        None => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("{primary} {n} is not representable")),
        Some(Value::String(s)) => {
            numeric_text(s).ok_or_else(|| format!("{primary} {s:?} is not a number"))
        }
        Some(other) => Err(format!("{primary} is {}, not a number", type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record() {
        let raw = json!({
            "id": "t1",
            "startTime": "2025-03-01T08:12:00Z",
            "endTime": "2025-03-01T08:27:00Z",
            "duration": 15,
            "startStation": {"name": "A", "latitude": 1.0, "longitude": 2.0},
            "endStation": {"name": "B", "latitude": 3.0, "longitude": 4.0},
            "geometry": {"type": "LineString", "coordinates": [[2.0, 1.0], [4.0, 3.0]]},
            "bikeType": "electric"
        });

        let trip = normalize_trip(0, &raw).unwrap();
        assert_eq!(trip.id, "t1");
        assert_eq!(trip.duration, 15);
        assert_eq!(trip.start_station_name, "A");
        assert_eq!(trip.end_station_name, "B");
        assert_eq!((trip.start_lat, trip.start_lng), (1.0, 2.0));
        assert_eq!((trip.end_lat, trip.end_lng), (3.0, 4.0));
        assert_eq!(trip.geometry["type"], "LineString");
        assert_eq!(trip.bike_type, "electric");
    }

    #[test]
    fn test_empty_object_gets_all_defaults() {
        let trip = normalize_trip(0, &json!({})).unwrap();
        assert_eq!(trip, NormalizedTrip::default());
    }

    #[test]
    fn test_null_station_treated_as_missing() {
        let trip = normalize_trip(0, &json!({"startStation": null})).unwrap();
        assert_eq!(trip.start_station_name, "Départ");
        assert_eq!(trip.start_lat, 0.0);
    }

    #[test]
    fn test_position_fallback() {
        let raw = json!({
            "startStation": {"name": "A", "position": {"lat": 45.7, "lng": 4.8}}
        });
        let trip = normalize_trip(0, &raw).unwrap();
        assert_eq!((trip.start_lat, trip.start_lng), (45.7, 4.8));
    }

    #[test]
    fn test_numeric_id_rendered_as_text() {
        let trip = normalize_trip(0, &json!({"id": 42})).unwrap();
        assert_eq!(trip.id, "42");
    }

    #[test]
    fn test_float_duration_rounded() {
        let trip = normalize_trip(0, &json!({"duration": 14.6})).unwrap();
        assert_eq!(trip.duration, 15);
    }

    #[test]
    fn test_null_bike_type_defaults() {
        let trip = normalize_trip(0, &json!({"bikeType": null})).unwrap();
        assert_eq!(trip.bike_type, "classic");
    }

    #[test]
    fn test_geometry_passthrough_keeps_null() {
        let trip = normalize_trip(0, &json!({"geometry": null})).unwrap();
        assert!(trip.geometry.is_null());
    }

    #[test]
    fn test_non_object_record_rejected() {
        let err = normalize_trip(7, &json!("oops")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord { index: 7, .. }));
    }

    #[test]
    fn test_station_string_rejected() {
        assert!(normalize_trip(0, &json!({"endStation": "Bellecour"})).is_err());
    }

    #[test]
    fn test_text_coordinate_rejected() {
        let raw = json!({"startStation": {"latitude": "north"}});
        assert!(normalize_trip(0, &raw).is_err());
    }

    #[test]
    fn test_text_duration_rejected() {
        assert!(normalize_trip(0, &json!({"duration": "15 min"})).is_err());
    }

    #[test]
    fn test_numeric_strings_parsed() {
        let raw = json!({
            "duration": "15",
            "startStation": {"latitude": "45.76", "longitude": " 4.86 "},
            "endStation": {"position": {"lat": "45.75", "lng": "4.83"}}
        });
        let trip = normalize_trip(0, &raw).unwrap();
        assert_eq!(trip.duration, 15);
        assert_eq!((trip.start_lat, trip.start_lng), (45.76, 4.86));
        assert_eq!((trip.end_lat, trip.end_lng), (45.75, 4.83));
    }

    #[test]
    fn test_fractional_string_duration_rounded() {
        let trip = normalize_trip(0, &json!({"duration": "14.6"})).unwrap();
        assert_eq!(trip.duration, 15);
    }

    #[test]
    fn test_batch_skips_bad_records_in_order() {
        let raw = vec![
            json!({"id": "a"}),
            json!(null),
            json!({"id": "b"}),
            json!([1, 2]),
            json!({"id": "c"}),
        ];
        let dataset = normalize(&raw);
        let ids: Vec<&str> = dataset.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
