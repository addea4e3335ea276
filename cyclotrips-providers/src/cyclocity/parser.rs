//! Trip response parsing.
//!
//! The trip endpoint has answered with two envelopes over time:
//!
//! ```json
//! [ {"id": "t1", ...}, ... ]
//! {"data": [ {"id": "t1", ...}, ... ], "total": 42}
//! ```
//!
//! Anything else is rejected with a preview of what arrived.

use cyclotrips_core::RawTrip;
use cyclotrips_fetch::host::http::{truncate_body, BODY_PREVIEW_CHARS};
use serde_json::Value;
use tracing::debug;

use super::error::CyclocityError;

/// Parses a trip response body.
pub fn parse_trips_response(body: &str) -> Result<Vec<RawTrip>, CyclocityError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        debug!(error = %e, body = %truncate_body(body, BODY_PREVIEW_CHARS), "Trip body is not JSON");
        CyclocityError::InvalidJson(e)
    })?;
    extract_trips(value)
}

/// Picks the trip collection out of a decoded response.
///
/// A bare array is returned as is; an object whose `data` is an array yields
/// that array.
pub fn extract_trips(value: Value) -> Result<Vec<RawTrip>, CyclocityError> {
    match value {
        Value::Array(trips) => Ok(trips),
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_array) => {
            match map.remove("data") {
                Some(Value::Array(trips)) => Ok(trips),
                _ => Err(CyclocityError::UnexpectedShape(String::new())),
            }
        }
        other => Err(CyclocityError::UnexpectedShape(shape_preview(&other))),
    }
}

/// Pretty-printed value, truncated for diagnostics.
pub fn shape_preview(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    truncate_body(&pretty, BODY_PREVIEW_CHARS)
}
