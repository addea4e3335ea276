//! GeoJSON export of a trip dataset.
//!
//! Two layouts: one `LineString` per trip from start to end station, or
//! separate start and end `Point` features for heatmaps. A zero coordinate
//! means "unknown": routes need both ends, points are emitted per end.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use cyclotrips_core::{NormalizedTrip, TripDataset};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value as GeoValue};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::persistence::save_json;

/// Feature layout for the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeoJsonLayout {
    /// One start-to-end line per trip.
    #[default]
    Routes,
    /// A start point and an end point per trip.
    Points,
}

impl GeoJsonLayout {
    /// Returns the layout name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routes => "routes",
            Self::Points => "points",
        }
    }
}

impl fmt::Display for GeoJsonLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoJsonLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "routes" | "lines" => Ok(Self::Routes),
            "points" | "heatmap" => Ok(Self::Points),
            other => Err(format!("unknown layout '{other}' (expected routes or points)")),
        }
    }
}

// ============================================================================
// Conversion
// ============================================================================

/// GeoJSON positions are `[longitude, latitude]`.
fn position(lat: f64, lng: f64) -> Vec<f64> {
    vec![lng, lat]
}

fn feature(geometry: GeoValue, id: Option<String>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: id.filter(|s| !s.is_empty()).map(Id::String),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn route_feature(trip: &NormalizedTrip) -> Feature {
    let mut props = JsonObject::new();
    props.insert("startTime".into(), Value::from(trip.start_time.clone()));
    props.insert("endTime".into(), Value::from(trip.end_time.clone()));
    props.insert("duration".into(), Value::from(trip.duration));
    props.insert("startStationName".into(), Value::from(trip.start_station_name.clone()));
    props.insert("endStationName".into(), Value::from(trip.end_station_name.clone()));
    props.insert("bikeType".into(), Value::from(trip.bike_type.clone()));

    let line = GeoValue::LineString(vec![
        position(trip.start_lat, trip.start_lng),
        position(trip.end_lat, trip.end_lng),
    ]);
    feature(line, Some(trip.id.clone()), props)
}

fn point_features(trip: &NormalizedTrip) -> Vec<Feature> {
    let point = |kind: &str, station: &str, time: &str, lat: f64, lng: f64| {
        let mut props = JsonObject::new();
        props.insert("kind".into(), Value::from(kind));
        props.insert("tripId".into(), Value::from(trip.id.clone()));
        props.insert("stationName".into(), Value::from(station));
        props.insert("time".into(), Value::from(time));
        feature(GeoValue::Point(position(lat, lng)), None, props)
    };

    let mut features = Vec::with_capacity(2);
    if trip.has_start_coordinates() {
        features.push(point("start", &trip.start_station_name, &trip.start_time, trip.start_lat, trip.start_lng));
    }
    if trip.has_end_coordinates() {
        features.push(point("end", &trip.end_station_name, &trip.end_time, trip.end_lat, trip.end_lng));
    }
    features
}

/// Counts from one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoJsonSummary {
    /// Features written.
    pub features: usize,
    /// Trips that produced no feature.
    pub skipped: usize,
}

fn convert(dataset: &TripDataset, layout: GeoJsonLayout) -> (FeatureCollection, usize) {
    let mut features = Vec::new();
    let mut skipped = 0usize;

    for trip in dataset {
        let before = features.len();
        match layout {
            GeoJsonLayout::Routes if trip.has_coordinates() => features.push(route_feature(trip)),
            GeoJsonLayout::Routes => {}
            GeoJsonLayout::Points => features.extend(point_features(trip)),
        }
        if features.len() == before {
            skipped += 1;
        }
    }

    if skipped > 0 {
        debug!(skipped, "Trips without coordinates left out");
    }

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    (collection, skipped)
}

/// Builds the feature collection for `dataset`.
pub fn to_feature_collection(dataset: &TripDataset, layout: GeoJsonLayout) -> FeatureCollection {
    convert(dataset, layout).0
}

/// Converts `dataset` and writes it to `path`.
#[instrument(skip(dataset), fields(path = %path.display(), trips = dataset.len()))]
pub async fn write_geojson(
    dataset: &TripDataset,
    layout: GeoJsonLayout,
    path: &Path,
) -> Result<GeoJsonSummary, StoreError> {
    let (collection, skipped) = convert(dataset, layout);
    let summary = GeoJsonSummary {
        features: collection.features.len(),
        skipped,
    };
    save_json(path, &collection).await?;
    info!(features = summary.features, skipped, layout = %layout, "GeoJSON written");
    Ok(summary)
}
