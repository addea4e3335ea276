//! File persistence helpers.
//!
//! Every write goes to a sibling temp file first and is renamed over the
//! target, so a failed run never leaves a half-written dataset behind.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use cyclotrips_core::TripDataset;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;

/// Default dataset location, relative to the working directory.
pub const DEFAULT_OUTPUT_PATH: &str = "public/velov-trips.json";

// ============================================================================
// Paths
// ============================================================================

/// Returns the default dataset path.
pub fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

/// Temp file next to `path`: `trips.json` becomes `trips.json.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Creates the parent directories of `path` if needed.
async fn create_parent_dirs(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            debug!(path = %parent.display(), "Creating directory");
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Saves data as 2-space indented JSON, replacing any existing file.
///
/// Non-ASCII text is written as UTF-8, not escaped.
pub async fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");

    create_parent_dirs(path).await?;
    let json = serde_json::to_string_pretty(data)?;

    let temp = temp_path(path);
    tokio::fs::write(&temp, json.as_bytes()).await?;
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        warn!(path = %path.display(), error = %e, "Rename failed, removing temp file");
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = json.len(), "JSON file saved");
    Ok(())
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");

    let content = tokio::fs::read_to_string(path).await?;
    let data = serde_json::from_str(&content)?;

    debug!(path = %path.display(), "JSON file loaded");
    Ok(data)
}

/// Writes a dataset as a JSON array.
#[instrument(skip(dataset), fields(path = %path.display(), trips = dataset.len()))]
pub async fn write_dataset(dataset: &TripDataset, path: &Path) -> Result<(), StoreError> {
    save_json(path, dataset).await?;
    info!("Dataset written");
    Ok(())
}

/// Reads a dataset previously written by [`write_dataset`].
pub async fn read_dataset(path: &Path) -> Result<TripDataset, StoreError> {
    load_json(path).await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cyclotrips_core::NormalizedTrip;
    use tempfile::TempDir;

    fn trip(id: &str, start: &str) -> NormalizedTrip {
        NormalizedTrip {
            id: id.to_string(),
            duration: 12,
            start_station_name: start.to_string(),
            start_lat: 45.76,
            start_lng: 4.83,
            ..NormalizedTrip::default()
        }
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let temp = temp_path(Path::new("public/velov-trips.json"));
        assert_eq!(temp, PathBuf::from("public/velov-trips.json.tmp"));
    }

    #[test]
    fn test_default_output_path() {
        assert!(default_output_path().ends_with("public/velov-trips.json"));
    }

    #[tokio::test]
    async fn test_write_then_read_is_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trips.json");
        let dataset: TripDataset = vec![trip("t1", "Bellecour"), trip("t2", "Part-Dieu")].into();

        write_dataset(&dataset, &path).await.unwrap();
        let loaded = read_dataset(&path).await.unwrap();

        assert_eq!(loaded, dataset);
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_full_precision_coordinates_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trips.json");
        let coords = [
            61.131_812_213_393_324,
            50.716_314_720_930_676,
            46.583_668_895_303_724,
            4.835_658_999_999_999_6,
        ];
        let dataset: TripDataset = coords
            .iter()
            .enumerate()
            .map(|(i, &c)| NormalizedTrip {
                id: format!("t{i}"),
                start_lat: c,
                start_lng: c / 3.0,
                end_lat: c + f64::EPSILON * 64.0,
                end_lng: -c,
                ..NormalizedTrip::default()
            })
            .collect();

        write_dataset(&dataset, &path).await.unwrap();
        let loaded = read_dataset(&path).await.unwrap();

        for (written, read) in dataset.iter().zip(loaded.iter()) {
            for (a, b) in [
                (written.start_lat, read.start_lat),
                (written.start_lng, read.start_lng),
                (written.end_lat, read.end_lat),
                (written.end_lng, read.end_lng),
            ] {
                assert_eq!(a.to_bits(), b.to_bits(), "{a} came back as {b}");
            }
        }
    }

    #[tokio::test]
    async fn test_output_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trips.json");
        let dataset: TripDataset = vec![trip("t1", "Hôtel de Ville")].into();

        write_dataset(&dataset, &path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(text.starts_with("[\n  {\n    \"id\": \"t1\""));
        assert!(text.contains("Hôtel de Ville"));
        assert!(text.contains("\"endStationName\": \"Arrivée\""));
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("public").join("nested").join("trips.json");

        write_dataset(&vec![trip("old", "A"), trip("older", "B")].into(), &path)
            .await
            .unwrap();
        write_dataset(&vec![trip("new", "C")].into(), &path).await.unwrap();

        let loaded = read_dataset(&path).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.trips()[0].id, "new");
    }

    #[tokio::test]
    async fn test_empty_dataset_is_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trips.json");

        write_dataset(&TripDataset::new(), &path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_write_into_file_as_directory_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("public");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = write_dataset(&TripDataset::new(), &blocker.join("trips.json"))
            .await
            .unwrap_err();
        assert_eq!(err.failure_kind(), cyclotrips_core::FailureKind::Io);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_dataset(&dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
