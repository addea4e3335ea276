// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # cyclotrips Store
//!
//! Everything that touches local state for cyclotrips.
//!
//! - **Persistence**: writes and reads the trip dataset (`public/velov-trips.json`)
//! - **Credentials**: resolves the account secret from the environment or keychain
//! - **GeoJSON**: converts a dataset into route or point features
//!
//! ## Usage
//!
//! ```ignore
//! use cyclotrips_store::{write_dataset, read_dataset, default_output_path};
//!
//! write_dataset(&dataset, &default_output_path()).await?;
//! let again = read_dataset(&default_output_path()).await?;
//! assert_eq!(again, dataset);
//! ```

pub mod credentials;
pub mod error;
pub mod geojson_export;
pub mod persistence;

pub use credentials::{CredentialStore, ResolvedCredential, SecretSource};
pub use error::StoreError;
pub use geojson_export::{to_feature_collection, write_geojson, GeoJsonLayout, GeoJsonSummary};
pub use persistence::{
    default_output_path, load_json, read_dataset, save_json, write_dataset, DEFAULT_OUTPUT_PATH,
};
