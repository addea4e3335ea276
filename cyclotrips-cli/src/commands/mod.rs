//! CLI command implementations.

pub mod credentials;
pub mod export;
pub mod geojson;
