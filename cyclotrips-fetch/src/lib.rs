// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # cyclotrips Fetch
//!
//! Trip-source infrastructure and host APIs.
//!
//! ## Host APIs
//!
//! The [`host`] module wraps system interactions:
//!
//! - [`host::keychain`] - Secure credential storage (system keychain)
//! - [`host::http`] - HTTP client with tracing and domain allowlist
//! - [`host::process`] - Helper process spawning
//! - [`host::webdriver`] - W3C WebDriver client
//!
//! ## Source Pipeline
//!
//! - [`strategy::TripSource`] - Trait for acquisition paths
//! - [`pipeline::FetchPipeline`] - Runs sources in priority order
//! - [`context::FetchContext`] - Host APIs and settings
//!
//! ## Example
//!
//! ```ignore
//! use cyclotrips_fetch::{FetchContext, FetchPipeline, TripRequest};
//!
//! let ctx = FetchContext::new()?;
//! let pipeline = FetchPipeline::with_sources(vec![
//!     Box::new(DirectGrantStrategy::new(endpoints, account)),
//! ]);
//!
//! let outcome = pipeline.execute(&ctx, &TripRequest::new(credential)).await;
//! ```

pub mod context;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod strategy;

// Errors
pub use error::{FetchError, HttpError, KeychainError, ProcessError, WebDriverError};

// Host APIs
pub use host::{
    http::HttpClient,
    keychain::{KeychainApi, SystemKeychain},
    process::{BackgroundProcess, ProcessRunner},
    webdriver::{BrowserOptions, BrowserSession, DriverHandle, ElementRef, Locator, WebDriverClient},
};

// Sources & Pipeline
pub use context::{BrowserSettings, FetchContext, FetchContextBuilder, FetchSettings, SourceMode};
pub use pipeline::{FetchAttempt, FetchOutcome, FetchPipeline};
pub use strategy::{
    clamp_length, FetchResult, SourceKind, TokenSummary, TripRequest, TripSource,
    MAX_PAGE_LENGTH,
};
