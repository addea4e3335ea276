// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # cyclotrips Providers
//!
//! Provider-specific trip sources.
//!
//! Each provider module includes:
//!
//! - **Descriptor**: Endpoints, account and pipeline construction
//! - **Strategies**: [`TripSource`](cyclotrips_fetch::TripSource) implementations
//! - **Parser**: Response-envelope disambiguation
//!
//! ## Usage
//!
//! ```ignore
//! use cyclotrips_providers::cyclocity::{cyclocity_pipeline, CyclocityAccount, CyclocityEndpoints};
//! use cyclotrips_fetch::{FetchContext, TripRequest};
//!
//! let endpoints = CyclocityEndpoints::default();
//! let account = CyclocityAccount::new("lyon", account_id)?;
//! let ctx = FetchContext::builder()
//!     .allowed_domains(endpoints.allowed_domains())
//!     .build()?;
//!
//! let pipeline = cyclocity_pipeline(&ctx, &endpoints, &account);
//! let outcome = pipeline.execute(&ctx, &TripRequest::new(credential)).await;
//! ```

pub mod cyclocity;

pub use cyclocity::{
    cyclocity_pipeline, CyclocityAccount, CyclocityEndpoints, CyclocityError, BrowserSessionStrategy,
    DirectGrantStrategy,
};
