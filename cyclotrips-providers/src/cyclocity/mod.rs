//! Cyclocity (Vélo'v) provider implementation.
//!
//! Two ways in:
//! - password grant on the identity provider, then the trip API with a
//!   bearer token
//! - a logged-in browser session calling the same API from the page
//!
//! Keychain service: `cyclotrips:cyclocity`

mod api;
mod descriptor;
mod error;
mod oauth;
pub(crate) mod parser;
mod strategies;
mod web;

pub use api::{TripApi, TripPages};
pub use descriptor::{
    cyclocity_pipeline, CyclocityAccount, CyclocityEndpoints, DEFAULT_ACCOUNT_PAGE_URL, DEFAULT_API_URL,
    DEFAULT_CLIENT_ID, DEFAULT_CONTRACT, DEFAULT_IAM_URL, DEFAULT_REALM, DEFAULT_SCOPE, TRIP_MEDIA_TYPE,
};
pub use error::CyclocityError;
pub use oauth::{parse_token_response, PasswordGrant};
pub use parser::{extract_trips, parse_trips_response};
pub use strategies::{BrowserSessionStrategy, DirectGrantStrategy};
pub use web::{email_locators, password_locator, submit_locators, BrowserTripFetch, LoginState};
