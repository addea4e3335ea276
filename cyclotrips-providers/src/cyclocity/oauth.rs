//! Password grant against the Cyclocity identity provider.
//!
//! # Token Response
//!
//! ```json
//! {
//!   "access_token": "eyJ...",
//!   "expires_in": 300,
//!   "refresh_token": "eyJ...",
//!   "token_type": "Bearer"
//! }
//! ```

use cyclotrips_core::{AccessToken, Credential};
use cyclotrips_fetch::host::http::{truncate_body, HttpClient, BODY_PREVIEW_CHARS};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::descriptor::CyclocityEndpoints;
use super::error::CyclocityError;

/// Exchanges account credentials for a bearer token.
#[derive(Debug, Clone, Copy)]
pub struct PasswordGrant<'a> {
    http: &'a HttpClient,
    endpoints: &'a CyclocityEndpoints,
}

impl<'a> PasswordGrant<'a> {
    /// Creates a grant client.
    pub fn new(http: &'a HttpClient, endpoints: &'a CyclocityEndpoints) -> Self {
        Self { http, endpoints }
    }

    /// Requests an access token. No retry, no caching.
    #[instrument(skip(self, credential), fields(username = %credential.username()))]
    pub async fn acquire(&self, credential: &Credential) -> Result<AccessToken, CyclocityError> {
        let url = self.endpoints.token_url()?;
        let form = [
            ("grant_type", "password"),
            ("client_id", self.endpoints.client_id.as_str()),
            ("username", credential.username()),
            ("password", credential.secret()),
            ("scope", self.endpoints.scope.as_str()),
        ];

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        debug!(url = %url, client_id = %self.endpoints.client_id, "Requesting access token");
        let response = self.http.post_form(&url, headers, &form).await?;
        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            warn!(status = status.as_u16(), "Token request rejected");
            return Err(CyclocityError::TokenRejected {
                status: status.as_u16(),
                body: truncate_body(&body, BODY_PREVIEW_CHARS),
            });
        }

        let token = parse_token_response(&body)?;
        info!(
            token = %token.preview(),
            expires_in = token.expires_in(),
            "Access token obtained"
        );
        if token.refresh_available() {
            debug!("Refresh token available");
        }
        Ok(token)
    }
}

/// Reads the token fields from a 200 body.
///
/// A missing `expires_in` counts as 0 and negative values are clamped.
pub fn parse_token_response(body: &str) -> Result<AccessToken, CyclocityError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| CyclocityError::MissingAccessToken(truncate_body(body, BODY_PREVIEW_CHARS)))?;

    let access_token = value
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CyclocityError::MissingAccessToken(truncate_body(body, BODY_PREVIEW_CHARS)))?;

    let expires_in = value.get("expires_in").map_or(0, expires_in_secs);
    let refresh_available = value
        .get("refresh_token")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty());

    Ok(AccessToken::new(access_token, expires_in).with_refresh_available(refresh_available))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn expires_in_secs(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
