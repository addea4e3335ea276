//! Cyclocity-specific errors.

use cyclotrips_core::FailureKind;
use cyclotrips_fetch::{FetchError, HttpError, WebDriverError};
use thiserror::Error;

/// Cyclocity-specific errors.
#[derive(Debug, Error)]
pub enum CyclocityError {
    /// The token endpoint answered with a non-200 status.
    #[error("Token request rejected (HTTP {status}): {body}")]
    TokenRejected {
        /// HTTP status, unchanged.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The token endpoint answered 200 without an access token.
    #[error("Token response has no access_token: {0}")]
    MissingAccessToken(String),

    /// The token's lifetime has elapsed.
    #[error("Access token expired at {0}")]
    TokenExpired(String),

    /// The trip endpoint refused the token or session.
    #[error("Trip request unauthorized (HTTP {status}): {body}")]
    Unauthorized {
        /// HTTP status (401, or 403 for an unauthenticated browser session).
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The trip endpoint answered with another non-success status.
    #[error("Trip request failed (HTTP {status}); headers: [{headers}]; body: {body}")]
    Status {
        /// HTTP status.
        status: u16,
        /// Response headers, when known.
        headers: String,
        /// Truncated response body.
        body: String,
    },

    /// The trip response was neither an array nor an object with a `data` array.
    #[error("Unexpected trip response shape: {0}")]
    UnexpectedShape(String),

    /// The body was not JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The login form was submitted but did not go away.
    #[error("Login form still present after submitting credentials")]
    LoginFormStillPresent,

    /// The login form was only partly found.
    #[error("Login form incomplete: no {0} field")]
    LoginFormIncomplete(&'static str),

    /// The in-page fetch could not complete.
    #[error("In-page fetch failed: {0}")]
    PageFetch(String),

    /// A configured URL is unusable.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Contract or account id is unusable.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// HTTP transport error.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Browser automation error.
    #[error(transparent)]
    WebDriver(#[from] WebDriverError),
}

impl From<reqwest::Error> for CyclocityError {
    fn from(err: reqwest::Error) -> Self {
        CyclocityError::Http(HttpError::Request(err))
    }
}

impl CyclocityError {
    /// Returns the failure classification for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::TokenRejected { .. }
            | Self::MissingAccessToken(_)
            | Self::TokenExpired(_)
            | Self::Unauthorized { .. }
            | Self::LoginFormStillPresent => FailureKind::Auth,
            Self::Status { .. } => FailureKind::Status,
            Self::UnexpectedShape(_) | Self::InvalidJson(_) => FailureKind::Shape,
            Self::LoginFormIncomplete(_) | Self::PageFetch(_) | Self::WebDriver(_) => {
                FailureKind::Automation
            }
            Self::InvalidUrl(_) | Self::InvalidAccount(_) => FailureKind::Config,
            Self::Http(e) => e.failure_kind(),
        }
    }
}

impl From<CyclocityError> for FetchError {
    fn from(err: CyclocityError) -> Self {
        match err {
            CyclocityError::TokenRejected { status, .. } => FetchError::AuthenticationFailed {
                status: Some(status),
                message: err.to_string(),
            },
            CyclocityError::MissingAccessToken(_) | CyclocityError::LoginFormStillPresent => {
                FetchError::AuthenticationFailed {
                    status: None,
                    message: err.to_string(),
                }
            }
            CyclocityError::TokenExpired(at) => FetchError::TokenExpired(at),
            CyclocityError::Unauthorized { status, .. } => FetchError::AuthenticationFailed {
                status: Some(status),
                message: err.to_string(),
            },
            CyclocityError::Status { status, .. } => FetchError::Status {
                status,
                message: err.to_string(),
            },
            CyclocityError::UnexpectedShape(preview) => FetchError::UnexpectedShape(preview),
            CyclocityError::InvalidJson(e) => FetchError::Json(e),
            CyclocityError::LoginFormIncomplete(_) | CyclocityError::PageFetch(_) => {
                FetchError::WebDriver(WebDriverError::Script(err.to_string()))
            }
            CyclocityError::InvalidUrl(msg) | CyclocityError::InvalidAccount(msg) => {
                FetchError::Http(HttpError::InvalidUrl(msg))
            }
            CyclocityError::Http(e) => FetchError::Http(e),
            CyclocityError::WebDriver(e) => FetchError::WebDriver(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_rejection_keeps_status() {
        let err = FetchError::from(CyclocityError::TokenRejected {
            status: 401,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        });
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.failure_kind(), FailureKind::Auth);
        assert!(!err.is_blocked());
    }

    #[test]
    fn test_forbidden_token_endpoint_is_blocked() {
        let err = FetchError::from(CyclocityError::TokenRejected {
            status: 403,
            body: "Access denied".to_string(),
        });
        assert!(err.is_blocked());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CyclocityError::MissingAccessToken("{}".to_string()).failure_kind(),
            FailureKind::Auth
        );
        assert_eq!(
            CyclocityError::UnexpectedShape("{}".to_string()).failure_kind(),
            FailureKind::Shape
        );
        assert_eq!(
            CyclocityError::Status {
                status: 500,
                headers: String::new(),
                body: String::new()
            }
            .failure_kind(),
            FailureKind::Status
        );
        assert_eq!(CyclocityError::LoginFormStillPresent.failure_kind(), FailureKind::Auth);
        assert_eq!(
            CyclocityError::LoginFormIncomplete("password").failure_kind(),
            FailureKind::Automation
        );
        assert_eq!(
            CyclocityError::InvalidAccount("empty".to_string()).failure_kind(),
            FailureKind::Config
        );
    }
}
