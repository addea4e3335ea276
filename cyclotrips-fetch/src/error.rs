//! Fetch error types.

use cyclotrips_core::FailureKind;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// The provider rejected the credentials, or the session is not logged in.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// HTTP status returned by the provider, when there was one.
        status: Option<u16>,
        /// Diagnostic detail (usually the truncated response body).
        message: String,
    },

    /// The access token's reported lifetime has elapsed.
    #[error("Access token expired at {0}")]
    TokenExpired(String),

    /// Non-success HTTP status that is not an authentication rejection.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Diagnostic detail (headers and truncated body).
        message: String,
    },

    /// The response decoded but its envelope was not recognized.
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// The response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Keychain error.
    #[error("Keychain error: {0}")]
    Keychain(#[from] KeychainError),

    /// Process error.
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Browser automation error.
    #[error("WebDriver error: {0}")]
    WebDriver(#[from] WebDriverError),

    /// No trip source can serve the request.
    #[error("Trip source not available: {0}")]
    SourceNotAvailable(String),
}

impl FetchError {
    /// Returns the failure classification for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Http(e) => e.failure_kind(),
            Self::AuthenticationFailed { .. } | Self::TokenExpired(_) => FailureKind::Auth,
            Self::Status { .. } => FailureKind::Status,
            Self::UnexpectedShape(_) | Self::Json(_) => FailureKind::Shape,
            Self::Keychain(_) | Self::SourceNotAvailable(_) => FailureKind::Config,
            Self::Process(_) | Self::WebDriver(_) => FailureKind::Automation,
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed { status, .. } => *status,
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the provider appears to block the request path
    /// rather than reject the account: transport failures, 403 and 429.
    pub fn is_blocked(&self) -> bool {
        match self {
            Self::Http(e) => e.failure_kind() == FailureKind::Transport,
            _ => matches!(self.status(), Some(403 | 429)),
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// Returns the failure classification for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Request(_) => FailureKind::Transport,
            Self::DomainNotAllowed(_) | Self::InvalidUrl(_) => FailureKind::Config,
        }
    }
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Access denied.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            _ => KeychainError::Other(err.to_string()),
        }
    }
}

// ============================================================================
// Process Error
// ============================================================================

/// Error type for process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Process exited before it was asked to.
    #[error("{program} exited early with code {code:?}")]
    ExitedEarly {
        /// Program name.
        program: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// WebDriver Error
// ============================================================================

/// Error type for browser automation.
#[derive(Debug, Error)]
pub enum WebDriverError {
    /// Could not reach the WebDriver server.
    #[error("WebDriver transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The driver did not report ready in time.
    #[error("WebDriver server at {url} not ready after {timeout:?}")]
    NotReady {
        /// Server URL.
        url: String,
        /// How long we waited.
        timeout: Duration,
    },

    /// The driver rejected a command.
    #[error("{command} failed: {error}: {message}")]
    Command {
        /// Command that failed (e.g. "POST /session").
        command: String,
        /// W3C error code (e.g. "no such element").
        error: String,
        /// Driver-provided message.
        message: String,
    },

    /// The driver replied with something that is not a W3C response.
    #[error("Invalid WebDriver response: {0}")]
    InvalidResponse(String),

    /// A bounded wait elapsed without the awaited condition.
    #[error("Timed out after {timeout:?} waiting for {condition}")]
    Timeout {
        /// What we were waiting for.
        condition: String,
        /// How long we waited.
        timeout: Duration,
    },

    /// In-page script reported an error.
    #[error("Script error: {0}")]
    Script(String),

    /// Driver process error.
    #[error("Driver process error: {0}")]
    Process(#[from] ProcessError),
}

impl WebDriverError {
    /// W3C error code for command failures.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Command { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns true for the "no such element" command failure.
    pub fn is_no_such_element(&self) -> bool {
        self.code() == Some("no such element")
    }

    /// Returns true for the "stale element reference" command failure.
    pub fn is_stale_element(&self) -> bool {
        self.code() == Some("stale element reference")
    }
}

// ============================================================================
// Tests
// ============================================================================
