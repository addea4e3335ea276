//! Store error types.

use cyclotrips_core::FailureKind;
use cyclotrips_fetch::KeychainError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No username was supplied.
    #[error("No username configured (set --username or CYCLOTRIPS_USERNAME)")]
    MissingUsername,

    /// No secret in the environment, on the command line or in the keychain.
    #[error("No password for {0} (set --password, CYCLOTRIPS_PASSWORD, or run `cyclotrips credentials set`)")]
    MissingSecret(String),

    /// Refused to store an empty secret.
    #[error("Refusing to store an empty password")]
    EmptySecret,

    /// Keychain error.
    #[error("Keychain error: {0}")]
    Keychain(#[from] KeychainError),
}

impl StoreError {
    /// Returns the failure classification for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Io(_) | Self::Serialization(_) => FailureKind::Io,
            Self::MissingUsername | Self::MissingSecret(_) | Self::EmptySecret | Self::Keychain(_) => {
                FailureKind::Config
            }
        }
    }
}
