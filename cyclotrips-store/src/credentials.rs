//! Account credential resolution.
//!
//! The secret is taken from the command line or environment when given,
//! otherwise from the system keychain entry for the username. It is never
//! written anywhere by the export itself.

use std::fmt;
use std::sync::Arc;

use cyclotrips_core::Credential;
use cyclotrips_fetch::host::keychain::services;
use cyclotrips_fetch::KeychainApi;
use tracing::{debug, instrument};

use crate::error::StoreError;

/// Where a resolved secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    /// `--password` or `CYCLOTRIPS_PASSWORD`.
    Explicit,
    /// System keychain.
    Keychain,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => f.write_str("environment"),
            Self::Keychain => f.write_str("keychain"),
        }
    }
}

/// A credential plus the place its secret was found.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    /// The credential to authenticate with.
    pub credential: Credential,
    /// Origin of the secret.
    pub source: SecretSource,
}

/// Keychain-backed credential storage for Cyclocity accounts.
#[derive(Clone)]
pub struct CredentialStore {
    keychain: Arc<dyn KeychainApi>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Creates a store over `keychain`.
    pub fn new(keychain: Arc<dyn KeychainApi>) -> Self {
        Self { keychain }
    }

    /// Resolves the credential for `username`.
    ///
    /// A non-empty `explicit` secret wins; otherwise the keychain is asked.
    #[instrument(skip(self, explicit))]
    pub async fn resolve(&self, username: &str, explicit: Option<&str>) -> Result<ResolvedCredential, StoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::MissingUsername);
        }

        if let Some(secret) = explicit.filter(|s| !s.is_empty()) {
            debug!("Using explicit password");
            return Ok(ResolvedCredential {
                credential: Credential::new(username, secret),
                source: SecretSource::Explicit,
            });
        }

        match self.keychain.get(services::CYCLOCITY, username).await? {
            Some(secret) => {
                debug!("Using keychain password");
                Ok(ResolvedCredential {
                    credential: Credential::new(username, secret),
                    source: SecretSource::Keychain,
                })
            }
            None => Err(StoreError::MissingSecret(username.to_string())),
        }
    }

    /// Stores `secret` for `username`, replacing any previous one.
    pub async fn store(&self, username: &str, secret: &str) -> Result<(), StoreError> {
        if secret.is_empty() {
            return Err(StoreError::EmptySecret);
        }
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::MissingUsername);
        }
        self.keychain.set(services::CYCLOCITY, username, secret).await?;
        debug!(username, "Password stored in keychain");
        Ok(())
    }

    /// Removes the stored secret for `username`. Missing entries are fine.
    pub async fn delete(&self, username: &str) -> Result<(), StoreError> {
        self.keychain.delete(services::CYCLOCITY, username.trim()).await?;
        Ok(())
    }

    /// Returns true if a secret is stored for `username`.
    pub async fn has_secret(&self, username: &str) -> bool {
        self.keychain.exists(services::CYCLOCITY, username.trim()).await
    }
}
