//! Account credentials and access tokens.
//!
//! - [`Credential`] - username/secret pair supplied at process start
//! - [`AccessToken`] - bearer token returned by the password grant

use chrono::{DateTime, Duration, Utc};
use std::fmt;

// ============================================================================
// Credential
// ============================================================================

/// Username and secret for the provider account.
///
/// Immutable once built. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    secret: String,
}

impl Credential {
    /// Creates a credential.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Account username (the e-mail address for Cyclocity accounts).
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Account secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Access Token
// ============================================================================

/// Number of characters kept at each end of a token preview.
const PREVIEW_EDGE: usize = 20;

/// Bearer token obtained from the identity provider.
///
/// A token is valid for `expires_in` seconds after `issued_at`. A token
/// whose provider omitted `expires_in` carries 0 and is stale immediately.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_in: u64,
    issued_at: DateTime<Utc>,
    refresh_available: bool,
}

impl AccessToken {
    /// Creates a token issued now.
    pub fn new(token: impl Into<String>, expires_in: u64) -> Self {
        Self::issued_at(token, expires_in, Utc::now())
    }

    /// Creates a token with an explicit issue instant.
    pub fn issued_at(token: impl Into<String>, expires_in: u64, issued_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_in,
            issued_at,
            refresh_available: false,
        }
    }

    /// Marks whether the provider also issued a refresh token.
    #[must_use]
    pub fn with_refresh_available(mut self, available: bool) -> Self {
        self.refresh_available = available;
        self
    }

    /// The raw bearer value.
    pub fn secret(&self) -> &str {
        &self.token
    }

    /// Lifetime reported by the provider, in seconds.
    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    /// When the token was received.
    pub fn issued(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Whether the provider issued a refresh token alongside this one.
    pub fn refresh_available(&self) -> bool {
        self.refresh_available
    }

    /// Instant after which the token must not be used.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.expires_in).unwrap_or(i64::MAX);
        Duration::try_seconds(secs)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns true once the reported lifetime has elapsed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Redacted form for logs: first and last 20 characters.
    pub fn preview(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() <= PREVIEW_EDGE * 2 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..PREVIEW_EDGE].iter().collect();
        let tail: String = chars[chars.len() - PREVIEW_EDGE..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &self.preview())
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field("refresh_available", &self.refresh_available)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_hides_secret() {
        let cred = Credential::new("rider@example.com", "hunter2");
        let debug = format!("{cred:?}");
        assert!(debug.contains("rider@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_zero_lifetime_is_immediately_stale() {
        let token = AccessToken::new("abc", 0);
        assert!(token.is_expired());
    }

    #[test]
    fn test_expiry_boundary() {
        let issued = Utc::now();
        let token = AccessToken::issued_at("abc", 600, issued);

        assert!(!token.is_expired_at(issued));
        assert!(!token.is_expired_at(issued + Duration::seconds(599)));
        assert!(token.is_expired_at(issued + Duration::seconds(600)));
    }

    #[test]
    fn test_huge_lifetime_does_not_overflow() {
        let token = AccessToken::new("abc", u64::MAX);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_preview_redacts_middle() {
        let raw = format!("{}{}{}", "a".repeat(20), "SECRET", "b".repeat(20));
        let token = AccessToken::new(raw, 60);
        let preview = token.preview();
        assert_eq!(preview, format!("{}...{}", "a".repeat(20), "b".repeat(20)));
        assert!(!format!("{token:?}").contains("SECRET"));
    }

    #[test]
    fn test_preview_short_token_fully_masked() {
        let token = AccessToken::new("short", 60);
        assert_eq!(token.preview(), "*****");
    }
}
