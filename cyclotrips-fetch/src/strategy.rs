//! Trip source trait and types.
//!
//! A trip source is one way of obtaining raw trip records for an account:
//! the password grant followed by an HTTP fetch, or a logged-in browser
//! session fetching from inside the page. The pipeline tries them in
//! priority order.

use async_trait::async_trait;
use cyclotrips_core::{AccessToken, Credential, RawTrip};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::FetchContext;
use crate::error::FetchError;

/// Largest page the trip endpoint accepts.
pub const MAX_PAGE_LENGTH: u32 = 1000;

// ============================================================================
// Source Kind
// ============================================================================

/// The acquisition mechanism a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Password grant + bearer-token HTTP fetch.
    DirectGrant,
    /// Browser login + in-page fetch with session cookies.
    BrowserSession,
}

impl SourceKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DirectGrant => "Direct Grant",
            Self::BrowserSession => "Browser Session",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Trip Request
// ============================================================================

/// What to fetch, and as whom.
#[derive(Debug, Clone)]
pub struct TripRequest {
    /// Account credential.
    pub credential: Credential,
    /// Index of the first record.
    pub offset: u32,
    /// Page size, clamped to `1..=MAX_PAGE_LENGTH`.
    pub length: u32,
    /// Keep fetching pages until a short page is returned.
    pub all_pages: bool,
}

impl TripRequest {
    /// Creates a single-page request from offset 0 with the largest page.
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            offset: 0,
            length: MAX_PAGE_LENGTH,
            all_pages: false,
        }
    }

    /// Sets the starting offset.
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the page size. Out-of-range values are clamped.
    #[must_use]
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = clamp_length(length);
        self
    }

    /// Enables or disables fetching every page.
    #[must_use]
    pub fn with_all_pages(mut self, all_pages: bool) -> Self {
        self.all_pages = all_pages;
        self
    }

    /// The effective page size.
    pub fn page_length(&self) -> u32 {
        clamp_length(self.length)
    }
}

/// Clamps a page size to what the endpoint accepts.
pub fn clamp_length(length: u32) -> u32 {
    length.clamp(1, MAX_PAGE_LENGTH)
}

// ============================================================================
// Fetch Result
// ============================================================================

/// Redacted description of the token a run used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    /// First and last characters of the token.
    pub preview: String,
    /// Reported lifetime in seconds.
    pub expires_in: u64,
    /// Whether the provider also issued a refresh token.
    pub refresh_available: bool,
}

impl From<&AccessToken> for TokenSummary {
    fn from(token: &AccessToken) -> Self {
        Self {
            preview: token.preview(),
            expires_in: token.expires_in(),
            refresh_available: token.refresh_available(),
        }
    }
}

/// Raw trips produced by a successful source.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Raw trip records in provider order.
    pub trips: Vec<RawTrip>,
    /// The source that produced them.
    pub source_id: String,
    /// The kind of source used.
    pub kind: SourceKind,
    /// Token used, for sources that hold one.
    pub token: Option<TokenSummary>,
    /// Number of pages requested.
    pub pages: usize,
}

impl FetchResult {
    /// Creates a new fetch result for a single page.
    pub fn new(trips: Vec<RawTrip>, source_id: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            trips,
            source_id: source_id.into(),
            kind,
            token: None,
            pages: 1,
        }
    }

    /// Attaches a token summary.
    #[must_use]
    pub fn with_token(mut self, token: TokenSummary) -> Self {
        self.token = Some(token);
        self
    }

    /// Sets the page count.
    #[must_use]
    pub fn with_pages(mut self, pages: usize) -> Self {
        self.pages = pages;
        self
    }
}

// ============================================================================
// Trip Source Trait
// ============================================================================

/// A way of producing raw trips for a request.
///
/// ```ignore
/// struct FixtureSource(Vec<RawTrip>);
///
/// #[async_trait]
/// impl TripSource for FixtureSource {
///     fn id(&self) -> &str {
///         "fixture"
///     }
///
///     fn kind(&self) -> SourceKind {
///         SourceKind::DirectGrant
///     }
///
///     async fn is_available(&self, _ctx: &FetchContext) -> bool {
///         true
///     }
///
///     async fn fetch(&self, _ctx: &FetchContext, _req: &TripRequest) -> Result<FetchResult, FetchError> {
///         Ok(FetchResult::new(self.0.clone(), self.id(), self.kind()))
///     }
/// }
/// ```
#[async_trait]
pub trait TripSource: Send + Sync {
    /// Unique identifier, `{provider}.{method}` (e.g. `cyclocity.direct`).
    fn id(&self) -> &str;

    /// The kind of source.
    fn kind(&self) -> SourceKind;

    /// Human-readable name for this source.
    fn display_name(&self) -> String {
        format!("{} ({})", self.id(), self.kind().display_name())
    }

    /// Quick, offline check that the source can run at all.
    async fn is_available(&self, ctx: &FetchContext) -> bool;

    /// Produces raw trips for the request.
    async fn fetch(&self, ctx: &FetchContext, request: &TripRequest) -> Result<FetchResult, FetchError>;

    /// Whether the next source may be tried after this error.
    ///
    /// Only a blocked path falls back. Rejected credentials, unexpected
    /// shapes and other statuses are final.
    fn should_fallback(&self, error: &FetchError) -> bool {
        error.is_blocked()
    }

    /// Priority of this source (higher = try first).
    fn priority(&self) -> u32 {
        match self.kind() {
            SourceKind::DirectGrant => 100,
            SourceKind::BrowserSession => 50,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
