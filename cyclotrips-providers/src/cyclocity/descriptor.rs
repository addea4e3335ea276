//! Cyclocity endpoints, account and pipeline.

use cyclotrips_fetch::{FetchContext, FetchPipeline, TripSource};
use url::Url;

use super::error::CyclocityError;
use super::strategies::{BrowserSessionStrategy, DirectGrantStrategy};

// ============================================================================
// Defaults
// ============================================================================

/// Identity provider base URL.
pub const DEFAULT_IAM_URL: &str = "https://iam.cyclocity.fr";

/// Trip API base URL.
pub const DEFAULT_API_URL: &str = "https://api.cyclocity.fr";

/// Account page that hosts the login form and the trip view.
pub const DEFAULT_ACCOUNT_PAGE_URL: &str = "https://velov.grandlyon.com/fr/my-account#TRIPS";

/// Identity realm.
pub const DEFAULT_REALM: &str = "vls-default";

/// Public OAuth client used by the web front-end.
pub const DEFAULT_CLIENT_ID: &str = "vls-web-lyon";

/// Scopes requested with the password grant.
pub const DEFAULT_SCOPE: &str = "openid profile email";

/// Versioned media type of the trip endpoint.
pub const TRIP_MEDIA_TYPE: &str = "application/vnd.trip.v5+json";

/// Contract (city) served by default.
pub const DEFAULT_CONTRACT: &str = "lyon";

// ============================================================================
// Endpoints
// ============================================================================

/// Where the provider lives and how to talk to it.
///
/// Base URLs are validated when overridden and parsed again when a request
/// URL is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclocityEndpoints {
    /// Identity provider base URL.
    pub iam_base: String,
    /// Identity realm.
    pub realm: String,
    /// Trip API base URL.
    pub api_base: String,
    /// Account page for the browser session.
    pub account_page: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth scope.
    pub scope: String,
    /// `Accept` value for trip requests.
    pub trip_media_type: String,
}

impl Default for CyclocityEndpoints {
    fn default() -> Self {
        Self {
            iam_base: DEFAULT_IAM_URL.to_string(),
            realm: DEFAULT_REALM.to_string(),
            api_base: DEFAULT_API_URL.to_string(),
            account_page: DEFAULT_ACCOUNT_PAGE_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            trip_media_type: TRIP_MEDIA_TYPE.to_string(),
        }
    }
}

impl CyclocityEndpoints {
    /// Overrides the identity provider base URL.
    pub fn with_iam_base(mut self, url: &str) -> Result<Self, CyclocityError> {
        self.iam_base = parse_base(url)?.to_string();
        Ok(self)
    }

    /// Overrides the trip API base URL.
    pub fn with_api_base(mut self, url: &str) -> Result<Self, CyclocityError> {
        self.api_base = parse_base(url)?.to_string();
        Ok(self)
    }

    /// Overrides the account page URL.
    pub fn with_account_page(mut self, url: &str) -> Result<Self, CyclocityError> {
        self.account_page = parse_base(url)?.to_string();
        Ok(self)
    }

    /// `{iam}/realms/{realm}/protocol/openid-connect/token`
    pub fn token_url(&self) -> Result<Url, CyclocityError> {
        extend_path(
            &self.iam_base,
            &["realms", &self.realm, "protocol", "openid-connect", "token"],
        )
    }

    /// `{api}/contracts/{contract}/accounts/{id}/trips?offset=&length=`
    pub fn trips_url(&self, account: &CyclocityAccount, offset: u32, length: u32) -> Result<Url, CyclocityError> {
        let mut url = extend_path(
            &self.api_base,
            &["contracts", &account.contract, "accounts", &account.account_id, "trips"],
        )?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("length", &length.to_string());
        Ok(url)
    }

    /// Account page URL.
    pub fn account_page_url(&self) -> Result<Url, CyclocityError> {
        parse_base(&self.account_page)
    }

    /// Hosts the HTTP client may contact.
    pub fn allowed_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = [&self.iam_base, &self.api_base, &self.account_page]
            .into_iter()
            .filter_map(|url| Url::parse(url).ok())
            .filter_map(|url| url.host_str().map(str::to_string))
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }
}

fn parse_base(url: &str) -> Result<Url, CyclocityError> {
    let parsed = Url::parse(url).map_err(|e| CyclocityError::InvalidUrl(format!("{url}: {e}")))?;
    if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
        return Err(CyclocityError::InvalidUrl(format!("{url}: not an http(s) URL")));
    }
    Ok(parsed)
}

/// Appends percent-encoded path segments to `base`.
fn extend_path(base: &str, segments: &[&str]) -> Result<Url, CyclocityError> {
    let mut url = parse_base(base)?;
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| CyclocityError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// ============================================================================
// Account
// ============================================================================

/// Contract and account whose trips are exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclocityAccount {
    /// Contract (city), e.g. `lyon`.
    pub contract: String,
    /// Provider account id.
    pub account_id: String,
}

impl CyclocityAccount {
    /// Creates an account, rejecting blank identifiers.
    pub fn new(contract: impl Into<String>, account_id: impl Into<String>) -> Result<Self, CyclocityError> {
        let contract = contract.into().trim().to_string();
        let account_id = account_id.into().trim().to_string();

        if contract.is_empty() {
            return Err(CyclocityError::InvalidAccount("contract is empty".to_string()));
        }
        if account_id.is_empty() {
            return Err(CyclocityError::InvalidAccount("account id is empty".to_string()));
        }

        Ok(Self { contract, account_id })
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Builds the source pipeline for the context's source mode.
pub fn cyclocity_pipeline(
    ctx: &FetchContext,
    endpoints: &CyclocityEndpoints,
    account: &CyclocityAccount,
) -> FetchPipeline {
    let mut sources: Vec<Box<dyn TripSource>> = Vec::new();
    let direct = DirectGrantStrategy::new(endpoints.clone(), account.clone());
    let browser = BrowserSessionStrategy::new(endpoints.clone(), account.clone());

    if ctx.allows_source(direct.kind()) {
        sources.push(Box::new(direct));
    }
    if ctx.allows_source(browser.kind()) {
        sources.push(Box::new(browser));
    }

    FetchPipeline::with_sources(sources)
}

// ============================================================================
// Tests
// ============================================================================
