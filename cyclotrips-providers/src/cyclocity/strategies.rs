//! Cyclocity trip sources.

use async_trait::async_trait;
use cyclotrips_fetch::{FetchContext, FetchError, FetchResult, SourceKind, TokenSummary, TripRequest, TripSource};
use tracing::{debug, instrument};

use super::api::TripApi;
use super::descriptor::{CyclocityAccount, CyclocityEndpoints};
use super::oauth::PasswordGrant;
use super::web::BrowserTripFetch;

// ============================================================================
// Direct Grant
// ============================================================================

/// Password grant, then bearer-token HTTP fetch.
#[derive(Debug, Clone)]
pub struct DirectGrantStrategy {
    endpoints: CyclocityEndpoints,
    account: CyclocityAccount,
}

impl DirectGrantStrategy {
    /// Creates the direct source.
    pub fn new(endpoints: CyclocityEndpoints, account: CyclocityAccount) -> Self {
        Self { endpoints, account }
    }
}

#[async_trait]
impl TripSource for DirectGrantStrategy {
    fn id(&self) -> &str {
        "cyclocity.direct"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::DirectGrant
    }

    async fn is_available(&self, _ctx: &FetchContext) -> bool {
        true
    }

    #[instrument(skip_all, fields(source = "cyclocity.direct"))]
    async fn fetch(&self, ctx: &FetchContext, request: &TripRequest) -> Result<FetchResult, FetchError> {
        debug!("Fetching trips via password grant");

        let token = PasswordGrant::new(&ctx.http, &self.endpoints)
            .acquire(&request.credential)
            .await?;

        let pages = TripApi::new(&ctx.http, &self.endpoints, &self.account)
            .fetch(&token, request)
            .await?;

        Ok(FetchResult::new(pages.trips, self.id(), self.kind())
            .with_token(TokenSummary::from(&token))
            .with_pages(pages.pages))
    }
}

// ============================================================================
// Browser Session
// ============================================================================

/// Browser login, then in-page fetch with session cookies.
#[derive(Debug, Clone)]
pub struct BrowserSessionStrategy {
    endpoints: CyclocityEndpoints,
    account: CyclocityAccount,
}

impl BrowserSessionStrategy {
    /// Creates the browser source.
    pub fn new(endpoints: CyclocityEndpoints, account: CyclocityAccount) -> Self {
        Self { endpoints, account }
    }
}

#[async_trait]
impl TripSource for BrowserSessionStrategy {
    fn id(&self) -> &str {
        "cyclocity.browser"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::BrowserSession
    }

    /// Needs a WebDriver URL or a driver binary on `PATH`.
    async fn is_available(&self, ctx: &FetchContext) -> bool {
        let browser = &ctx.settings.browser;
        browser.webdriver_url.is_some() || ctx.process.command_exists(&browser.driver_binary)
    }

    #[instrument(skip_all, fields(source = "cyclocity.browser"))]
    async fn fetch(&self, ctx: &FetchContext, request: &TripRequest) -> Result<FetchResult, FetchError> {
        debug!("Fetching trips via browser session");

        let pages = BrowserTripFetch::new(ctx, &self.endpoints, &self.account)
            .fetch(request)
            .await?;

        Ok(FetchResult::new(pages.trips, self.id(), self.kind()).with_pages(pages.pages))
    }
}
