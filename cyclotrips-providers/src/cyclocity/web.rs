//! Browser-session trip fetch.
//!
//! Logs into the account page through WebDriver and calls the trip endpoint
//! from inside the page, so the request carries the session cookies and the
//! browser's own fingerprint. Used when the direct path is blocked.
//!
//! Flow:
//! 1. Start or attach to a WebDriver server, open a session
//! 2. Load the account page and wait for `document.readyState`
//! 3. Fill and submit the login form, or probe the session if there is none
//! 4. `fetch()` each trip page in the page context
//! 5. Quit the session and stop the driver on every exit path

use cyclotrips_core::{Credential, RawTrip};
use cyclotrips_fetch::host::http::{truncate_body, BODY_PREVIEW_CHARS};
use cyclotrips_fetch::{
    BrowserOptions, BrowserSession, BrowserSettings, DriverHandle, FetchContext, Locator, TripRequest,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::api::{collect_pages, TripPages};
use super::descriptor::{CyclocityAccount, CyclocityEndpoints};
use super::error::CyclocityError;
use super::parser::parse_trips_response;

/// Resolves the in-page fetch with `{status, ok, body}` or `{status: 0, error}`.
const FETCH_SCRIPT: &str = r#"
const [url, accept, done] = arguments;
fetch(url, { headers: { accept }, credentials: "include" })
  .then(async (r) => done({ status: r.status, ok: r.ok, body: await r.text() }))
  .catch((e) => done({ status: 0, ok: false, error: String((e && e.message) || e) }));
"#;

// ============================================================================
// Login Form Locators
// ============================================================================

/// Email field candidates, first match wins.
pub fn email_locators() -> Vec<Locator> {
    vec![
        Locator::css("input[type='email']"),
        Locator::css("input[name*='email']"),
        Locator::css("input[id*='email']"),
    ]
}

/// Password field.
pub fn password_locator() -> Locator {
    Locator::css("input[type='password']")
}

/// Submit control candidates, first match wins.
pub fn submit_locators() -> Vec<Locator> {
    vec![
        Locator::css("button[type='submit']"),
        Locator::css("input[type='submit']"),
        Locator::xpath("//button[contains(., 'Connexion')]"),
        Locator::xpath("//button[contains(., 'Se connecter')]"),
    ]
}

// ============================================================================
// Page Fetch Result
// ============================================================================

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    body: String,
    #[serde(default)]
    error: Option<String>,
}

// ============================================================================
// Browser Trip Fetch
// ============================================================================

/// How the session got authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// The form was filled and went away after submit.
    Submitted,
    /// No form was shown and the session probe succeeded.
    AlreadyAuthenticated,
}

/// Runs the browser-session flow for one account.
#[derive(Debug, Clone, Copy)]
pub struct BrowserTripFetch<'a> {
    ctx: &'a FetchContext,
    endpoints: &'a CyclocityEndpoints,
    account: &'a CyclocityAccount,
}

impl<'a> BrowserTripFetch<'a> {
    /// Creates the flow.
    pub fn new(ctx: &'a FetchContext, endpoints: &'a CyclocityEndpoints, account: &'a CyclocityAccount) -> Self {
        Self {
            ctx,
            endpoints,
            account,
        }
    }

    fn settings(&self) -> &BrowserSettings {
        &self.ctx.settings.browser
    }

    /// Logs in and fetches the pages `request` asks for.
    #[instrument(skip_all, fields(contract = %self.account.contract))]
    pub async fn fetch(&self, request: &TripRequest) -> Result<TripPages, CyclocityError> {
        let settings = self.settings();
        // Async scripts may run up to the script timeout on top of the request itself.
        let command_timeout = settings.script_timeout + self.ctx.timeout();

        let driver = match &settings.webdriver_url {
            Some(url) => {
                let driver = DriverHandle::connect(url, command_timeout)?;
                driver
                    .client()
                    .wait_ready(settings.driver_start_timeout, settings.poll_interval)
                    .await?;
                driver
            }
            None => {
                DriverHandle::launch(
                    &self.ctx.process,
                    &settings.driver_binary,
                    command_timeout,
                    settings.driver_start_timeout,
                    settings.poll_interval,
                )
                .await?
            }
        };

        let options = BrowserOptions {
            headless: settings.headless,
            ..BrowserOptions::default()
        };
        let opened = driver.client().new_session(&options).await;
        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                driver.shutdown().await;
                return Err(e.into());
            }
        };

        let result = self.run(&session, request).await;

        if let Err(e) = session.quit().await {
            warn!(error = %e, "Failed to close browser session");
        }
        driver.shutdown().await;

        result
    }

    async fn run(&self, session: &BrowserSession, request: &TripRequest) -> Result<TripPages, CyclocityError> {
        let settings = self.settings();
        session.set_script_timeout(settings.script_timeout).await?;

        let page = self.endpoints.account_page_url()?;
        session.navigate(page.as_str()).await?;
        session
            .wait_for_document_ready(settings.ready_timeout, settings.poll_interval)
            .await?;

        let state = self.login(session, &request.credential).await?;
        info!(state = ?state, "Browser session authenticated");

        let pages = collect_pages(request, |offset, length| self.fetch_page(session, offset, length)).await?;
        info!(trips = pages.trips.len(), pages = pages.pages, "Trips fetched in page");
        Ok(pages)
    }

    /// Submits the login form, or checks the session when no form shows up.
    #[instrument(skip_all)]
    pub async fn login(&self, session: &BrowserSession, credential: &Credential) -> Result<LoginState, CyclocityError> {
        let settings = self.settings();

        let Some(email) = session
            .wait_for_any(&email_locators(), settings.element_timeout, settings.poll_interval)
            .await?
        else {
            debug!("No login form, probing session");
            self.probe_session(session).await?;
            return Ok(LoginState::AlreadyAuthenticated);
        };

        let password = session
            .find(&password_locator())
            .await?
            .ok_or(CyclocityError::LoginFormIncomplete("password"))?;
        let submit = session
            .find_first(&submit_locators())
            .await?
            .ok_or(CyclocityError::LoginFormIncomplete("submit"))?;

        session.clear(&email).await?;
        session.send_keys(&email, credential.username()).await?;
        session.clear(&password).await?;
        session.send_keys(&password, credential.secret()).await?;
        session.click(&submit).await?;
        debug!("Login form submitted");

        let gone = session
            .wait_until_absent(&password_locator(), settings.element_timeout, settings.poll_interval)
            .await?;
        if !gone {
            warn!("Login form still present after submit");
            return Err(CyclocityError::LoginFormStillPresent);
        }

        session
            .wait_for_document_ready(settings.ready_timeout, settings.poll_interval)
            .await?;
        Ok(LoginState::Submitted)
    }

    /// Requests a single record to confirm the session is logged in.
    async fn probe_session(&self, session: &BrowserSession) -> Result<(), CyclocityError> {
        let url = self.endpoints.trips_url(self.account, 0, 1)?;
        let response = self.page_fetch(session, url.as_str()).await?;

        match response.status {
            200..=299 => Ok(()),
            401 | 403 => Err(CyclocityError::Unauthorized {
                status: response.status,
                body: "session is not authenticated".to_string(),
            }),
            status => Err(CyclocityError::Status {
                status,
                headers: String::new(),
                body: truncate_body(&response.body, BODY_PREVIEW_CHARS),
            }),
        }
    }

    async fn fetch_page(&self, session: &BrowserSession, offset: u32, length: u32) -> Result<Vec<RawTrip>, CyclocityError> {
        let url = self.endpoints.trips_url(self.account, offset, length)?;
        let response = self.page_fetch(session, url.as_str()).await?;

        if !response.ok {
            warn!(status = response.status, "In-page trip request failed");
            let body = truncate_body(&response.body, BODY_PREVIEW_CHARS);
            return Err(if response.status == 401 {
                CyclocityError::Unauthorized {
                    status: response.status,
                    body,
                }
            } else {
                CyclocityError::Status {
                    status: response.status,
                    headers: String::new(),
                    body,
                }
            });
        }

        parse_trips_response(&response.body)
    }

    async fn page_fetch(&self, session: &BrowserSession, url: &str) -> Result<PageResponse, CyclocityError> {
        debug!(url = %url, "In-page fetch");
        let value = session
            .execute_async(
                FETCH_SCRIPT,
                vec![json!(url), Value::String(self.endpoints.trip_media_type.clone())],
            )
            .await?;

        let response: PageResponse = serde_json::from_value(value)?;
        if response.status == 0 {
            return Err(CyclocityError::PageFetch(
                response.error.unwrap_or_else(|| "no response".to_string()),
            ));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_order() {
        let emails = email_locators();
        assert_eq!(emails[0], Locator::css("input[type='email']"));
        assert_eq!(emails.len(), 3);

        let submits = submit_locators();
        assert_eq!(submits[0], Locator::css("button[type='submit']"));
        assert!(matches!(submits[2], Locator::XPath(_)));
    }

    #[test]
    fn test_page_response_decoding() {
        let ok: PageResponse =
            serde_json::from_value(json!({"status": 200, "ok": true, "body": "[]"})).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.body, "[]");

        let failed: PageResponse =
            serde_json::from_value(json!({"status": 0, "ok": false, "error": "Failed to fetch"})).unwrap();
        assert_eq!(failed.status, 0);
        assert_eq!(failed.error.as_deref(), Some("Failed to fetch"));
    }

    #[test]
    fn test_fetch_script_uses_callback() {
        assert!(FETCH_SCRIPT.contains("credentials: \"include\""));
        assert!(FETCH_SCRIPT.contains("done("));
    }
}
