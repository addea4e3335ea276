//! Minimal W3C WebDriver client.
//!
//! Speaks the WebDriver wire protocol over HTTP to a driver server such as
//! `chromedriver`. Only the commands the browser-session source needs are
//! covered: session lifecycle, navigation, element lookup and input, and
//! script execution.
//!
//! All waits are bounded polls on an observable condition.

use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::WebDriverError;
use crate::host::process::{BackgroundProcess, ProcessRunner};

/// Key under which W3C drivers return element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Chrome flags applied to every session.
pub const DEFAULT_CHROME_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
];

// ============================================================================
// Locators & Elements
// ============================================================================

/// An element lookup strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector.
    Css(String),
    /// XPath expression.
    XPath(String),
}

impl Locator {
    /// CSS selector locator.
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// XPath locator.
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    fn using(&self) -> &'static str {
        match self {
            Self::Css(_) => "css selector",
            Self::XPath(_) => "xpath",
        }
    }

    fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::XPath(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.using(), self.value())
    }
}

/// Opaque reference to an element in the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(String);

impl ElementRef {
    /// Driver-assigned element id.
    pub fn id(&self) -> &str {
        &self.0
    }

    fn from_value(value: &Value) -> Result<Self, WebDriverError> {
        value
            .get(ELEMENT_KEY)
            .or_else(|| value.get("ELEMENT"))
            .and_then(Value::as_str)
            .map(|id| Self(id.to_string()))
            .ok_or_else(|| WebDriverError::InvalidResponse(format!("not an element: {value}")))
    }
}

// ============================================================================
// Browser Options
// ============================================================================

/// Options for a new browser session.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Extra Chrome command-line flags.
    pub args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            args: DEFAULT_CHROME_ARGS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl BrowserOptions {
    /// Builds the `capabilities` payload for `POST /session`.
    pub fn capabilities(&self) -> Value {
        let mut args = self.args.clone();
        if self.headless {
            args.push("--headless=new".to_string());
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "excludeSwitches": ["enable-automation"],
                        "useAutomationExtension": false
                    }
                }
            }
        })
    }
}

// ============================================================================
// WebDriver Client
// ============================================================================

/// HTTP client bound to one WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: Client,
    base: String,
}

impl WebDriverClient {
    /// Creates a client for the server at `base` (e.g. `http://127.0.0.1:9515`).
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, WebDriverError> {
        let http = Client::builder().timeout(timeout).build()?;
        let base = base.into().trim_end_matches('/').to_string();
        Ok(Self { http, base })
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Returns true if the server answers `/status` with `ready: true`.
    pub async fn is_ready(&self) -> bool {
        match self.command(Method::GET, "/status", None).await {
            Ok(value) => value.get("ready").and_then(Value::as_bool).unwrap_or(false),
            Err(e) => {
                debug!(error = %e, "WebDriver status probe failed");
                false
            }
        }
    }

    /// Polls `/status` until ready.
    pub async fn wait_ready(&self, timeout: Duration, poll: Duration) -> Result<(), WebDriverError> {
        let ready = poll_until(timeout, poll, || async {
            Ok(self.is_ready().await.then_some(()))
        })
        .await?;

        ready.ok_or_else(|| WebDriverError::NotReady {
            url: self.base.clone(),
            timeout,
        })
    }

    /// Opens a new browser session.
    #[instrument(skip(self, options), fields(server = %self.base))]
    pub async fn new_session(&self, options: &BrowserOptions) -> Result<BrowserSession, WebDriverError> {
        let value = self
            .command(Method::POST, "/session", Some(options.capabilities()))
            .await?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::InvalidResponse(format!("no sessionId in {value}")))?;

        info!(session = %id, headless = options.headless, "Browser session opened");
        Ok(BrowserSession {
            client: self.clone(),
            id: id.to_string(),
        })
    }

    /// Sends one command and unwraps the W3C `value` envelope.
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, WebDriverError> {
        let label = format!("{method} {path}");
        let url = format!("{}{path}", self.base);

        let mut request = self.http.request(method.clone(), &url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let mut envelope: Value = serde_json::from_str(&text).map_err(|_| {
            WebDriverError::InvalidResponse(format!("{label} returned HTTP {status}: {text}"))
        })?;
        let value = envelope.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(WebDriverError::Command {
                command: label,
                error: error.to_string(),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        if !status.is_success() {
            return Err(WebDriverError::InvalidResponse(format!(
                "{label} returned HTTP {status}"
            )));
        }

        // Some drivers still put the session id at the top level.
        if value.is_object() || value.is_null() {
            if let Some(session_id) = envelope.get("sessionId").filter(|v| v.is_string()) {
                let mut value = if value.is_null() { json!({}) } else { value };
                value["sessionId"] = session_id.clone();
                return Ok(value);
            }
        }

        Ok(value)
    }
}

// ============================================================================
// Browser Session
// ============================================================================

/// An open browser session. Call [`BrowserSession::quit`] when done.
#[derive(Debug)]
pub struct BrowserSession {
    client: WebDriverClient,
    id: String,
}

impl BrowserSession {
    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, WebDriverError> {
        let path = format!("/session/{}{path}", self.id);
        self.client.command(method, &path, body).await
    }

    /// Navigates to `url` and waits for the driver's load strategy.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        self.call(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        debug!("Navigation complete");
        Ok(())
    }

    /// Sets the timeout for asynchronous scripts.
    pub async fn set_script_timeout(&self, timeout: Duration) -> Result<(), WebDriverError> {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.call(Method::POST, "/timeouts", Some(json!({ "script": millis })))
            .await?;
        Ok(())
    }

    /// Finds one element. A missing element is `Ok(None)`.
    pub async fn find(&self, locator: &Locator) -> Result<Option<ElementRef>, WebDriverError> {
        let body = json!({ "using": locator.using(), "value": locator.value() });
        match self.call(Method::POST, "/element", Some(body)).await {
            Ok(value) => ElementRef::from_value(&value).map(Some),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns the first element matched by any locator, in order.
    pub async fn find_first(&self, locators: &[Locator]) -> Result<Option<ElementRef>, WebDriverError> {
        for locator in locators {
            if let Some(element) = self.find(locator).await? {
                debug!(locator = %locator, "Element found");
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// Polls [`Self::find_first`] until something matches or `timeout` elapses.
    pub async fn wait_for_any(
        &self,
        locators: &[Locator],
        timeout: Duration,
        poll: Duration,
    ) -> Result<Option<ElementRef>, WebDriverError> {
        poll_until(timeout, poll, || self.find_first(locators)).await
    }

    /// Polls until `locator` matches nothing. Returns false on timeout.
    pub async fn wait_until_absent(
        &self,
        locator: &Locator,
        timeout: Duration,
        poll: Duration,
    ) -> Result<bool, WebDriverError> {
        let gone = poll_until(timeout, poll, || async {
            match self.find(locator).await {
                Ok(Some(_)) => Ok(None),
                Ok(None) => Ok(Some(())),
                // Page replaced mid-lookup.
                Err(e) if e.is_stale_element() => Ok(Some(())),
                Err(e) => Err(e),
            }
        })
        .await?;
        Ok(gone.is_some())
    }

    /// Polls `document.readyState` until it is `complete`.
    pub async fn wait_for_document_ready(&self, timeout: Duration, poll: Duration) -> Result<(), WebDriverError> {
        let ready = poll_until(timeout, poll, || async {
            let state = self.execute("return document.readyState", Vec::new()).await?;
            Ok::<_, WebDriverError>((state.as_str() == Some("complete")).then_some(()))
        })
        .await?;

        ready.ok_or_else(|| WebDriverError::Timeout {
            condition: "document ready".to_string(),
            timeout,
        })
    }

    /// Clears a form control.
    pub async fn clear(&self, element: &ElementRef) -> Result<(), WebDriverError> {
        self.call(Method::POST, &format!("/element/{}/clear", element.id()), None)
            .await?;
        Ok(())
    }

    /// Types text into an element.
    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), WebDriverError> {
        self.call(
            Method::POST,
            &format!("/element/{}/value", element.id()),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    /// Clicks an element.
    pub async fn click(&self, element: &ElementRef) -> Result<(), WebDriverError> {
        self.call(Method::POST, &format!("/element/{}/click", element.id()), None)
            .await?;
        Ok(())
    }

    /// Runs a synchronous script and returns its result.
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, WebDriverError> {
        self.call(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Runs an asynchronous script. The completion callback is passed as the
    /// last argument.
    pub async fn execute_async(&self, script: &str, args: Vec<Value>) -> Result<Value, WebDriverError> {
        self.call(
            Method::POST,
            "/execute/async",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Closes the session and its browser.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn quit(self) -> Result<(), WebDriverError> {
        self.call(Method::DELETE, "", None).await?;
        info!("Browser session closed");
        Ok(())
    }
}

// ============================================================================
// Driver Handle
// ============================================================================

/// A WebDriver server, either external or spawned for this run.
#[derive(Debug)]
pub struct DriverHandle {
    client: WebDriverClient,
    process: Option<BackgroundProcess>,
}

impl DriverHandle {
    /// Attaches to an already running server.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, WebDriverError> {
        Ok(Self {
            client: WebDriverClient::new(url, timeout)?,
            process: None,
        })
    }

    /// Spawns `binary` on a free local port and waits until it is ready.
    #[instrument(skip(runner))]
    pub async fn launch(
        runner: &ProcessRunner,
        binary: &str,
        timeout: Duration,
        start_timeout: Duration,
        poll: Duration,
    ) -> Result<Self, WebDriverError> {
        let port = free_port().map_err(|e| WebDriverError::Process(e.into()))?;
        let mut process = runner.spawn_background(binary, &[format!("--port={port}")])?;
        let client = WebDriverClient::new(format!("http://127.0.0.1:{port}"), timeout)?;

        let started = poll_until(start_timeout, poll, || {
            let exited = process.ensure_running();
            let client = &client;
            async move {
                exited?;
                Ok::<_, WebDriverError>(client.is_ready().await.then_some(()))
            }
        })
        .await;

        match started {
            Ok(Some(())) => {
                debug!(port, "WebDriver server ready");
                Ok(Self {
                    client,
                    process: Some(process),
                })
            }
            Ok(None) => {
                process.shutdown().await;
                Err(WebDriverError::NotReady {
                    url: client.base_url().to_string(),
                    timeout: start_timeout,
                })
            }
            Err(e) => {
                process.shutdown().await;
                Err(e)
            }
        }
    }

    /// Client for this server.
    pub fn client(&self) -> &WebDriverClient {
        &self.client
    }

    /// Stops the server if it was spawned by us.
    pub async fn shutdown(self) {
        if let Some(process) = self.process {
            process.shutdown().await;
        }
    }
}

/// Asks the OS for an unused local port.
fn free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

// ============================================================================
// Polling
// ============================================================================

/// Calls `check` every `poll` until it yields `Some` or `timeout` elapses.
/// Errors from `check` end the wait immediately.
async fn poll_until<T, F, Fut>(timeout: Duration, poll: Duration, mut check: F) -> Result<Option<T>, WebDriverError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, WebDriverError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(found) = check().await? {
            return Ok(Some(found));
        }
        if Instant::now() >= deadline {
            warn!(timeout = ?timeout, "Wait condition not met");
            return Ok(None);
        }
        tokio::time::sleep(poll).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::StatusCode,
        routing::{delete, get, post},
        Json, Router,
    };

    const POLL: Duration = Duration::from_millis(10);

    async fn status() -> Json<Value> {
        Json(json!({"value": {"ready": true, "message": "ok"}}))
    }

    async fn new_session(Json(body): Json<Value>) -> Json<Value> {
        let args = &body["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"];
        assert!(args.is_array());
        Json(json!({"value": {"sessionId": "s1", "capabilities": {}}}))
    }

    async fn find(Path(id): Path<String>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        assert_eq!(id, "s1");
        if body["value"] == "input[type='password']" {
            (StatusCode::OK, Json(json!({"value": {ELEMENT_KEY: "e1"}})))
        } else {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"value": {
                    "error": "no such element",
                    "message": "Unable to locate element",
                    "stacktrace": ""
                }})),
            )
        }
    }

    async fn execute(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["script"], "return document.readyState");
        Json(json!({"value": "complete"}))
    }

    async fn quit() -> Json<Value> {
        Json(json!({"value": null}))
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn mock_driver() -> WebDriverClient {
        let app = Router::new()
            .route("/status", get(status))
            .route("/session", post(new_session))
            .route("/session/{id}", delete(quit))
            .route("/session/{id}/element", post(find))
            .route("/session/{id}/execute/sync", post(execute));
        let base = serve(app).await;
        WebDriverClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_capabilities() {
        let options = BrowserOptions {
            headless: true,
            ..Default::default()
        };
        let caps = options.capabilities();
        let chrome = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"];

        let args: Vec<&str> = chrome["args"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(args.contains(&"--disable-blink-features=AutomationControlled"));
        assert!(args.contains(&"--headless=new"));
        assert_eq!(chrome["excludeSwitches"], json!(["enable-automation"]));
        assert_eq!(chrome["useAutomationExtension"], false);
    }

    #[test]
    fn test_headed_by_default() {
        let caps = BrowserOptions::default().capabilities();
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"].to_string();
        assert!(!args.contains("headless"));
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(
            Locator::css("input[type='email']").to_string(),
            "css selector=input[type='email']"
        );
        assert_eq!(Locator::xpath("//button").using(), "xpath");
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let client = mock_driver().await;
        client.wait_ready(Duration::from_secs(1), POLL).await.unwrap();

        let session = client.new_session(&BrowserOptions::default()).await.unwrap();
        assert_eq!(session.id(), "s1");

        session
            .wait_for_document_ready(Duration::from_secs(1), POLL)
            .await
            .unwrap();

        let email = session.find(&Locator::css("input[type='email']")).await.unwrap();
        assert!(email.is_none());

        let found = session
            .find_first(&[
                Locator::css("input[type='email']"),
                Locator::css("input[type='password']"),
            ])
            .await
            .unwrap();
        assert_eq!(found.unwrap().id(), "e1");

        let gone = session
            .wait_until_absent(&Locator::css("input[type='password']"), Duration::from_millis(50), POLL)
            .await
            .unwrap();
        assert!(!gone);

        session.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_any_times_out_with_none() {
        let client = mock_driver().await;
        let session = client.new_session(&BrowserOptions::default()).await.unwrap();

        let found = session
            .wait_for_any(&[Locator::css("#missing")], Duration::from_millis(50), POLL)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_not_ready() {
        let port = free_port().unwrap();
        let client = WebDriverClient::new(format!("http://127.0.0.1:{port}"), Duration::from_millis(200)).unwrap();

        assert!(!client.is_ready().await);
        let err = client
            .wait_ready(Duration::from_millis(50), POLL)
            .await
            .unwrap_err();
        assert!(matches!(err, WebDriverError::NotReady { .. }));
    }

    #[tokio::test]
    async fn test_launch_missing_binary() {
        let runner = ProcessRunner::new();
        let err = DriverHandle::launch(
            &runner,
            "no_such_chromedriver_binary",
            Duration::from_secs(1),
            Duration::from_millis(100),
            POLL,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WebDriverError::Process(_)));
    }
}
