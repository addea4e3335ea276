//! Fetch context providing access to host APIs.
//!
//! The fetch context is passed to every trip source and gives unified
//! access to the HTTP client and process runner, plus the
//! settings gathered from the command line.

use std::sync::Arc;
use std::time::Duration;

use crate::error::HttpError;
use crate::host::{
    http::{HttpClient, DEFAULT_TIMEOUT_SECS},
    process::ProcessRunner,
};
use crate::strategy::SourceKind;

// ============================================================================
// Source Mode
// ============================================================================

/// Which trip sources a run may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceMode {
    /// Password grant and HTTP fetch only.
    #[default]
    Direct,
    /// Browser session only.
    Browser,
    /// Direct first, browser when the direct path is blocked.
    Auto,
}

impl SourceMode {
    /// Returns true if this mode allows the given source kind.
    pub fn allows(&self, kind: SourceKind) -> bool {
        match self {
            Self::Auto => true,
            Self::Direct => kind == SourceKind::DirectGrant,
            Self::Browser => kind == SourceKind::BrowserSession,
        }
    }

    /// Name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Browser => "browser",
            Self::Auto => "auto",
        }
    }
}

impl std::str::FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "browser" => Ok(Self::Browser),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown source mode '{other}' (expected direct, browser or auto)")),
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Browser Settings
// ============================================================================

/// Settings for the browser-session source.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Existing WebDriver server to attach to. When unset, a driver is spawned.
    pub webdriver_url: Option<String>,
    /// Driver binary name or path.
    pub driver_binary: String,
    /// Run the browser without a window.
    pub headless: bool,
    /// How long to wait for the login form.
    pub element_timeout: Duration,
    /// How long to wait for the page to finish loading.
    pub ready_timeout: Duration,
    /// Interval between polls.
    pub poll_interval: Duration,
    /// How long a spawned driver has to become ready.
    pub driver_start_timeout: Duration,
    /// Timeout for in-page asynchronous scripts.
    pub script_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            driver_binary: "chromedriver".to_string(),
            headless: false,
            element_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
            driver_start_timeout: Duration::from_secs(15),
            script_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Which trip sources to allow.
    pub source_mode: SourceMode,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Browser-session settings.
    pub browser: BrowserSettings,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            source_mode: SourceMode::Direct,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            browser: BrowserSettings::default(),
        }
    }
}

impl FetchSettings {
    /// Returns settings with a custom HTTP timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Context provided to trip sources, giving access to host APIs.
pub struct FetchContext {
    /// HTTP client with tracing.
    pub http: Arc<HttpClient>,
    /// Process runner for the WebDriver server.
    pub process: Arc<ProcessRunner>,
    /// Fetch settings.
    pub settings: FetchSettings,
}

impl FetchContext {
    /// Creates a context with default host APIs and settings.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }

    /// Returns the HTTP timeout.
    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// Returns true if the configured mode allows the given source kind.
    pub fn allows_source(&self, kind: SourceKind) -> bool {
        self.settings.source_mode.allows(kind)
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a `FetchContext`.
#[derive(Default)]
pub struct FetchContextBuilder {
    http: Option<Arc<HttpClient>>,
    process: Option<Arc<ProcessRunner>>,
    allowed_domains: Option<Vec<String>>,
    settings: FetchSettings,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP client. Overrides the timeout and allowlist settings.
    #[must_use]
    pub fn http(mut self, http: Arc<HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the process runner.
    #[must_use]
    pub fn process(mut self, process: Arc<ProcessRunner>) -> Self {
        self.process = Some(process);
        self
    }

    /// Restricts the default HTTP client to these domains.
    #[must_use]
    pub fn allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Sets the fetch settings.
    #[must_use]
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the source mode.
    #[must_use]
    pub fn source_mode(mut self, mode: SourceMode) -> Self {
        self.settings.source_mode = mode;
        self
    }

    /// Sets the HTTP timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Builds the fetch context.
    pub fn build(self) -> Result<FetchContext, HttpError> {
        let http = match self.http {
            Some(http) => http,
            None => {
                let mut client = HttpClient::with_timeout(self.settings.timeout)?;
                if let Some(domains) = self.allowed_domains {
                    client = client.with_allowed_domains(domains);
                }
                Arc::new(client)
            }
        };

        Ok(FetchContext {
            http,
            process: self.process.unwrap_or_else(|| Arc::new(ProcessRunner::new())),
            settings: self.settings,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
