//! Source pipeline.
//!
//! Runs the trip sources allowed by the context's [`SourceMode`] in
//! priority order. A source that fails with an error it considers
//! recoverable hands over to the next one; every other error ends the run.
//! Each source is tried at most once.
//!
//! [`SourceMode`]: crate::context::SourceMode

use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::context::FetchContext;
use crate::error::FetchError;
use crate::strategy::{FetchResult, SourceKind, TripRequest, TripSource};

// ============================================================================
// Fetch Attempt
// ============================================================================

/// Record of a single source attempt.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// The source that was attempted.
    pub source_id: String,
    /// The kind of source.
    pub kind: SourceKind,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Error if the attempt failed.
    pub error: Option<String>,
    /// How long the attempt took.
    pub duration: Duration,
}

impl FetchAttempt {
    /// Creates a successful attempt record.
    pub fn success(source_id: impl Into<String>, kind: SourceKind, duration: Duration) -> Self {
        Self {
            source_id: source_id.into(),
            kind,
            success: true,
            error: None,
            duration,
        }
    }

    /// Creates a failed attempt record.
    pub fn failure(
        source_id: impl Into<String>,
        kind: SourceKind,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            kind,
            success: false,
            error: Some(error.into()),
            duration,
        }
    }
}

// ============================================================================
// Fetch Outcome
// ============================================================================

/// The outcome of a pipeline run.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The result (success or final error).
    pub result: Result<FetchResult, FetchError>,
    /// All attempts made.
    pub attempts: Vec<FetchAttempt>,
    /// Total duration of all attempts.
    pub duration: Duration,
}

impl FetchOutcome {
    /// Returns true if the fetch succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the number of sources that were tried.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the successful source ID, if any.
    pub fn successful_source(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|r| r.source_id.as_str())
    }

    /// Returns all errors that occurred.
    pub fn errors(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_deref())
            .collect()
    }
}

// ============================================================================
// Fetch Pipeline
// ============================================================================

/// Trip sources tried in priority order.
#[derive(Default)]
pub struct FetchPipeline {
    sources: Vec<Box<dyn TripSource>>,
}

impl FetchPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline with the given sources.
    pub fn with_sources(sources: Vec<Box<dyn TripSource>>) -> Self {
        let mut pipeline = Self { sources };
        pipeline.sort_by_priority();
        pipeline
    }

    fn sort_by_priority(&mut self) {
        self.sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Returns the number of sources in the pipeline.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Runs allowed sources in order until one succeeds or one fails for good.
    #[instrument(skip_all, fields(mode = %ctx.settings.source_mode, sources = self.sources.len()))]
    pub async fn execute(&self, ctx: &FetchContext, request: &TripRequest) -> FetchOutcome {
        let start = Instant::now();
        let mut attempts = Vec::new();
        let mut last_error = None;

        for source in &self.sources {
            let source_id = source.id();
            let kind = source.kind();

            if !ctx.allows_source(kind) {
                debug!(source = %source_id, "Source excluded by mode");
                continue;
            }

            if !source.is_available(ctx).await {
                debug!(source = %source_id, "Source not available, skipping");
                attempts.push(FetchAttempt::failure(source_id, kind, "Not available", Duration::ZERO));
                // Keep an earlier source's error.
                if last_error.is_none() {
                    last_error = Some(FetchError::SourceNotAvailable(format!(
                        "{} is not available",
                        source.display_name()
                    )));
                }
                continue;
            }

            let attempt_start = Instant::now();
            debug!(source = %source_id, "Executing source");

            match source.fetch(ctx, request).await {
                Ok(result) => {
                    let duration = attempt_start.elapsed();
                    info!(
                        source = %source_id,
                        trips = result.trips.len(),
                        duration = ?duration,
                        "Source succeeded"
                    );
                    attempts.push(FetchAttempt::success(source_id, kind, duration));

                    return FetchOutcome {
                        result: Ok(result),
                        attempts,
                        duration: start.elapsed(),
                    };
                }
                Err(error) => {
                    let duration = attempt_start.elapsed();
                    warn!(
                        source = %source_id,
                        error = %error,
                        duration = ?duration,
                        "Source failed"
                    );
                    attempts.push(FetchAttempt::failure(source_id, kind, error.to_string(), duration));

                    if !source.should_fallback(&error) {
                        debug!(source = %source_id, "Error is final, not falling back");
                        return FetchOutcome {
                            result: Err(error),
                            attempts,
                            duration: start.elapsed(),
                        };
                    }
                    last_error = Some(error);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            FetchError::SourceNotAvailable(format!(
                "no source allowed by mode '{}'",
                ctx.settings.source_mode
            ))
        });
        warn!(error = %error, "No source produced trips");

        FetchOutcome {
            result: Err(error),
            attempts,
            duration: start.elapsed(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SourceMode;
    use async_trait::async_trait;
    use cyclotrips_core::Credential;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockSource {
        id: String,
        kind: SourceKind,
        available: bool,
        fail_with: Option<fn() -> FetchError>,
        calls: Arc<AtomicUsize>,
    }

    impl MockSource {
        fn ok(id: &str, kind: SourceKind) -> Self {
            Self {
                id: id.to_string(),
                kind,
                available: true,
                fail_with: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(id: &str, kind: SourceKind, error: fn() -> FetchError) -> Self {
            Self {
                fail_with: Some(error),
                ..Self::ok(id, kind)
            }
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }
    }

    #[async_trait]
    impl TripSource for MockSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn is_available(&self, _ctx: &FetchContext) -> bool {
            self.available
        }

        async fn fetch(&self, _ctx: &FetchContext, _req: &TripRequest) -> Result<FetchResult, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(error) => Err(error()),
                None => Ok(FetchResult::new(vec![json!({"id": "t1"})], self.id.clone(), self.kind)),
            }
        }
    }

    fn ctx(mode: SourceMode) -> FetchContext {
        FetchContext::builder().source_mode(mode).build().unwrap()
    }

    fn request() -> TripRequest {
        TripRequest::new(Credential::new("rider", "secret"))
    }

    fn blocked() -> FetchError {
        FetchError::Status {
            status: 403,
            message: "Forbidden".to_string(),
        }
    }

    fn rejected() -> FetchError {
        FetchError::AuthenticationFailed {
            status: Some(401),
            message: "invalid_grant".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let pipeline = FetchPipeline::new();
        let outcome = pipeline.execute(&ctx(SourceMode::Auto), &request()).await;

        assert!(!outcome.is_success());
        assert!(matches!(outcome.result, Err(FetchError::SourceNotAvailable(_))));
    }

    #[tokio::test]
    async fn test_direct_mode_skips_browser() {
        let pipeline = FetchPipeline::with_sources(vec![
            Box::new(MockSource::failing("direct", SourceKind::DirectGrant, blocked)),
            Box::new(MockSource::ok("browser", SourceKind::BrowserSession)),
        ]);

        let outcome = pipeline.execute(&ctx(SourceMode::Direct), &request()).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts_count(), 1);
        assert_eq!(outcome.result.unwrap_err().status(), Some(403));
    }

    #[tokio::test]
    async fn test_auto_falls_back_when_blocked() {
        let pipeline = FetchPipeline::with_sources(vec![
            Box::new(MockSource::ok("browser", SourceKind::BrowserSession)),
            Box::new(MockSource::failing("direct", SourceKind::DirectGrant, blocked)),
        ]);

        let outcome = pipeline.execute(&ctx(SourceMode::Auto), &request()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts_count(), 2);
        assert_eq!(outcome.attempts[0].source_id, "direct");
        assert_eq!(outcome.successful_source(), Some("browser"));
    }

    #[tokio::test]
    async fn test_auto_does_not_fall_back_on_bad_credentials() {
        let browser = MockSource::ok("browser", SourceKind::BrowserSession);
        let browser_calls = Arc::clone(&browser.calls);

        let pipeline = FetchPipeline::with_sources(vec![
            Box::new(MockSource::failing("direct", SourceKind::DirectGrant, rejected)),
            Box::new(browser),
        ]);

        let outcome = pipeline.execute(&ctx(SourceMode::Auto), &request()).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts_count(), 1);
        assert_eq!(browser_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_each_source_runs_once() {
        let direct = MockSource::failing("direct", SourceKind::DirectGrant, blocked);
        let direct_calls = Arc::clone(&direct.calls);
        let browser = MockSource::failing("browser", SourceKind::BrowserSession, blocked);
        let browser_calls = Arc::clone(&browser.calls);

        let pipeline = FetchPipeline::with_sources(vec![Box::new(direct), Box::new(browser)]);
        let outcome = pipeline.execute(&ctx(SourceMode::Auto), &request()).await;

        assert!(!outcome.is_success());
        assert_eq!(direct_calls.load(Ordering::SeqCst), 1);
        assert_eq!(browser_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.errors().len(), 2);
        assert_eq!(outcome.result.unwrap_err().status(), Some(403));
    }

    #[tokio::test]
    async fn test_unavailable_browser_reported() {
        let pipeline = FetchPipeline::with_sources(vec![Box::new(
            MockSource::ok("browser", SourceKind::BrowserSession).unavailable(),
        )]);

        let outcome = pipeline.execute(&ctx(SourceMode::Browser), &request()).await;

        assert!(matches!(outcome.result, Err(FetchError::SourceNotAvailable(_))));
        assert_eq!(outcome.errors(), vec!["Not available"]);
    }
}
