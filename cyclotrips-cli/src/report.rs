//! Run reports shared by the commands and the output formatters.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use cyclotrips_core::{FailureKind, TripStats};
use cyclotrips_fetch::{FetchError, HttpError, TokenSummary};
use cyclotrips_providers::CyclocityError;
use cyclotrips_store::StoreError;
use serde::{Serialize, Serializer};

use crate::ExitCode;

fn serialize_datetime<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// Stages
// ============================================================================

/// A step of the export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Arguments, credential and endpoint resolution.
    Config,
    /// Password grant.
    Token,
    /// One trip source attempt.
    Fetch,
    /// Mapping raw trips to the output schema.
    Normalize,
    /// Writing the dataset.
    Write,
}

impl Stage {
    /// Returns the stage label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Token => "token",
            Self::Fetch => "fetch",
            Self::Normalize => "normalize",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    /// Which stage.
    pub stage: Stage,
    /// Source id for fetch stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Whether it succeeded.
    pub ok: bool,
    /// One-line description.
    pub detail: String,
}

// ============================================================================
// Failure
// ============================================================================

/// The failure that ended a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    /// Classification, drives the exit code.
    pub kind: FailureKind,
    /// Error message.
    pub message: String,
    /// HTTP status, when the provider answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl FailureReport {
    /// Creates a failure without a status.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Exit code for this failure.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::for_failure(self.kind)
    }
}

impl From<FetchError> for FailureReport {
    fn from(err: FetchError) -> Self {
        Self {
            kind: err.failure_kind(),
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl From<CyclocityError> for FailureReport {
    fn from(err: CyclocityError) -> Self {
        Self::new(err.failure_kind(), err.to_string())
    }
}

impl From<StoreError> for FailureReport {
    fn from(err: StoreError) -> Self {
        Self::new(err.failure_kind(), err.to_string())
    }
}

impl From<HttpError> for FailureReport {
    fn from(err: HttpError) -> Self {
        Self::new(err.failure_kind(), err.to_string())
    }
}

// ============================================================================
// Export Report
// ============================================================================

/// Everything an export run did, in order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    /// When the run finished.
    #[serde(serialize_with = "serialize_datetime")]
    pub generated_at: DateTime<Utc>,
    /// `direct`, `browser` or `auto`.
    pub source_mode: String,
    /// Dataset path.
    pub output: PathBuf,
    /// Stage results in execution order.
    pub stages: Vec<StageReport>,
    /// Source that produced the trips.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Redacted token details for the direct source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenSummary>,
    /// Pages requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    /// Raw records received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<usize>,
    /// Records dropped by normalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    /// Figures for the written dataset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TripStats>,
    /// Set when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

impl ExportReport {
    /// Starts an empty report.
    pub fn new(source_mode: impl Into<String>, output: &Path) -> Self {
        Self {
            generated_at: Utc::now(),
            source_mode: source_mode.into(),
            output: output.to_path_buf(),
            stages: Vec::new(),
            source: None,
            token: None,
            pages: None,
            received: None,
            skipped: None,
            stats: None,
            failure: None,
        }
    }

    /// Records a stage.
    pub fn stage(&mut self, stage: Stage, ok: bool, detail: impl Into<String>) {
        self.stages.push(StageReport {
            stage,
            source: None,
            ok,
            detail: detail.into(),
        });
    }

    /// Records a fetch attempt for `source`.
    pub fn fetch_stage(&mut self, source: &str, ok: bool, detail: impl Into<String>) {
        self.stages.push(StageReport {
            stage: Stage::Fetch,
            source: Some(source.to_string()),
            ok,
            detail: detail.into(),
        });
    }

    /// Records a failed stage and ends the run with `failure`.
    pub fn fail(&mut self, stage: Stage, failure: FailureReport) {
        self.stage(stage, false, failure.message.clone());
        self.finish(failure);
    }

    /// Ends the run with `failure` without adding a stage line.
    pub fn finish(&mut self, failure: FailureReport) {
        self.generated_at = Utc::now();
        self.failure = Some(failure);
    }

    /// Returns true if the run completed.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Exit code for the run.
    pub fn exit_code(&self) -> ExitCode {
        self.failure.as_ref().map_or(ExitCode::Success, FailureReport::exit_code)
    }
}

// ============================================================================
// Small Command Reports
// ============================================================================

/// Result of a `credentials` action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsReport {
    /// `set`, `delete` or `status`.
    pub action: &'static str,
    /// Account username.
    pub username: String,
    /// Whether a password is stored after the action.
    pub stored: bool,
}

/// Result of a GeoJSON conversion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeojsonReport {
    /// Dataset read.
    pub input: PathBuf,
    /// File written.
    pub output: PathBuf,
    /// `routes` or `points`.
    pub layout: String,
    /// Trips in the dataset.
    pub trips: usize,
    /// Features written.
    pub features: usize,
    /// Trips without usable coordinates.
    pub skipped: usize,
}
