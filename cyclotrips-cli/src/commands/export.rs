//! Export command - fetch trips and write the dataset.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use cyclotrips_core::normalize;
use cyclotrips_fetch::{
    BrowserSettings, FetchContext, FetchSettings, KeychainApi, SourceMode, SystemKeychain, TripRequest,
    MAX_PAGE_LENGTH,
};
use cyclotrips_providers::cyclocity::DEFAULT_CONTRACT;
use cyclotrips_providers::{cyclocity_pipeline, CyclocityAccount, CyclocityEndpoints};
use cyclotrips_store::{write_dataset, CredentialStore, SecretSource, DEFAULT_OUTPUT_PATH};
use tracing::{debug, info, warn};

use crate::output::{JsonFormatter, TextFormatter};
use crate::report::{ExportReport, FailureReport, Stage};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the export command.
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Account username (e-mail).
    #[arg(long, short, env = "CYCLOTRIPS_USERNAME")]
    pub username: Option<String>,

    /// Account password. Falls back to the system keychain.
    #[arg(long, env = "CYCLOTRIPS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Cyclocity account identifier.
    #[arg(long, env = "CYCLOTRIPS_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Bike-share contract (city).
    #[arg(long, env = "CYCLOTRIPS_CONTRACT", default_value = DEFAULT_CONTRACT)]
    pub contract: String,

    /// Dataset path.
    #[arg(long, short, env = "CYCLOTRIPS_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    pub output: PathBuf,

    /// Trip source (direct, browser, auto).
    #[arg(long, env = "CYCLOTRIPS_SOURCE", default_value = "direct")]
    pub source: SourceMode,

    /// Attach to a running WebDriver server instead of launching one.
    #[arg(long, env = "CYCLOTRIPS_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// WebDriver binary to launch for the browser source.
    #[arg(long, env = "CYCLOTRIPS_CHROMEDRIVER", default_value = "chromedriver")]
    pub chromedriver: String,

    /// Run the browser without a window.
    #[arg(long)]
    pub headless: bool,

    /// HTTP timeout in seconds.
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Follow pages until a short one comes back.
    #[arg(long)]
    pub all_pages: bool,

    /// Index of the first trip.
    #[arg(long, default_value = "0")]
    pub offset: u32,

    /// Trips per page (at most 1000).
    #[arg(long, default_value_t = MAX_PAGE_LENGTH)]
    pub length: u32,

    /// Identity provider base URL.
    #[arg(long, env = "CYCLOTRIPS_IAM_URL")]
    pub iam_url: Option<String>,

    /// Trip API base URL.
    #[arg(long, env = "CYCLOTRIPS_API_URL")]
    pub api_url: Option<String>,

    /// Account page opened by the browser source.
    #[arg(long, env = "CYCLOTRIPS_ACCOUNT_PAGE_URL")]
    pub account_page_url: Option<String>,
}

/// Runs the export command.
pub async fn run(args: &ExportArgs, cli: &Cli) -> Result<ExitCode> {
    let keychain: Arc<dyn KeychainApi> = Arc::new(SystemKeychain::new());
    let report = execute(args, keychain).await;

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&report)?),
        OutputFormat::Text if !cli.quiet => {
            println!("{}", TextFormatter::new(!cli.no_color).format_export(&report));
        }
        OutputFormat::Text => {}
    }

    Ok(report.exit_code())
}

// ============================================================================
// Export Flow
// ============================================================================

struct ExportPlan {
    ctx: FetchContext,
    endpoints: CyclocityEndpoints,
    account: CyclocityAccount,
    request: TripRequest,
    secret_source: SecretSource,
}

fn endpoints(args: &ExportArgs) -> Result<CyclocityEndpoints, FailureReport> {
    let mut endpoints = CyclocityEndpoints::default();
    if let Some(url) = &args.iam_url {
        endpoints = endpoints.with_iam_base(url)?;
    }
    if let Some(url) = &args.api_url {
        endpoints = endpoints.with_api_base(url)?;
    }
    if let Some(url) = &args.account_page_url {
        endpoints = endpoints.with_account_page(url)?;
    }
    Ok(endpoints)
}

fn settings(args: &ExportArgs) -> FetchSettings {
    FetchSettings {
        source_mode: args.source,
        browser: BrowserSettings {
            webdriver_url: args.webdriver_url.clone(),
            driver_binary: args.chromedriver.clone(),
            headless: args.headless,
            ..BrowserSettings::default()
        },
        ..FetchSettings::default()
    }
    .with_timeout(Duration::from_secs(args.timeout))
}

async fn plan(args: &ExportArgs, keychain: Arc<dyn KeychainApi>) -> Result<ExportPlan, FailureReport> {
    let endpoints = endpoints(args)?;
    let account = CyclocityAccount::new(&args.contract, args.account_id.as_deref().unwrap_or_default())?;

    let resolved = CredentialStore::new(keychain)
        .resolve(args.username.as_deref().unwrap_or_default(), args.password.as_deref())
        .await?;

    let ctx = FetchContext::builder()
        .allowed_domains(endpoints.allowed_domains())
        .settings(settings(args))
        .build()?;

    let request = TripRequest::new(resolved.credential)
        .with_offset(args.offset)
        .with_length(args.length)
        .with_all_pages(args.all_pages);

    Ok(ExportPlan {
        ctx,
        endpoints,
        account,
        request,
        secret_source: resolved.source,
    })
}

/// Runs the whole export and reports each stage.
///
/// The dataset is only written once trips were fetched; any earlier failure
/// leaves the previous file in place.
pub async fn execute(args: &ExportArgs, keychain: Arc<dyn KeychainApi>) -> ExportReport {
    let mut report = ExportReport::new(args.source.as_str(), &args.output);

    let plan = match plan(args, keychain).await {
        Ok(plan) => plan,
        Err(failure) => {
            report.fail(Stage::Config, failure);
            return report;
        }
    };
    report.stage(
        Stage::Config,
        true,
        format!(
            "contract {}, password from {}, source {}",
            plan.account.contract, plan.secret_source, args.source
        ),
    );

    // Fetch
    let outcome = cyclocity_pipeline(&plan.ctx, &plan.endpoints, &plan.account)
        .execute(&plan.ctx, &plan.request)
        .await;
    debug!(attempts = outcome.attempts_count(), elapsed = ?outcome.duration, "Pipeline finished");

    for attempt in &outcome.attempts {
        if attempt.success {
            if let Some(token) = outcome.result.as_ref().ok().and_then(|r| r.token.as_ref()) {
                report.stage(
                    Stage::Token,
                    true,
                    format!("{} (expires in {}s)", token.preview, token.expires_in),
                );
            }
        }
        let detail = match (&attempt.error, &outcome.result) {
            (Some(error), _) => error.clone(),
            (None, Ok(result)) => format!("{} trips in {} page(s)", result.trips.len(), result.pages),
            (None, Err(_)) => "ok".to_string(),
        };
        report.fetch_stage(&attempt.source_id, attempt.success, detail);
    }

    let fetched = match outcome.result {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!(error = %e, "No trips fetched");
            let failure = FailureReport::from(e);
            if outcome.attempts.is_empty() {
                report.fail(Stage::Fetch, failure);
            } else {
                report.finish(failure);
            }
            return report;
        }
    };
    report.source = Some(fetched.source_id.clone());
    report.token = fetched.token.clone();
    report.pages = Some(fetched.pages);
    report.received = Some(fetched.trips.len());

    // Normalize
    let dataset = normalize(&fetched.trips);
    let skipped = fetched.trips.len() - dataset.len();
    report.skipped = Some(skipped);
    report.stage(
        Stage::Normalize,
        true,
        format!("{} trips ({skipped} skipped)", dataset.len()),
    );

    // Write
    if let Err(e) = write_dataset(&dataset, &args.output).await {
        report.fail(Stage::Write, e.into());
        return report;
    }
    report.stage(Stage::Write, true, format!("wrote {}", args.output.display()));

    let stats = dataset.stats();
    info!(trips = stats.trips, total = %stats.total_duration_display(), "Export complete");
    report.stats = Some(stats);
    report
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
    use clap::Parser;
    use cyclotrips_core::FailureKind;
    use cyclotrips_fetch::KeychainError;
    use serde_json::json;
    use tempfile::TempDir;

    const TOKEN_PATH: &str = "/realms/vls-default/protocol/openid-connect/token";
    const TRIPS_PATH: &str = "/contracts/{contract}/accounts/{account}/trips";

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ExportArgs,
    }

    struct EmptyKeychain;

    #[async_trait]
    impl KeychainApi for EmptyKeychain {
        async fn get(&self, _: &str, _: &str) -> Result<Option<String>, KeychainError> {
            Ok(None)
        }

        async fn set(&self, _: &str, _: &str, _: &str) -> Result<(), KeychainError> {
            Ok(())
        }

        async fn delete(&self, _: &str, _: &str) -> Result<(), KeychainError> {
            Ok(())
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn args(base: &str, output: &std::path::Path, extra: &[&str]) -> ExportArgs {
        let output = output.to_string_lossy().into_owned();
        let mut argv = vec![
            "cyclotrips",
            "--username",
            "rider@example.com",
            "--password",
            "correct horse",
            "--account-id",
            "acct-42",
            "--contract",
            "lyon",
            "--iam-url",
            base,
            "--api-url",
            base,
            "--output",
            &output,
        ];
        argv.extend_from_slice(extra);
        Harness::try_parse_from(argv).unwrap().args
    }

    fn trip() -> serde_json::Value {
        json!({
            "id": "t1",
            "startTime": "2025-03-01T08:12:00Z",
            "endTime": "2025-03-01T08:27:00Z",
            "duration": 15,
            "startStation": {"name": "A", "latitude": 45.76, "longitude": 4.86},
            "endStation": {"name": "B", "latitude": 45.75, "longitude": 4.83}
        })
    }

    #[tokio::test]
    async fn test_export_success() {
        let app = Router::new()
            .route(
                TOKEN_PATH,
                post(|| async { Json(json!({"access_token": "abc", "expires_in": 600})) }),
            )
            .route(TRIPS_PATH, get(|| async { Json(json!([trip(), 42])) }));
        let base = serve(app).await;
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("public").join("velov-trips.json");

        let report = execute(&args(&base, &output, &[]), Arc::new(EmptyKeychain)).await;

        assert!(report.is_success(), "{:?}", report.failure);
        assert_eq!(report.exit_code(), ExitCode::Success);
        assert_eq!(report.source.as_deref(), Some("cyclocity.direct"));
        assert_eq!(report.received, Some(2));
        assert_eq!(report.skipped, Some(1));
        assert_eq!(report.stats.unwrap().trips, 1);

        let stages: Vec<_> = report.stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            [Stage::Config, Stage::Token, Stage::Fetch, Stage::Normalize, Stage::Write]
        );
        assert_eq!(report.stages[1].detail, "*** (expires in 600s)");

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written[0]["id"], "t1");
        assert_eq!(written[0]["bikeType"], "classic");
    }

    #[tokio::test]
    async fn test_rejected_token_keeps_output_untouched() {
        let app = Router::new().route(
            TOKEN_PATH,
            post(|| async { (StatusCode::UNAUTHORIZED, r#"{"error":"invalid_grant"}"#) }),
        );
        let base = serve(app).await;
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("velov-trips.json");
        std::fs::write(&output, "[]").unwrap();

        let report = execute(&args(&base, &output, &[]), Arc::new(EmptyKeychain)).await;

        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Auth);
        assert_eq!(failure.status, Some(401));
        assert_eq!(report.exit_code(), ExitCode::Auth);
        assert_ne!(report.exit_code() as i32, 0);
        assert!(report.stages.iter().all(|s| s.stage != Stage::Write));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_missing_account_id_is_config_failure() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("velov-trips.json");
        let mut args = args("http://127.0.0.1:9", &output, &[]);
        args.account_id = None;

        let report = execute(&args, Arc::new(EmptyKeychain)).await;

        assert_eq!(report.failure.as_ref().unwrap().kind, FailureKind::Config);
        assert_eq!(report.exit_code(), ExitCode::Error);
        assert_eq!(report.stages.len(), 1);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_missing_password_without_keychain_entry() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("velov-trips.json");
        let mut args = args("http://127.0.0.1:9", &output, &[]);
        args.password = None;

        let report = execute(&args, Arc::new(EmptyKeychain)).await;

        let failure = report.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Config);
        assert!(failure.message.contains("rider@example.com"));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_response_exit_code() {
        let app = Router::new()
            .route(
                TOKEN_PATH,
                post(|| async { Json(json!({"access_token": "abc", "expires_in": 600})) }),
            )
            .route(
                TRIPS_PATH,
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let base = serve(app).await;
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("velov-trips.json");

        let report = execute(&args(&base, &output, &[]), Arc::new(EmptyKeychain)).await;

        assert_eq!(report.exit_code(), ExitCode::Response);
        assert_eq!(report.failure.unwrap().status, Some(500));
        assert!(!output.exists());
    }

    #[test]
    fn test_defaults() {
        let args = Harness::try_parse_from(["cyclotrips"]).unwrap().args;
        assert_eq!(args.length, 1000);
        assert_eq!(args.offset, 0);
        assert!(!args.all_pages);
        assert!(!args.headless);
    }
}
