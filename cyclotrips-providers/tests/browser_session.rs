//! Browser-session source against a scripted WebDriver server.
//!
//! The mock plays both the driver and the page: element lookups reflect
//! whether the login form is showing, and the in-page fetch answers according
//! to whether the session has logged in.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use common::*;
use cyclotrips_core::FailureKind;
use cyclotrips_fetch::{BrowserSettings, FetchContext, FetchError, FetchSettings, SourceMode, TripRequest, TripSource};
use cyclotrips_providers::cyclocity::{BrowserTripFetch, CyclocityEndpoints};
use cyclotrips_providers::{BrowserSessionStrategy, CyclocityError};
use serde_json::{json, Value};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Default)]
struct Page {
    form_showing: bool,
    logged_in: bool,
    typed: Vec<String>,
    fetched_urls: Vec<String>,
    visited: Vec<String>,
    quit: bool,
}

type Shared = Arc<Mutex<Page>>;

fn value(v: Value) -> Json<Value> {
    Json(json!({ "value": v }))
}

fn no_such_element() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        value(json!({"error": "no such element", "message": "Unable to locate element", "stacktrace": ""})),
    )
}

async fn status() -> Json<Value> {
    value(json!({"ready": true, "message": "ready"}))
}

async fn new_session() -> Json<Value> {
    value(json!({"sessionId": "s1", "capabilities": {"browserName": "chrome"}}))
}

async fn ok() -> Json<Value> {
    value(Value::Null)
}

async fn navigate(State(page): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let url = body["url"].as_str().unwrap_or_default().to_string();
    page.lock().unwrap().visited.push(url);
    value(Value::Null)
}

async fn execute_sync() -> Json<Value> {
    value(json!("complete"))
}

async fn find(State(page): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let page = page.lock().unwrap();
    if !page.form_showing {
        return no_such_element();
    }
    let id = match body["value"].as_str() {
        Some("input[type='email']") => "email",
        Some("input[type='password']") => "password",
        Some("button[type='submit']") => "submit",
        _ => return no_such_element(),
    };
    (StatusCode::OK, value(json!({ ELEMENT_KEY: id })))
}

async fn send_keys(
    State(page): State<Shared>,
    Path((_, element)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    page.lock().unwrap().typed.push(format!("{element}={text}"));
    value(Value::Null)
}

async fn click(State(page): State<Shared>, Path((_, element)): Path<(String, String)>) -> Json<Value> {
    let mut page = page.lock().unwrap();
    if element == "submit" && page.typed.iter().any(|t| t == "password=correct horse") {
        page.form_showing = false;
        page.logged_in = true;
    }
    value(Value::Null)
}

async fn execute_async(State(page): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut page = page.lock().unwrap();
    let url = body["args"][0].as_str().unwrap_or_default().to_string();
    assert_eq!(body["args"][1], "application/vnd.trip.v5+json");
    page.fetched_urls.push(url);

    if page.logged_in {
        let trips = json!([sample_trip()]).to_string();
        value(json!({"status": 200, "ok": true, "body": trips}))
    } else {
        value(json!({"status": 401, "ok": false, "body": "{\"error\":\"unauthorized\"}"}))
    }
}

async fn quit(State(page): State<Shared>) -> Json<Value> {
    page.lock().unwrap().quit = true;
    value(Value::Null)
}

async fn mock_browser(initial: Page) -> (String, Shared) {
    let page = Arc::new(Mutex::new(initial));
    let app = Router::new()
        .route("/status", get(status))
        .route("/session", post(new_session))
        .route("/session/{id}", delete(quit))
        .route("/session/{id}/timeouts", post(ok))
        .route("/session/{id}/url", post(navigate))
        .route("/session/{id}/execute/sync", post(execute_sync))
        .route("/session/{id}/execute/async", post(execute_async))
        .route("/session/{id}/element", post(find))
        .route("/session/{id}/element/{element}/clear", post(ok))
        .route("/session/{id}/element/{element}/value", post(send_keys))
        .route("/session/{id}/element/{element}/click", post(click))
        .with_state(Arc::clone(&page));
    (serve(app).await, page)
}

fn browser_context(webdriver_url: String) -> (FetchContext, CyclocityEndpoints) {
    let endpoints = CyclocityEndpoints::default()
        .with_account_page("https://velov.example.test/fr/my-account#TRIPS")
        .unwrap();
    let settings = FetchSettings {
        source_mode: SourceMode::Browser,
        browser: BrowserSettings {
            webdriver_url: Some(webdriver_url),
            element_timeout: Duration::from_millis(200),
            ready_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            driver_start_timeout: Duration::from_secs(1),
            script_timeout: Duration::from_secs(5),
            ..BrowserSettings::default()
        },
        ..FetchSettings::default()
    };
    (context_with(&endpoints, settings), endpoints)
}

#[tokio::test]
async fn test_login_form_then_in_page_fetch() {
    let (url, page) = mock_browser(Page {
        form_showing: true,
        ..Page::default()
    })
    .await;
    let (ctx, endpoints) = browser_context(url);
    let source = BrowserSessionStrategy::new(endpoints, account());

    let result = source.fetch(&ctx, &TripRequest::new(credential())).await.unwrap();

    assert_eq!(result.source_id, "cyclocity.browser");
    assert_eq!(result.trips, vec![sample_trip()]);
    assert!(result.token.is_none());

    let page = page.lock().unwrap();
    assert_eq!(page.visited, ["https://velov.example.test/fr/my-account#TRIPS"]);
    assert_eq!(page.typed, ["email=rider@example.com", "password=correct horse"]);
    assert_eq!(page.fetched_urls.len(), 1);
    assert!(page.fetched_urls[0].ends_with("/contracts/lyon/accounts/acct-42/trips?offset=0&length=1000"));
    assert!(page.quit);
}

#[tokio::test]
async fn test_rejected_login_reports_auth_failure_and_quits() {
    let (url, page) = mock_browser(Page {
        form_showing: true,
        ..Page::default()
    })
    .await;
    let (ctx, endpoints) = browser_context(url);
    let account = account();
    let wrong = cyclotrips_core::Credential::new("rider@example.com", "wrong");

    let err = BrowserTripFetch::new(&ctx, &endpoints, &account)
        .fetch(&TripRequest::new(wrong))
        .await
        .unwrap_err();

    assert!(matches!(err, CyclocityError::LoginFormStillPresent));
    assert_eq!(err.failure_kind(), FailureKind::Auth);

    let page = page.lock().unwrap();
    assert!(page.fetched_urls.is_empty());
    assert!(page.quit);
}

#[tokio::test]
async fn test_no_form_and_no_session_is_auth_failure() {
    let (url, page) = mock_browser(Page::default()).await;
    let (ctx, endpoints) = browser_context(url);
    let source = BrowserSessionStrategy::new(endpoints, account());

    let err = source
        .fetch(&ctx, &TripRequest::new(credential()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::AuthenticationFailed { status: Some(401), .. }));

    let page = page.lock().unwrap();
    assert_eq!(page.fetched_urls.len(), 1);
    assert!(page.fetched_urls[0].ends_with("offset=0&length=1"));
    assert!(page.quit);
}

#[tokio::test]
async fn test_no_form_with_live_session() {
    let (url, page) = mock_browser(Page {
        logged_in: true,
        ..Page::default()
    })
    .await;
    let (ctx, endpoints) = browser_context(url);
    let source = BrowserSessionStrategy::new(endpoints, account());

    let result = source.fetch(&ctx, &TripRequest::new(credential())).await.unwrap();
    assert_eq!(result.trips.len(), 1);

    let page = page.lock().unwrap();
    assert!(page.typed.is_empty());
    // Probe first, then the real page.
    assert_eq!(page.fetched_urls.len(), 2);
    assert!(page.quit);
}

#[tokio::test]
async fn test_unreachable_driver_is_automation_failure() {
    let (ctx, endpoints) = browser_context(dead_url());
    let source = BrowserSessionStrategy::new(endpoints, account());

    let err = source
        .fetch(&ctx, &TripRequest::new(credential()))
        .await
        .unwrap_err();

    assert_eq!(err.failure_kind(), FailureKind::Automation);
}
