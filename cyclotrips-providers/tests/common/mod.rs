//! Shared helpers for provider integration tests.

#![allow(dead_code)]

use axum::Router;
use cyclotrips_core::Credential;
use cyclotrips_fetch::{FetchContext, FetchSettings};
use cyclotrips_providers::{CyclocityAccount, CyclocityEndpoints};
use serde_json::{json, Value};

pub const TOKEN_PATH: &str = "/realms/vls-default/protocol/openid-connect/token";
pub const TRIPS_PATH: &str = "/contracts/{contract}/accounts/{account}/trips";

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A local URL nothing listens on.
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// Identity provider and trip API both served from `base`.
pub fn endpoints(base: &str) -> CyclocityEndpoints {
    CyclocityEndpoints::default()
        .with_iam_base(base)
        .unwrap()
        .with_api_base(base)
        .unwrap()
}

pub fn context(endpoints: &CyclocityEndpoints) -> FetchContext {
    context_with(endpoints, FetchSettings::default())
}

pub fn context_with(endpoints: &CyclocityEndpoints, settings: FetchSettings) -> FetchContext {
    FetchContext::builder()
        .settings(settings)
        .allowed_domains(endpoints.allowed_domains())
        .build()
        .unwrap()
}

pub fn account() -> CyclocityAccount {
    CyclocityAccount::new("lyon", "acct-42").unwrap()
}

pub fn credential() -> Credential {
    Credential::new("rider@example.com", "correct horse")
}

/// One complete trip record as the API returns it.
pub fn sample_trip() -> Value {
    json!({
        "id": "t1",
        "startTime": "2025-03-01T08:12:00Z",
        "endTime": "2025-03-01T08:27:00Z",
        "duration": 15,
        "startStation": {"name": "A", "latitude": 45.76, "longitude": 4.86},
        "endStation": {"name": "B", "latitude": 45.75, "longitude": 4.83},
        "geometry": {"type": "LineString", "coordinates": [[4.86, 45.76], [4.83, 45.75]]}
    })
}
