//! Cyclocity trip API client.
//!
//! `GET {api}/contracts/{contract}/accounts/{id}/trips?offset=&length=` with a
//! bearer token and the versioned trip media type.

use cyclotrips_core::{AccessToken, RawTrip};
use cyclotrips_fetch::host::http::{truncate_body, HttpClient, ResponseExt, BODY_PREVIEW_CHARS};
use cyclotrips_fetch::{clamp_length, TripRequest};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use tracing::{debug, info, instrument, warn};

use super::descriptor::{CyclocityAccount, CyclocityEndpoints};
use super::error::CyclocityError;
use super::parser::parse_trips_response;

// ============================================================================
// Trip Pages
// ============================================================================

/// Raw trips gathered over one or more pages.
#[derive(Debug, Clone, Default)]
pub struct TripPages {
    /// Records in provider order.
    pub trips: Vec<RawTrip>,
    /// Number of pages requested.
    pub pages: usize,
}

/// Walks the pages a request asks for.
///
/// `fetch_page(offset, length)` is called until a page comes back short, or
/// once when `all_pages` is off.
pub(crate) async fn collect_pages<F, Fut>(request: &TripRequest, mut fetch_page: F) -> Result<TripPages, CyclocityError>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<RawTrip>, CyclocityError>>,
{
    let length = clamp_length(request.length);
    let mut offset = request.offset;
    let mut collected = TripPages::default();

    loop {
        let page = fetch_page(offset, length).await?;
        let received = page.len();
        collected.trips.extend(page);
        collected.pages += 1;

        debug!(offset, length, received, "Trip page received");

        let short_page = received < length as usize;
        if !request.all_pages || short_page {
            break;
        }
        let Some(next) = offset.checked_add(length) else {
            break;
        };
        offset = next;
    }

    Ok(collected)
}

// ============================================================================
// Trip API
// ============================================================================

/// Bearer-token client for the trip endpoint.
#[derive(Debug, Clone, Copy)]
pub struct TripApi<'a> {
    http: &'a HttpClient,
    endpoints: &'a CyclocityEndpoints,
    account: &'a CyclocityAccount,
}

impl<'a> TripApi<'a> {
    /// Creates a trip client for one account.
    pub fn new(http: &'a HttpClient, endpoints: &'a CyclocityEndpoints, account: &'a CyclocityAccount) -> Self {
        Self {
            http,
            endpoints,
            account,
        }
    }

    /// Fetches the pages described by `request`.
    #[instrument(skip_all, fields(contract = %self.account.contract, all_pages = request.all_pages))]
    pub async fn fetch(&self, token: &AccessToken, request: &TripRequest) -> Result<TripPages, CyclocityError> {
        let pages = collect_pages(request, |offset, length| self.fetch_page(token, offset, length)).await?;
        info!(trips = pages.trips.len(), pages = pages.pages, "Trips fetched");
        Ok(pages)
    }

    /// Fetches one page. An expired token is refused before any request.
    pub async fn fetch_page(&self, token: &AccessToken, offset: u32, length: u32) -> Result<Vec<RawTrip>, CyclocityError> {
        if token.is_expired() {
            warn!(expired_at = %token.expires_at(), "Refusing to use expired token");
            return Err(CyclocityError::TokenExpired(token.expires_at().to_rfc3339()));
        }

        let url = self
            .endpoints
            .trips_url(self.account, offset, clamp_length(length))?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
            .map_err(|_| CyclocityError::MissingAccessToken("token is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&self.endpoints.trip_media_type)
                .map_err(|_| CyclocityError::InvalidUrl(format!("bad media type {}", self.endpoints.trip_media_type)))?,
        );

        let response = self.http.get_with_headers(&url, headers).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await?;
            warn!("Trip request unauthorized");
            return Err(CyclocityError::Unauthorized {
                status: status.as_u16(),
                body: truncate_body(&body, BODY_PREVIEW_CHARS),
            });
        }

        if status != StatusCode::OK {
            let headers = response.headers_summary();
            if response.is_rate_limited() {
                warn!("Trip request rate limited");
            }
            let body = response.text().await?;
            warn!(status = status.as_u16(), "Trip request failed");
            return Err(CyclocityError::Status {
                status: status.as_u16(),
                headers,
                body: truncate_body(&body, BODY_PREVIEW_CHARS),
            });
        }

        let body = response.text().await?;
        parse_trips_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclotrips_core::Credential;
    use serde_json::json;
    use std::cell::RefCell;

    fn request(all_pages: bool, length: u32) -> TripRequest {
        TripRequest::new(Credential::new("u", "p"))
            .with_length(length)
            .with_all_pages(all_pages)
    }

    fn page(n: usize) -> Vec<RawTrip> {
        (0..n).map(|i| json!({"id": i})).collect()
    }

    #[tokio::test]
    async fn test_single_page_by_default() {
        let calls = RefCell::new(Vec::new());
        let pages = collect_pages(&request(false, 2), |offset, length| {
            calls.borrow_mut().push((offset, length));
            async move { Ok(page(2)) }
        })
        .await
        .unwrap();

        assert_eq!(pages.pages, 1);
        assert_eq!(pages.trips.len(), 2);
        assert_eq!(*calls.borrow(), [(0, 2)]);
    }

    #[tokio::test]
    async fn test_all_pages_until_short_page() {
        let calls = RefCell::new(Vec::new());
        let pages = collect_pages(&request(true, 2), |offset, length| {
            calls.borrow_mut().push((offset, length));
            let n = if offset < 4 { 2 } else { 1 };
            async move { Ok(page(n)) }
        })
        .await
        .unwrap();

        assert_eq!(pages.pages, 3);
        assert_eq!(pages.trips.len(), 5);
        assert_eq!(*calls.borrow(), [(0, 2), (2, 2), (4, 2)]);
    }

    #[tokio::test]
    async fn test_page_error_stops() {
        let result = collect_pages(&request(true, 2), |offset, _| async move {
            if offset == 0 {
                Ok(page(2))
            } else {
                Err(CyclocityError::TokenExpired("now".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(CyclocityError::TokenExpired(_))));
    }
}
