//! Page fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the HTTP client with the headers the portal expects
//! - One GET per attempt with the filter and cursor as query parameters
//! - Retry with exponential backoff for transient failures
//! - Failure classification

use crate::config::{ApiConfig, Config};
use crate::harvest::extract::{extract_items, extract_total_hint};
use crate::harvest::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::state::FailureKind;
use crate::table::Record;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Offset of a page in the server's result stream
///
/// Always a multiple of the page size: cursors are only built from page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageCursor {
    offset: u64,
}

impl PageCursor {
    /// The cursor of the first page
    pub const FIRST: PageCursor = PageCursor { offset: 0 };

    /// Cursor of the zero-based page `index`
    pub fn for_page(index: u64, page_size: u64) -> Self {
        Self {
            offset: index.saturating_mul(page_size),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Cursor of the page after this one
    pub fn next(&self, page_size: u64) -> Self {
        Self {
            offset: self.offset.saturating_add(page_size),
        }
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.offset)
    }
}

/// Items of one successfully fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub cursor: PageCursor,
    pub records: Vec<Record>,
    /// Total record count, when the server reported one
    pub total_hint: Option<u64>,
}

/// Final failure of one page after retries
#[derive(Debug, Clone, PartialEq)]
pub struct PageFailure {
    pub kind: FailureKind,
    /// Attempts actually made
    pub attempts: u32,
    pub detail: String,
}

impl PageFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            attempts: 1,
            detail: detail.into(),
        }
    }

    pub fn retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Outcome of fetching one page
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    Items(Page),
    Failure(PageFailure),
}

/// Anything that can serve pages of the listing
///
/// Implementations recover retryable failures themselves; only the final
/// outcome of a page is returned.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches the page starting at `cursor`, narrowed by `filter`
    async fn fetch_page(&self, cursor: PageCursor, filter: &str) -> PageResult;

    /// Records per page, fixed by the server
    fn page_size(&self) -> u64;
}

/// Builds an HTTP client that presents itself as the web portal
///
/// The server only answers requests with a browser-like user agent, a
/// `Referer` and `Origin` of the portal, and `Accept: application/json`.
pub fn build_http_client(config: &ApiConfig) -> Result<Client, HarvestError> {
    let portal = config.portal_origin();

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(ORIGIN, header_value("Origin", portal)?);
    headers.insert(REFERER, header_value("Referer", &format!("{}/", portal))?);

    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, HarvestError> {
    HeaderValue::from_str(value).map_err(|_| HarvestError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}

/// Classifies a non-success HTTP status
///
/// | Status | Kind | Retried |
/// |--------|------|---------|
/// | 429 | RateLimited | yes |
/// | 5xx | Transient | yes |
/// | other | Rejected | no |
pub fn classify_status(status: StatusCode) -> FailureKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FailureKind::RateLimited
    } else if status.is_server_error() {
        FailureKind::Transient
    } else {
        FailureKind::Rejected {
            status: status.as_u16(),
        }
    }
}

/// Records per page served by the listing API; clients cannot change it
pub const SERVER_PAGE_SIZE: u64 = 10;

/// Fetches listing pages from the remote API
pub struct HttpPageFetcher {
    client: Client,
    endpoint: Url,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpPageFetcher {
    /// Creates a fetcher for the endpoint described by `config`
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.api)?;
        let endpoint = Url::parse(&config.api.endpoint())?;

        Ok(Self {
            client,
            endpoint,
            retry: RetryPolicy::from_config(&config.retry),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replaces the timer used between retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Performs exactly one request for `cursor`
    async fn attempt(&self, cursor: PageCursor, filter: &str) -> Result<Page, PageFailure> {
        let offset = cursor.offset().to_string();
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("kode_ref_pend", filter), ("offset", offset.as_str())])
            .send()
            .await
            .map_err(|e| PageFailure::new(FailureKind::Transient, describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageFailure::new(
                classify_status(status),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let body = response.text().await.map_err(|e| {
            PageFailure::new(FailureKind::Transient, describe_transport_error(&e))
        })?;

        let payload: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            PageFailure::new(
                FailureKind::MalformedResponse,
                format!("Invalid JSON: {}", e),
            )
        })?;

        let records = extract_items(&payload).ok_or_else(|| {
            PageFailure::new(
                FailureKind::MalformedResponse,
                "No known item list in response",
            )
        })?;

        Ok(Page {
            cursor,
            records,
            total_hint: extract_total_hint(&payload),
        })
    }
}

/// Short description of a network-level error for logs and diagnostics
fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection failed".to_string()
    } else {
        error.to_string()
    }
}

#[async_trait]
impl PageSource for HttpPageFetcher {
    async fn fetch_page(&self, cursor: PageCursor, filter: &str) -> PageResult {
        let mut backoff = self.retry.backoff();

        loop {
            let attempt = backoff.start_attempt();
            tracing::debug!("Fetching offset {} (attempt {})", cursor, attempt);

            let mut failure = match self.attempt(cursor, filter).await {
                Ok(page) => return PageResult::Items(page),
                Err(failure) => failure,
            };
            failure.attempts = attempt;

            if !failure.retryable() {
                tracing::warn!(
                    "Offset {} failed ({}): {}",
                    cursor,
                    failure.kind,
                    failure.detail
                );
                return PageResult::Failure(failure);
            }

            match backoff.next_delay() {
                Some(delay) => {
                    tracing::warn!(
                        "Offset {} attempt {} failed ({}): {}; retrying in {:?}",
                        cursor,
                        attempt,
                        failure.kind,
                        failure.detail,
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                }
                None => {
                    tracing::warn!(
                        "Offset {} gave up after {} attempts ({}): {}",
                        cursor,
                        attempt,
                        failure.kind,
                        failure.detail
                    );
                    failure.kind = failure.kind.exhausted();
                    return PageResult::Failure(failure);
                }
            }
        }
    }

    fn page_size(&self) -> u64 {
        SERVER_PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&ApiConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_rejects_bad_header() {
        let config = ApiConfig {
            portal: "https://sscasn.bkn.go.id\n".to_string(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            build_http_client(&config),
            Err(HarvestError::InvalidHeader { name: "Origin", .. })
        ));
    }

    #[test]
    fn test_fetcher_endpoint() {
        let fetcher = HttpPageFetcher::new(&Config::default()).unwrap();
        assert_eq!(
            fetcher.endpoint().as_str(),
            "https://api-sscasn.bkn.go.id/2025/portal/spf"
        );
        assert_eq!(fetcher.page_size(), 10);
    }

    #[test]
    fn test_page_size_ignores_config() {
        let config = crate::config::parse_config("[harvest]\npage-size = 20\n").unwrap();
        let fetcher = HttpPageFetcher::new(&config).unwrap();
        assert_eq!(fetcher.page_size(), SERVER_PAGE_SIZE);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            FailureKind::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            FailureKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            FailureKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            FailureKind::Rejected { status: 404 }
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            FailureKind::Rejected { status: 403 }
        );
    }

    #[test]
    fn test_page_cursor() {
        assert_eq!(PageCursor::FIRST.offset(), 0);
        assert_eq!(PageCursor::for_page(3, 10).offset(), 30);
        assert_eq!(PageCursor::for_page(3, 10).next(10).offset(), 40);
        assert!(PageCursor::for_page(1, 10) < PageCursor::for_page(2, 10));
        assert_eq!(format!("{}", PageCursor::for_page(2, 10)), "20");
    }
}
