//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the listing API and exercise the
//! full fetch, retry, dispatch and reassembly cycle end-to-end.

use formasi_harvester::config::Config;
use formasi_harvester::harvest::{
    DemoSource, HarvestRequest, Harvester, HttpPageFetcher, InstantSleeper, PageCursor,
    PageResult, PageSource,
};
use formasi_harvester::output::{records_to_csv, UTF8_BOM};
use formasi_harvester::state::{FailureKind, HarvestStatus, RetryCause};
use formasi_harvester::table::{paginate, ResultTable};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const ENDPOINT: &str = "/2025/portal/spf";

/// Serves `available` sequential records, 10 per page, in the portal's nested shape
struct PagedListing {
    available: u64,
    report_total: bool,
    jitter: bool,
}

impl PagedListing {
    fn new(available: u64) -> Self {
        Self {
            available,
            report_total: true,
            jitter: false,
        }
    }

    fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    /// Answers later pages faster than earlier ones
    fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Respond for PagedListing {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset: u64 = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "offset")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(0);

        let end = (offset + 10).min(self.available);
        let items: Vec<Value> = (offset.min(self.available)..end)
            .map(|i| {
                json!({
                    "jabatan_nm": format!("JABATAN {}", i),
                    "ins_nm": format!("INSTANSI {}", i % 3),
                    "jumlah_formasi": i
                })
            })
            .collect();

        let body = if self.report_total {
            json!({"status": 200, "data": {"meta": {"total": self.available}, "data": items}})
        } else {
            json!({"data": items})
        };

        let template = ResponseTemplate::new(200).set_body_json(body);
        if self.jitter {
            let delay = 1 + (9 - (offset / 10) % 9) * 3;
            template.set_delay(Duration::from_millis(delay))
        } else {
            template
        }
    }
}

/// Builds a config pointing at the mock server with fast retries
fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.origin = server.uri();
    config.api.timeout_secs = 5;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 10;
    config.harvest.request_spacing_ms = 0;
    config
}

fn test_harvester(config: &Config, sleeper: Arc<InstantSleeper>) -> Harvester {
    let fetcher = HttpPageFetcher::new(config)
        .expect("Failed to build fetcher")
        .with_sleeper(sleeper.clone());
    Harvester::from_config(Arc::new(fetcher), &config.harvest).with_sleeper(sleeper)
}

fn jumlah(table: &ResultTable) -> Vec<String> {
    table
        .records()
        .iter()
        .map(|r| r.get("jumlah_formasi").unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_with_total() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(header("accept", "application/json"))
        .and(header("origin", "https://sscasn.bkn.go.id"))
        .and(header("referer", "https://sscasn.bkn.go.id/"))
        .respond_with(PagedListing::new(25))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let outcome = test_harvester(&config, Arc::new(InstantSleeper::new()))
        .harvest(&HarvestRequest::new("").with_max_workers(2))
        .await;

    assert_eq!(outcome.status, HarvestStatus::Complete);
    assert_eq!(outcome.table.len(), 25);
    assert_eq!(
        jumlah(&outcome.table),
        (0..25).map(|i| i.to_string()).collect::<Vec<_>>()
    );

    let mut offsets: Vec<u64> = mock_server
        .received_requests()
        .await
        .expect("Request recording is enabled")
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(key, _)| key == "offset")
                .and_then(|(_, value)| value.parse().ok())
        })
        .collect();
    offsets.sort_unstable();
    assert_eq!(offsets, vec![0, 10, 20]);
}

#[tokio::test]
async fn test_filter_sent_as_query_parameter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("kode_ref_pend", "5109751"))
        .respond_with(PagedListing::new(12))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let outcome = test_harvester(&config, Arc::new(InstantSleeper::new()))
        .harvest(&HarvestRequest::new("5109751"))
        .await;

    assert_eq!(outcome.status, HarvestStatus::Complete);
    assert_eq!(outcome.table.len(), 12);
}

#[tokio::test]
async fn test_rate_limited_twice_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"jabatan_nm": "PROGRAMMER"}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sleeper = Arc::new(InstantSleeper::new());
    let fetcher = HttpPageFetcher::new(&test_config(&mock_server))
        .unwrap()
        .with_sleeper(sleeper.clone());

    let result = fetcher.fetch_page(PageCursor::FIRST, "").await;
    let PageResult::Items(page) = result else {
        panic!("expected items, got {:?}", result);
    };
    assert_eq!(page.records.len(), 1);

    let delays = sleeper.delays();
    assert_eq!(delays.len(), 2);
    assert!(delays[0] <= delays[1]);
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&test_config(&mock_server))
        .unwrap()
        .with_sleeper(Arc::new(InstantSleeper::new()));

    match fetcher.fetch_page(PageCursor::FIRST, "").await {
        PageResult::Failure(failure) => {
            assert_eq!(
                failure.kind,
                FailureKind::ExhaustedRetries {
                    last: RetryCause::Transient
                }
            );
            assert_eq!(failure.attempts, 3);
            assert!(!failure.retryable());
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_response_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "maintenance"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let outcome = test_harvester(&config, Arc::new(InstantSleeper::new()))
        .harvest(&HarvestRequest::default())
        .await;

    assert_eq!(outcome.status, HarvestStatus::Aborted);
    assert!(outcome.table.is_empty());
    assert_eq!(outcome.last_failure, Some(FailureKind::MalformedResponse));
}

#[tokio::test]
async fn test_not_json_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&test_config(&mock_server)).unwrap();
    match fetcher.fetch_page(PageCursor::FIRST, "").await {
        PageResult::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::MalformedResponse);
            assert_eq!(failure.attempts, 1);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_forbidden_is_rejected_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&test_config(&mock_server)).unwrap();
    match fetcher.fetch_page(PageCursor::FIRST, "").await {
        PageResult::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::Rejected { status: 403 })
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_abort_after_three_consecutive_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("offset", "0"))
        .respond_with(PagedListing::new(1_000).without_total())
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let outcome = test_harvester(&config, Arc::new(InstantSleeper::new()))
        .harvest(&HarvestRequest::new("").with_max_workers(1))
        .await;

    assert_eq!(outcome.status, HarvestStatus::Aborted);
    assert_eq!(outcome.table.len(), 10);
    assert_eq!(
        jumlah(&outcome.table),
        (0..10).map(|i| i.to_string()).collect::<Vec<_>>()
    );
    assert_eq!(outcome.failed_offsets, vec![10, 20, 30]);
    assert_eq!(
        outcome.last_failure,
        Some(FailureKind::ExhaustedRetries {
            last: RetryCause::Transient
        })
    );
}

#[tokio::test]
async fn test_cap_yields_exact_count() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(PagedListing::new(100))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let outcome = test_harvester(&config, Arc::new(InstantSleeper::new()))
        .harvest(&HarvestRequest::new("").with_max_records(37).with_max_workers(4))
        .await;

    assert_eq!(outcome.status, HarvestStatus::Capped);
    assert_eq!(outcome.table.len(), 37);
    assert_eq!(
        jumlah(&outcome.table),
        (0..37).map(|i| i.to_string()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_worker_count_does_not_change_output() {
    let mut tables = Vec::new();

    for workers in [1, 8, 8] {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ENDPOINT))
            .respond_with(PagedListing::new(87).without_total().with_jitter())
            .mount(&mock_server)
            .await;

        let config = test_config(&mock_server);
        let outcome = test_harvester(&config, Arc::new(InstantSleeper::new()))
            .harvest(&HarvestRequest::new("").with_max_workers(workers))
            .await;

        assert_eq!(outcome.status, HarvestStatus::Complete);
        tables.push(outcome.table);
    }

    assert_eq!(tables[0].len(), 87);
    assert_eq!(tables[0], tables[1]);
    assert_eq!(tables[1], tables[2]);
}

#[tokio::test]
async fn test_demo_harvest_search_and_export() {
    let outcome = Harvester::new(Arc::new(DemoSource::new()))
        .with_sleeper(Arc::new(InstantSleeper::new()))
        .harvest(&HarvestRequest::new("").with_max_workers(6))
        .await;

    assert_eq!(outcome.status, HarvestStatus::Complete);
    assert_eq!(outcome.table.len(), 500);
    assert_eq!(outcome.table.distinct_values("ins_nm"), 5);

    let statistisi = outcome.table.search("statistisi");
    assert_eq!(statistisi.len(), 50);

    let second_page = paginate(&statistisi, 1, 20);
    assert_eq!(second_page.len(), 20);
    assert_eq!(
        second_page[0].get("jumlah_formasi").unwrap().to_string(),
        "45"
    );

    let csv = records_to_csv(second_page.iter().copied());
    let text = std::str::from_utf8(&csv[UTF8_BOM.len()..]).unwrap();
    assert_eq!(text.lines().count(), 21);
    assert!(text.starts_with("jabatan_nm,ins_nm,lokasi_nm,formasi_nm,disable,penghasilan,jumlah_formasi,pendidikan_nm,status\n"));
}
