//! Harvest coordinator - main harvest orchestration logic
//!
//! This module contains the loop that turns a `PageSource` into a
//! `ResultTable`:
//! - Probing cursor 0 to learn the total volume
//! - Dispatching further cursors in ascending order to a bounded worker pool
//! - Reassembling pages in cursor order regardless of completion order
//! - Stopping on exhaustion, the record cap, or repeated failure

use crate::config::HarvestConfig;
use crate::harvest::events::{EventPublisher, EventSender, HarvestEvent};
use crate::harvest::fetcher::{PageCursor, PageResult, PageSource};
use crate::harvest::retry::{Sleeper, TokioSleeper};
use crate::state::{FailureKind, HarvestPhase, HarvestStatus};
use crate::table::ResultTable;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Default number of consecutive page failures that abort a harvest
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default pause a worker takes after each fetch
pub const DEFAULT_REQUEST_SPACING: Duration = Duration::from_millis(500);

/// Default worker budget
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Parameters of one harvest call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRequest {
    /// Server-side filter code; empty means unfiltered
    pub filter: String,

    /// Stop once this many records are aggregated
    pub max_records: Option<usize>,

    /// Maximum number of concurrently in-flight fetches
    pub max_workers: usize,
}

impl Default for HarvestRequest {
    fn default() -> Self {
        Self {
            filter: String::new(),
            max_records: None,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl HarvestRequest {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            filter: config.filter.clone(),
            max_records: config.max_records,
            max_workers: config.max_workers,
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}

/// Everything a harvest call hands back to its caller
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// Records gathered, in cursor order; partial when aborted
    pub table: ResultTable,

    pub status: HarvestStatus,

    /// Most recent page failure, kept for diagnostics
    pub last_failure: Option<FailureKind>,

    /// Offsets whose pages failed and are missing from the table
    pub failed_offsets: Vec<u64>,

    /// Pages appended to the table
    pub pages_fetched: usize,

    /// Total record count reported by the server, if any
    pub total_hint: Option<u64>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestOutcome {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Orchestrates harvests against one page source
pub struct Harvester {
    source: Arc<dyn PageSource>,
    sleeper: Arc<dyn Sleeper>,
    failure_threshold: u32,
    request_spacing: Duration,
    events: Option<EventSender>,
}

impl Harvester {
    /// Creates a harvester with the default threshold and spacing
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            sleeper: Arc::new(TokioSleeper),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            request_spacing: DEFAULT_REQUEST_SPACING,
            events: None,
        }
    }

    /// Creates a harvester using the threshold and spacing from `config`
    pub fn from_config(source: Arc<dyn PageSource>, config: &HarvestConfig) -> Self {
        Self::new(source)
            .with_failure_threshold(config.failure_threshold)
            .with_request_spacing(config.request_spacing())
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_request_spacing(mut self, spacing: Duration) -> Self {
        self.request_spacing = spacing;
        self
    }

    /// Publishes progress to `sender` during every harvest
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Runs one harvest to a terminal status
    ///
    /// Never fails: whatever was gathered is returned together with the status,
    /// and an aborted harvest carries the last failure kind.
    pub async fn harvest(&self, request: &HarvestRequest) -> HarvestOutcome {
        let started_at = Utc::now();
        let page_size = self.source.page_size().max(1);
        let max_workers = request.max_workers.max(1);
        let filter: Arc<str> = Arc::from(request.filter.as_str());

        let mut session = HarvestSession::new(
            request.max_records,
            self.failure_threshold,
            page_size,
            EventPublisher::new(self.events.clone()),
        );

        tracing::info!(
            "Starting harvest (filter: '{}', max records: {:?}, workers: {})",
            request.filter,
            request.max_records,
            max_workers
        );

        let status = self.run(&mut session, &filter, max_workers).await;
        session.finish(status);

        tracing::info!(
            "Harvest finished: {} with {} records from {} pages",
            status,
            session.table.len(),
            session.pages_fetched
        );

        HarvestOutcome {
            table: session.table,
            status,
            last_failure: session.last_failure,
            failed_offsets: session.failed_offsets,
            pages_fetched: session.pages_fetched,
            total_hint: session.total_hint,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn run(
        &self,
        session: &mut HarvestSession,
        filter: &Arc<str>,
        max_workers: usize,
    ) -> HarvestStatus {
        session.transition(HarvestPhase::Probing);

        let probe = self.source.fetch_page(PageCursor::FIRST, filter).await;
        match &probe {
            PageResult::Failure(failure) => {
                tracing::error!(
                    "Probe of offset 0 failed ({}): {}",
                    failure.kind,
                    failure.detail
                );
                session.last_failure = Some(failure.kind);
                session.failed_offsets.push(0);
                return HarvestStatus::Aborted;
            }
            PageResult::Items(page) => {
                session.total_hint = page.total_hint;
                session.publisher.publish(HarvestEvent::Probed {
                    total_hint: page.total_hint,
                });
                match page.total_hint {
                    Some(total) => tracing::info!("Server reports {} records", total),
                    None => tracing::info!("No total reported, paging until exhausted"),
                }
            }
        }

        session.receive(PageCursor::FIRST, probe);
        if let Some(status) = session.drain() {
            return status;
        }

        let mut next_cursor = PageCursor::FIRST.next(session.page_size);
        let mut in_flight: JoinSet<(PageCursor, PageResult)> = JoinSet::new();

        let status = loop {
            session.transition(HarvestPhase::Dispatching);
            while in_flight.len() < max_workers && session.may_dispatch(next_cursor, max_workers) {
                self.dispatch(&mut in_flight, next_cursor, filter);
                next_cursor = next_cursor.next(session.page_size);
            }

            if in_flight.is_empty() {
                tracing::debug!("Every known page has been collected");
                break HarvestStatus::Complete;
            }

            session.transition(HarvestPhase::Collecting);
            match in_flight.join_next().await {
                Some(Ok((cursor, result))) => {
                    session.receive(cursor, result);
                    if let Some(status) = session.drain() {
                        break status;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Fetch task failed: {}", e);
                    session.last_failure = Some(FailureKind::Transient);
                    break HarvestStatus::Aborted;
                }
                None => break HarvestStatus::Complete,
            }
        };

        // Let in-flight fetches settle; nothing they return is kept.
        while let Some(joined) = in_flight.join_next().await {
            if let Ok((cursor, _)) = joined {
                tracing::debug!("Discarding offset {} fetched after stop", cursor);
            }
        }

        status
    }

    /// Spawns one fetch; the worker slot stays busy for the request spacing
    /// after the fetch settles
    fn dispatch(
        &self,
        in_flight: &mut JoinSet<(PageCursor, PageResult)>,
        cursor: PageCursor,
        filter: &Arc<str>,
    ) {
        let source = Arc::clone(&self.source);
        let sleeper = Arc::clone(&self.sleeper);
        let filter = Arc::clone(filter);
        let spacing = self.request_spacing;

        tracing::debug!("Dispatching offset {}", cursor);
        in_flight.spawn(async move {
            let result = source.fetch_page(cursor, &filter).await;
            sleeper.sleep(spacing).await;
            (cursor, result)
        });
    }
}

/// Mutable state of one harvest call, owned by the coordinator loop
///
/// Completed pages land in `pending` keyed by cursor and are only moved into
/// the table once every lower cursor has been applied. Pages still waiting
/// in `pending` already limit dispatch: an empty one marks the end of the
/// stream and their records count toward the cap.
struct HarvestSession {
    max_records: Option<usize>,
    failure_threshold: u32,
    page_size: u64,
    phase: HarvestPhase,
    consecutive_failures: u32,
    last_failure: Option<FailureKind>,
    failed_offsets: Vec<u64>,
    pages_fetched: usize,
    total_hint: Option<u64>,
    pending: BTreeMap<PageCursor, PageResult>,
    pending_records: usize,
    end_of_stream: Option<PageCursor>,
    next_to_apply: PageCursor,
    table: ResultTable,
    publisher: EventPublisher,
}

impl HarvestSession {
    fn new(
        max_records: Option<usize>,
        failure_threshold: u32,
        page_size: u64,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            max_records,
            failure_threshold,
            page_size,
            phase: HarvestPhase::Init,
            consecutive_failures: 0,
            last_failure: None,
            failed_offsets: Vec::new(),
            pages_fetched: 0,
            total_hint: None,
            pending: BTreeMap::new(),
            pending_records: 0,
            end_of_stream: None,
            next_to_apply: PageCursor::FIRST,
            table: ResultTable::new(),
            publisher,
        }
    }

    fn transition(&mut self, next: HarvestPhase) {
        if self.phase == next {
            return;
        }
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid harvest transition {} -> {}",
            self.phase,
            next
        );
        tracing::trace!("Harvest phase {} -> {}", self.phase, next);
        self.phase = next;
        self.publisher.publish(HarvestEvent::PhaseChanged { phase: next });
    }

    fn finish(&mut self, status: HarvestStatus) {
        self.transition(status.into());
        debug_assert!(self.phase.is_terminal());
        self.publisher.publish(HarvestEvent::Finished {
            status,
            total_records: self.table.len(),
        });
    }

    /// Returns true if `cursor` may be fetched now
    ///
    /// The cursor must lie below the reported total and below any page already
    /// seen empty, the cap must not be covered by applied and pending records,
    /// and it must fall within `max_workers` pages of the next page to apply.
    fn may_dispatch(&self, cursor: PageCursor, max_workers: usize) -> bool {
        if let Some(total) = self.total_hint {
            if cursor.offset() >= total {
                return false;
            }
        }
        if let Some(end) = self.end_of_stream {
            if cursor >= end {
                return false;
            }
        }
        if let Some(cap) = self.max_records {
            if self.table.len() + self.pending_records >= cap {
                return false;
            }
        }

        let window = self.page_size.saturating_mul(max_workers as u64);
        cursor.offset() < self.next_to_apply.offset().saturating_add(window)
    }

    /// Parks a settled page until every lower cursor has been applied
    fn receive(&mut self, cursor: PageCursor, result: PageResult) {
        if let PageResult::Items(page) = &result {
            if page.records.is_empty() {
                if self.end_of_stream.map_or(true, |end| cursor < end) {
                    tracing::debug!("Offset {} came back empty, no dispatch beyond it", cursor);
                    self.end_of_stream = Some(cursor);
                }
            } else {
                self.pending_records += page.records.len();
            }
        }
        self.pending.insert(cursor, result);
    }

    /// Applies every pending page that is next in cursor order
    ///
    /// Returns a terminal status as soon as one page triggers a stop condition.
    fn drain(&mut self) -> Option<HarvestStatus> {
        while let Some(result) = self.pending.remove(&self.next_to_apply) {
            let cursor = self.next_to_apply;
            self.next_to_apply = cursor.next(self.page_size);
            if let PageResult::Items(page) = &result {
                self.pending_records = self.pending_records.saturating_sub(page.records.len());
            }
            if let Some(status) = self.apply(cursor, result) {
                return Some(status);
            }
        }
        None
    }

    fn apply(&mut self, cursor: PageCursor, result: PageResult) -> Option<HarvestStatus> {
        match result {
            PageResult::Items(page) => {
                if page.records.is_empty() {
                    tracing::info!("Offset {} is empty, stream exhausted", cursor);
                    return Some(HarvestStatus::Complete);
                }

                self.consecutive_failures = 0;
                self.pages_fetched += 1;
                let count = page.records.len();
                self.table.append(page.records);

                if let Some(cap) = self.max_records {
                    if self.table.len() >= cap {
                        self.table.truncate(cap);
                        self.publish_page(cursor, count);
                        tracing::info!("Record cap of {} reached at offset {}", cap, cursor);
                        return Some(HarvestStatus::Capped);
                    }
                }

                self.publish_page(cursor, count);
                None
            }
            PageResult::Failure(failure) => {
                self.consecutive_failures += 1;
                self.last_failure = Some(failure.kind);
                self.failed_offsets.push(cursor.offset());

                tracing::warn!(
                    "Offset {} failed after {} attempts ({}), {} consecutive failures",
                    cursor,
                    failure.attempts,
                    failure.kind,
                    self.consecutive_failures
                );
                self.publisher.publish(HarvestEvent::PageFailed {
                    offset: cursor.offset(),
                    kind: failure.kind,
                    consecutive_failures: self.consecutive_failures,
                });

                if self.consecutive_failures >= self.failure_threshold {
                    tracing::error!(
                        "Aborting after {} consecutive page failures",
                        self.consecutive_failures
                    );
                    return Some(HarvestStatus::Aborted);
                }
                None
            }
        }
    }

    fn publish_page(&self, cursor: PageCursor, records: usize) {
        tracing::debug!(
            "Offset {} added {} records ({} total)",
            cursor,
            records,
            self.table.len()
        );
        self.publisher.publish(HarvestEvent::PageCompleted {
            offset: cursor.offset(),
            records,
            total_records: self.table.len(),
        });
    }
}
