//! Harvest module for paginated listing retrieval
//!
//! This module contains the core harvesting logic, including:
//! - Response-shape extraction for the listing payload
//! - Page fetching with retry and backoff
//! - Bounded concurrent dispatch with ordered reassembly
//! - Progress events
//! - An offline demo source

mod coordinator;
mod demo;
mod events;
mod extract;
mod fetcher;
mod retry;

pub use coordinator::{
    HarvestOutcome, HarvestRequest, Harvester, DEFAULT_FAILURE_THRESHOLD, DEFAULT_MAX_WORKERS,
    DEFAULT_REQUEST_SPACING,
};
pub use demo::{demo_records, DemoSource};
pub use events::{event_channel, EventReceiver, EventSender, HarvestEvent};
pub use extract::{extract_items, extract_total_hint, ItemListShape, ITEM_LIST_SHAPES};
pub use fetcher::{
    build_http_client, classify_status, HttpPageFetcher, Page, PageCursor, PageFailure,
    PageResult, PageSource, SERVER_PAGE_SIZE,
};
pub use retry::{Backoff, InstantSleeper, RetryPolicy, Sleeper, TokioSleeper};

use crate::config::Config;
use crate::HarvestError;
use std::sync::Arc;

/// Runs a live harvest described entirely by `config`
///
/// # Example
///
/// ```no_run
/// use formasi_harvester::config::Config;
/// use formasi_harvester::harvest::harvest_from_config;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = harvest_from_config(&Config::default()).await?;
/// println!("{}: {} records", outcome.status, outcome.table.len());
/// # Ok(())
/// # }
/// ```
pub async fn harvest_from_config(config: &Config) -> Result<HarvestOutcome, HarvestError> {
    let fetcher = HttpPageFetcher::new(config)?;
    let harvester = Harvester::from_config(Arc::new(fetcher), &config.harvest);
    Ok(harvester
        .harvest(&HarvestRequest::from_config(&config.harvest))
        .await)
}
