//! Formasi-Harvester: a polite paginated JSON harvester
//!
//! This crate harvests records from an offset-paginated JSON API into a single
//! ordered table, fetching pages concurrently under a bounded worker budget while
//! keeping the output in cursor order. The harvested table supports substring
//! search, display pagination and CSV export.

pub mod config;
pub mod harvest;
pub mod output;
pub mod state;
pub mod table;

use thiserror::Error;

/// Main error type for Formasi-Harvester operations
///
/// A harvest itself never fails; these errors cover everything around it
/// (loading configuration, building the HTTP client, writing exports).
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid header value for {name}: {value}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Formasi-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{
    HarvestEvent, HarvestOutcome, HarvestRequest, Harvester, HttpPageFetcher, PageResult,
    PageSource,
};
pub use state::{FailureKind, HarvestPhase, HarvestStatus};
pub use table::{paginate, search, FieldValue, Record, ResultTable};
