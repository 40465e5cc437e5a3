use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Formasi-Harvester
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub harvest: HarvestConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

/// Remote API location and request identity
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApiConfig {
    /// API origin, e.g. `https://api-sscasn.bkn.go.id`
    pub origin: String,

    /// Web portal origin sent as `Origin` and `Referer`
    pub portal: String,

    /// Recruitment year, the first path segment of the endpoint
    pub year: String,

    /// Browser-like user agent the server expects
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            origin: "https://api-sscasn.bkn.go.id".to_string(),
            portal: "https://sscasn.bkn.go.id".to_string(),
            year: "2025".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    /// Endpoint serving the paginated listing
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/portal/spf",
            self.origin.trim_end_matches('/'),
            self.year
        )
    }

    /// Portal origin without a trailing slash
    pub fn portal_origin(&self) -> &str {
        self.portal.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Harvest behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestConfig {
    /// Server-side filter code (`kode_ref_pend`); empty means unfiltered
    pub filter: String,

    /// Stop after this many records
    pub max_records: Option<usize>,

    /// Maximum number of concurrently in-flight page fetches
    pub max_workers: usize,

    /// Consecutive page failures that abort the harvest
    pub failure_threshold: u32,

    /// Minimum time a worker waits after a fetch before taking the next cursor (milliseconds)
    pub request_spacing_ms: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            filter: String::new(),
            max_records: None,
            max_workers: 4,
            failure_threshold: 3,
            request_spacing_ms: 500,
        }
    }
}

impl HarvestConfig {
    pub fn request_spacing(&self) -> Duration {
        Duration::from_millis(self.request_spacing_ms)
    }
}

/// Per-page retry and backoff configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per page, including the first
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds); doubles on each retry
    pub base_delay_ms: u64,

    /// Upper bound on any single retry delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Export configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory CSV exports are written to
    pub directory: String,

    /// File name prefix for exports
    pub file_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            file_prefix: "sscasn".to_string(),
        }
    }
}
