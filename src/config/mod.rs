//! Configuration module for Formasi-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; missing values fall back to the defaults that
//! match the public portal.
//!
//! # Example
//!
//! ```no_run
//! use formasi_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Harvesting with {} workers", config.harvest.max_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, HarvestConfig, OutputConfig, RetryConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
