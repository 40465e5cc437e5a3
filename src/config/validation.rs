use crate::config::types::{ApiConfig, Config, HarvestConfig, OutputConfig, RetryConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on the worker budget; the server is a public portal
const MAX_WORKERS: usize = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_harvest_config(&config.harvest)?;
    validate_retry_config(&config.retry)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates API location and identity
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("origin", &config.origin)?;
    validate_http_url("portal", &config.portal)?;

    if config.year.is_empty() || !config.year.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "year must be numeric, got '{}'",
            config.year
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates harvest limits
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.max_workers
        )));
    }

    if config.failure_threshold == 0 {
        return Err(ConfigError::Validation(
            "failure_threshold must be >= 1".to_string(),
        ));
    }

    if config.max_records == Some(0) {
        return Err(ConfigError::Validation(
            "max_records must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry budget and backoff bounds
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "directory cannot be empty".to_string(),
        ));
    }

    if config.file_prefix.is_empty() {
        return Err(ConfigError::Validation(
            "file_prefix cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Requires an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_workers() {
        let mut config = Config::default();
        config.harvest.max_workers = 0;
        assert!(validate(&config).is_err());

        config.harvest.max_workers = 33;
        assert!(validate(&config).is_err());

        config.harvest.max_workers = 32;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_retry_bounds() {
        let mut config = Config::default();
        config.retry.base_delay_ms = 10_000;
        config.retry.max_delay_ms = 1_000;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("origin", "https://api-sscasn.bkn.go.id").is_ok());
        assert!(validate_http_url("origin", "http://127.0.0.1:3000").is_ok());

        assert!(validate_http_url("origin", "").is_err());
        assert!(validate_http_url("origin", "api-sscasn.bkn.go.id").is_err());
        assert!(validate_http_url("origin", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_year() {
        let mut config = Config::default();
        config.api.year = "20x5".to_string();
        assert!(validate(&config).is_err());

        config.api.year = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_max_records() {
        let mut config = Config::default();
        config.harvest.max_records = Some(0);
        assert!(validate(&config).is_err());

        config.harvest.max_records = Some(1);
        assert!(validate(&config).is_ok());
    }
}
