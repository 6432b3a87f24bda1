use crate::config::types::{Config, EngineConfig, OutputConfig, SiteEntry};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_output_config(&config.output)?;
    validate_sites(&config.site)?;
    Ok(())
}

/// Validates engine configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_branches < 1 || config.max_concurrent_branches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_branches must be between 1 and 64, got {}",
            config.max_concurrent_branches
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    // A zero backoff with a nonzero retry budget hammers a struggling server
    if config.max_retries > 0 && config.retry_backoff_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "retry_backoff_ms must be >= 100ms when retries are enabled, got {}ms",
            config.retry_backoff_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records_path cannot be empty".to_string(),
        ));
    }

    if config.failure_log_path.is_empty() {
        return Err(ConfigError::Validation(
            "failure_log_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the site entries
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    for site in sites {
        if site.name.is_empty() {
            return Err(ConfigError::Validation(
                "site name cannot be empty".to_string(),
            ));
        }

        if let Some(zip) = &site.zip_code {
            if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Validation(format!(
                    "zip_code must be five digits, got '{}'",
                    zip
                )));
            }
        }

        for seed in &site.seeds {
            Url::parse(seed).map_err(|e| {
                ConfigError::Validation(format!("invalid seed URL '{}': {}", seed, e))
            })?;
        }
    }

    // Duplicate names would make --site selection ambiguous
    for (i, site) in sites.iter().enumerate() {
        if sites[..i].iter().any(|s| s.name == site.name) {
            return Err(ConfigError::Validation(format!(
                "duplicate site entry '{}'",
                site.name
            )));
        }
    }

    Ok(())
}
