use crate::config::types::{
    Config, CrawlerConfig, DedupConfig, GeocodingConfig, OutputConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_dedup_config(&config.dedup)?;
    validate_geocoding_config(&config.geocoding)?;
    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", config.base_url, e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    validate_domain_string("source", &config.source)?;

    if config.page_param.is_empty() {
        return Err(ConfigError::Validation(
            "page_param cannot be empty".to_string(),
        ));
    }

    if config.max_workers < 1 || config.max_workers > 32 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 32, got {}",
            config.max_workers
        )));
    }

    if config.max_consecutive_errors < 1 {
        return Err(ConfigError::Validation(format!(
            "max_consecutive_errors must be >= 1, got {}",
            config.max_consecutive_errors
        )));
    }

    if config.task_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "task_timeout_secs must be >= 1, got {}",
            config.task_timeout_secs
        )));
    }

    if config.detail_jitter_min_ms > config.detail_jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "detail_jitter_min_ms ({}) cannot exceed detail_jitter_max_ms ({})",
            config.detail_jitter_min_ms, config.detail_jitter_max_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if matches!(config.checkpoint_path.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates deduplication configuration
fn validate_dedup_config(config: &DedupConfig) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&config.threshold) {
        return Err(ConfigError::Validation(format!(
            "dedup threshold must be between 0 and 100, got {}",
            config.threshold
        )));
    }

    for source in &config.source_priority {
        validate_domain_string("source_priority entry", source)?;
    }

    Ok(())
}

/// Validates coordinate resolver configuration
fn validate_geocoding_config(config: &GeocodingConfig) -> Result<(), ConfigError> {
    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid geocoding endpoint: {}", e)))?;

    let [min_lat, max_lat, min_lon, max_lon] = config.bounds;
    let lat_ok = (-90.0..=90.0).contains(&min_lat) && (-90.0..=90.0).contains(&max_lat);
    let lon_ok = (-180.0..=180.0).contains(&min_lon) && (-180.0..=180.0).contains(&max_lon);

    if !lat_ok || !lon_ok || min_lat >= max_lat || min_lon >= max_lon {
        return Err(ConfigError::Validation(format!(
            "geocoding bounds must be [min-lat, max-lat, min-lon, max-lon], got {:?}",
            config.bounds
        )));
    }

    Ok(())
}

/// Validates a site identifier such as "otodom.pl"
fn validate_domain_string(field: &str, domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "{} '{}' contains invalid characters",
            field, domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::Validation(format!(
            "{} '{}' is not a valid domain",
            field, domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
