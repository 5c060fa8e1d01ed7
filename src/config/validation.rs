use crate::config::types::{
    Config, CrawlerConfig, FrontierConfig, IndexerConfig, QueueConfig, UserAgentConfig,
};
use crate::url::RestrictionSet;
use crate::ConfigError;
use std::time::Duration;
use url::Url;

/// Deepest crawl a configuration may ask for
pub const MAX_DEPTH_LIMIT: u32 = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_frontier_config(&config.frontier)?;
    validate_queue_config(&config.queue)?;
    validate_crawler_config(&config.crawler)?;
    validate_indexer_config(&config.indexer)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_visibility_budget(config)?;
    Ok(())
}

/// Checks that single waits of a worker fit inside the visibility timeout
///
/// Workers re-hide their message before long waits, but a fetch or a retry
/// budget that alone outlasts the timeout points at a misconfiguration.
fn validate_visibility_budget(config: &Config) -> Result<(), ConfigError> {
    let visibility = config.queue.visibility_timeout();

    let backoff = retry_budget(config.indexer.retry_base(), config.indexer.max_attempts);
    if backoff >= visibility {
        return Err(ConfigError::Validation(format!(
            "indexer retry backoff ({:?}) must stay below visibility-timeout-secs ({})",
            backoff, config.queue.visibility_timeout_secs
        )));
    }

    if config.crawler.request_timeout() >= visibility {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs ({}) must stay below visibility-timeout-secs ({})",
            config.crawler.request_timeout_secs, config.queue.visibility_timeout_secs
        )));
    }

    if config.crawler.domain_delay() >= visibility {
        return Err(ConfigError::Validation(format!(
            "domain-delay-ms ({}) must stay below visibility-timeout-secs ({})",
            config.crawler.domain_delay_ms, config.queue.visibility_timeout_secs
        )));
    }

    Ok(())
}

/// Sum of the backoff waits of `max_attempts` attempts: `base * (2^(n-1) - 1)`
fn retry_budget(base: Duration, max_attempts: u32) -> Duration {
    (1..max_attempts).fold(Duration::ZERO, |total, attempt| {
        let factor = 2u32.saturating_pow(attempt - 1);
        total.saturating_add(base.saturating_mul(factor))
    })
}

/// Validates coordinator configuration
fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "frontier.seeds must contain at least one URL".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }

    if config.depth_limit > MAX_DEPTH_LIMIT {
        return Err(ConfigError::Validation(format!(
            "depth-limit must be <= {}, got {}",
            MAX_DEPTH_LIMIT, config.depth_limit
        )));
    }

    for pattern in &config.restricted {
        if pattern.trim().is_empty() {
            return Err(ConfigError::InvalidPattern(
                "Restricted pattern cannot be empty".to_string(),
            ));
        }
    }
    RestrictionSet::compile(config.restricted.as_slice())?;

    if config.idle_rounds < 1 {
        return Err(ConfigError::Validation(format!(
            "idle_rounds must be >= 1, got {}",
            config.idle_rounds
        )));
    }

    if config.poll_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_secs must be >= 1, got {}",
            config.poll_interval_secs
        )));
    }

    Ok(())
}

/// Validates broker configuration
fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "queue.database_path cannot be empty".to_string(),
        ));
    }

    if config.max_messages < 1 || config.max_messages > 10 {
        return Err(ConfigError::Validation(format!(
            "max_messages must be between 1 and 10, got {}",
            config.max_messages
        )));
    }

    if config.visibility_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "visibility_timeout_secs must be >= 1, got {}",
            config.visibility_timeout_secs
        )));
    }

    Ok(())
}

/// Validates crawl worker configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_content_chars < 1 {
        return Err(ConfigError::Validation(format!(
            "max_content_chars must be >= 1, got {}",
            config.max_content_chars
        )));
    }

    Ok(())
}

/// Validates index worker configuration
fn validate_indexer_config(config: &IndexerConfig) -> Result<(), ConfigError> {
    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "indexer.database_path cannot be empty".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.summary_max_chars < 1 {
        return Err(ConfigError::Validation(format!(
            "summary_max_chars must be >= 1, got {}",
            config.summary_max_chars
        )));
    }

    if config.keyword_count < 1 {
        return Err(ConfigError::Validation(format!(
            "keyword_count must be >= 1, got {}",
            config.keyword_count
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

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid email format: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
