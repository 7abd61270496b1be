use crate::config::types::{
    Config, CrawlerConfig, HttpConfig, SchedulerConfig, SeedsConfig, StorageConfig,
    UserAgentConfig,
};
use crate::url::RegexRule;
use crate::ConfigError;
use url::Url;

const MAX_THREADS: u32 = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_http_config(&config.http)?;
    validate_storage_config(&config.storage)?;
    validate_seeds(&config.seeds)?;
    RegexRule::from_rules(&config.rules.patterns)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.threads < 1 || config.threads > MAX_THREADS {
        return Err(ConfigError::Validation(format!(
            "threads must be between 1 and {}, got {}",
            MAX_THREADS, config.threads
        )));
    }

    if config.max_depth == Some(0) {
        return Err(ConfigError::Validation(
            "max_depth must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates scheduler timing
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.queue_depth < 1 {
        return Err(ConfigError::Validation(format!(
            "queue_depth must be >= 1, got {}",
            config.queue_depth
        )));
    }

    for (name, secs) in [
        ("hang_timeout_secs", config.hang_timeout_secs),
        ("drain_timeout_secs", config.drain_timeout_secs),
    ] {
        if secs < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1s, got {}s",
                name, secs
            )));
        }
    }

    for (name, ms) in [
        ("monitor_interval_ms", config.monitor_interval_ms),
        ("spin_wait_ms", config.spin_wait_ms),
        ("feeder_poll_ms", config.feeder_poll_ms),
    ] {
        if ms < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1ms, got {}ms",
                name, ms
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric, hyphens and underscores only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "HTTP timeouts must be >= 1s, got {}s / {}s",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates that every seed is an absolute http(s) URL
fn validate_seeds(config: &SeedsConfig) -> Result<(), ConfigError> {
    for seed in config.urls.iter().chain(&config.forced) {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS scheme",
                seed
            )));
        }
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

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn test_validate_threads() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.threads = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.threads = MAX_THREADS + 1;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_validate_scheduler_intervals() {
        let mut config = SchedulerConfig::default();
        config.execute_interval_ms = 0;
        assert!(validate_scheduler_config(&config).is_ok());

        config.spin_wait_ms = 0;
        assert!(validate_scheduler_config(&config).is_err());

        let config = SchedulerConfig {
            hang_timeout_secs: 0,
            ..SchedulerConfig::default()
        };
        assert!(validate_scheduler_config(&config).is_err());

        let config = SchedulerConfig {
            queue_depth: 0,
            ..SchedulerConfig::default()
        };
        assert!(validate_scheduler_config(&config).is_err());
    }

    #[test]
    fn test_validate_seeds() {
        let ok = SeedsConfig {
            urls: vec!["http://example.com/".to_string()],
            forced: vec!["https://example.com/news".to_string()],
        };
        assert!(validate_seeds(&ok).is_ok());

        let relative = SeedsConfig {
            urls: vec!["/relative".to_string()],
            forced: vec![],
        };
        assert!(matches!(validate_seeds(&relative), Err(ConfigError::InvalidUrl(_))));

        let ftp = SeedsConfig {
            urls: vec![],
            forced: vec!["ftp://example.com/".to_string()],
        };
        assert!(matches!(validate_seeds(&ftp), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_crawler_name() {
        let mut config = UserAgentConfig {
            crawler_name: "my_crawler-2".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
        };
        assert!(validate_user_agent_config(&config).is_ok());

        config.crawler_name = "bad name".to_string();
        assert!(validate_user_agent_config(&config).is_err());
    }
}
