use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use crawl_frontier::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Cycles: {}", config.crawler.depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is used to detect if the configuration has changed between crawl runs.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Successfully loaded configuration and its hash
/// * `Err(ConfigError)` - Failed to load or parse the configuration
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[crawler]
depth = 3
threads = 10
resumable = true
max-depth = 4

[scheduler]
queue-depth = 200
hang-timeout-secs = 60
execute-interval-ms = 250

[generator]
top-n = 500

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[storage]
database-path = "./test.db"

[seeds]
urls = ["https://example.com/"]
forced = ["https://example.com/news"]

[rules]
patterns = ["+https://example\\.com/.*", "-.*\\.png"]
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.depth, 3);
        assert_eq!(config.crawler.threads, 10);
        assert!(config.crawler.resumable);
        assert!(config.crawler.auto_parse);
        assert_eq!(config.crawler.max_depth, Some(4));
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
        assert_eq!(config.seeds.urls.len(), 1);
        assert_eq!(config.seeds.forced.len(), 1);

        let link_rule = config.link_rule().unwrap();
        assert!(link_rule.satisfy("https://example.com/a"));
        assert!(!link_rule.satisfy("https://example.com/a.png"));
    }

    #[test]
    fn test_runtime_options_from_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        let options = config.scheduler_options();
        assert_eq!(options.threads, 10);
        assert_eq!(options.queue_depth, 200);
        assert_eq!(options.hang_timeout, Duration::from_secs(60));
        assert_eq!(options.drain_timeout, Duration::from_secs(120));
        assert_eq!(options.execute_interval, Duration::from_millis(250));
        assert_eq!(options.spin_wait, Duration::from_millis(500));

        let generator = config.generator_options();
        assert_eq!(generator.top_n, Some(500));
        assert_eq!(generator.max_execute_count, None);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config_content = r#"
[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[storage]
database-path = "./test.db"
"#;
        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.depth, 1);
        assert_eq!(config.crawler.threads, 50);
        assert!(!config.crawler.resumable);
        assert!(config.http.https_only);
        assert_eq!(config.scheduler.queue_depth, 1000);
        assert!(config.seeds.urls.is_empty());
        assert!(config.link_rule().unwrap().is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = VALID_CONFIG.replace("threads = 10", "threads = 0");
        let file = create_temp_config(&config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_config_with_bad_rule() {
        let config_content = VALID_CONFIG.replace("-.*\\\\.png", "-[unclosed");
        let file = create_temp_config(&config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config(VALID_CONFIG);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(config.crawler.depth, 3);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }

    #[test]
    fn test_compute_config_hash() {
        let config_content = "test content";
        let file = create_temp_config(config_content);

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        // Same content should produce same hash
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
