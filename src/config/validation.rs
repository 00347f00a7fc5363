use crate::config::types::{
    Config, CrawlerConfig, ExecutorConfig, ExtractionConfig, FetchConfig, PoolConfig,
};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_crawler_config(&config.crawler)?;
    validate_extraction_config(&config.extraction)?;
    validate_executor_config(&config.executor)?;
    validate_pool_config(&config.pool)?;
    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    validate_seconds("request_timeout_seconds", config.request_timeout_seconds)?;
    validate_seconds("connect_timeout_seconds", config.connect_timeout_seconds)?;

    if config.max_parallel_fetches < 1 || config.max_parallel_fetches > 256 {
        return Err(ConfigError::Validation(format!(
            "max_parallel_fetches must be between 1 and 256, got {}",
            config.max_parallel_fetches
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.article_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "article_limit must be >= 1, got {}",
            config.article_limit
        )));
    }

    if config.article_threads < 1 {
        return Err(ConfigError::Validation(format!(
            "article_threads must be >= 1, got {}",
            config.article_threads
        )));
    }

    if config.memoize_articles && config.memo_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "memo_dir cannot be empty when memoize_articles is enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    validate_language(&config.language)?;

    if config.max_summary_sent < 1 {
        return Err(ConfigError::Validation(format!(
            "max_summary_sent must be >= 1, got {}",
            config.max_summary_sent
        )));
    }

    Ok(())
}

fn validate_executor_config(config: &ExecutorConfig) -> Result<(), ConfigError> {
    if config.bridge_threads < 1 || config.bridge_threads > 512 {
        return Err(ConfigError::Validation(format!(
            "bridge_threads must be between 1 and 512, got {}",
            config.bridge_threads
        )));
    }
    Ok(())
}

fn validate_pool_config(config: &PoolConfig) -> Result<(), ConfigError> {
    if config.threads_per_source < 1 {
        return Err(ConfigError::Validation(format!(
            "threads_per_source must be >= 1, got {}",
            config.threads_per_source
        )));
    }
    validate_seconds("thread_timeout_seconds", config.thread_timeout_seconds)
}

fn validate_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a positive number of seconds, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Accepts "auto" or a two-letter lowercase ISO 639-1 code
pub(crate) fn validate_language(language: &str) -> Result<(), ConfigError> {
    if language == "auto" {
        return Ok(());
    }

    if language.len() == 2 && language.chars().all(|c| c.is_ascii_lowercase()) {
        return Ok(());
    }

    Err(ConfigError::InvalidLanguage(language.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_language() {
        assert!(validate_language("auto").is_ok());
        assert!(validate_language("en").is_ok());
        assert!(validate_language("zh").is_ok());

        assert!(validate_language("").is_err());
        assert!(validate_language("EN").is_err());
        assert!(validate_language("eng").is_err());
        assert!(validate_language("e1").is_err());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = Config::default();
        config.crawler.article_limit = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));

        let mut config = Config::default();
        config.fetch.max_parallel_fetches = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.pool.threads_per_source = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.executor.bridge_threads = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_timeouts_rejected() {
        let mut config = Config::default();
        config.fetch.request_timeout_seconds = 0.0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.pool.thread_timeout_seconds = f64::NAN;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_memo_dir_required_when_memoizing() {
        let mut config = Config::default();
        config.crawler.memoize_articles = true;
        config.crawler.memo_dir = "  ".to_string();
        assert!(validate(&config).is_err());
    }
}
