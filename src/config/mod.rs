//! Configuration module for newz
//!
//! Configuration is an in-process [`Config`] value. It can be built in code
//! (every section implements `Default`) or loaded from a TOML file with
//! kebab-case keys. Either way it is validated before a crawler accepts it.
//!
//! # Example
//!
//! ```no_run
//! use newz::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("newz.toml")).unwrap();
//! println!("Fetch ceiling: {}", config.fetch.max_parallel_fetches);
//! ```

mod parser;
mod types;
mod validation;

use std::time::Duration;

pub use types::{
    Config, CrawlerConfig, ExecutorConfig, ExtractionConfig, FetchConfig, LanePolicy, PoolConfig,
};

pub use parser::{
    compute_config_hash, config_hash, load_config, load_config_with_hash, parse_config,
};

impl Config {
    /// Validates this configuration, returning it unchanged on success
    pub fn validated(self) -> crate::ConfigResult<Self> {
        validation::validate(&self)?;
        Ok(self)
    }

    /// Checks every section without consuming the configuration
    pub fn validate(&self) -> crate::ConfigResult<()> {
        validation::validate(self)
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_seconds)
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.thread_timeout_seconds)
    }
}
