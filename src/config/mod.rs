//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use rechtspraak_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("rechtspraak.toml")).unwrap();
//! println!("Delay between requests: {}ms", config.crawler.delay_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, hash_config, load_config, load_config_with_hash, parse_config};
