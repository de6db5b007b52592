//! Configuration module for Listing Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use listing_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Crawling {} with {} workers", config.crawler.base_url, config.crawler.max_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DedupConfig, ExtractorConfig, GeocodingConfig, OutputConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{config_hash, load_config, load_config_with_hash, parse_config};

pub(crate) use types::default_source_priority;
