//! Configuration module for Harvest Engine
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section except `[user-agent]` and `[output]` may be omitted, in which
//! case its defaults apply.
//!
//! # Example
//!
//! ```no_run
//! use harvest_engine::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Frontier capacity: {}", config.frontier.capacity);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FrontierConfig, LearnerConfig, OutputConfig, TargetConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
