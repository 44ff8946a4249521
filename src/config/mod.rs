//! Site profile configuration
//!
//! A site profile is a TOML file describing one shop: where its listing
//! starts, which selectors find items and fields, how its stock badges read,
//! and how aggressively to batch and retry.
//!
//! # Example
//!
//! ```no_run
//! use catalog_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("profiles/morfars.toml")).unwrap();
//! println!("Batch size: {}", config.batch.size);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    BatchConfig, Config, ExtractionConfig, ExtractionStrategy, FieldSelectors, FrontierConfig,
    FrontierMode, HttpConfig, OutputConfig, PriceUnit, RetryConfig, SiteConfig, StockConfig,
    StockRuleEntry, VariantConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
