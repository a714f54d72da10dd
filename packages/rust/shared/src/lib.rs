//! Shared types, error model, and configuration for LeadScout.
//!
//! This crate is the foundation depended on by all other LeadScout crates.
//! It provides:
//! - [`LeadscoutError`] — the unified error type
//! - Domain types ([`Entity`], [`Lead`], [`WebsiteCheck`], [`RawListing`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ExportConfig, FilterConfig, LaneLimits, RateLimitsConfig,
    StealthConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_config,
};
pub use error::{LeadscoutError, Result};
pub use types::{
    Address, CheckDepth, CheckTier, Entity, Lead, RawListing, Source, SourceId, WebsiteCheck,
    WebsiteStatus, extract_postal_code,
};
