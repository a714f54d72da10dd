//! Application configuration for LeadScout.
//!
//! User config lives at `~/.leadscout/leadscout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LeadscoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadscout";

// ---------------------------------------------------------------------------
// Config structs (matching leadscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Request pacing per traffic lane.
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,

    /// Low-and-slow session profile.
    #[serde(default)]
    pub stealth: StealthConfig,

    /// Lead filtering criteria.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Export settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Sources to query: "directory", "maps", or "all".
    #[serde(default = "default_sources")]
    pub sources: String,

    /// Website check depth: "fast", "normal", or "thorough".
    #[serde(default = "default_depth")]
    pub check_depth: String,

    /// Maximum result pages to fetch per scan unit.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Stop a scan unit after this many raw records (0 = unlimited).
    #[serde(default)]
    pub limit: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            check_depth: default_depth(),
            max_pages: default_max_pages(),
            limit: 0,
        }
    }
}

fn default_sources() -> String {
    "directory".into()
}
fn default_depth() -> String {
    "normal".into()
}
fn default_max_pages() -> u32 {
    50
}

/// Pacing limits for one traffic lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneLimits {
    /// Minimum random delay before each request, in milliseconds.
    pub delay_min_ms: u64,
    /// Maximum random delay before each request, in milliseconds.
    pub delay_max_ms: u64,
    /// Sliding-window cap on requests per minute.
    pub max_per_minute: u32,
    /// Insert a long pause after this many requests (0 = never).
    #[serde(default)]
    pub pause_every: u32,
    /// Minimum long-pause duration, in milliseconds.
    #[serde(default)]
    pub pause_min_ms: u64,
    /// Maximum long-pause duration, in milliseconds.
    #[serde(default)]
    pub pause_max_ms: u64,
}

/// `[rate_limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Pacing for the primary data source.
    #[serde(default = "default_primary_lane")]
    pub primary: LaneLimits,

    /// Pacing for third-party business websites.
    #[serde(default = "default_external_lane")]
    pub external: LaneLimits,

    /// Retries per request before a domain is marked degraded.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff after a throttled or failed request, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Ceiling on the exponential backoff, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_lane(),
            external: default_external_lane(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

fn default_primary_lane() -> LaneLimits {
    LaneLimits {
        delay_min_ms: 2_000,
        delay_max_ms: 4_000,
        max_per_minute: 15,
        pause_every: 20,
        pause_min_ms: 15_000,
        pause_max_ms: 30_000,
    }
}
fn default_external_lane() -> LaneLimits {
    LaneLimits {
        delay_min_ms: 1_000,
        delay_max_ms: 2_000,
        max_per_minute: 30,
        pause_every: 0,
        pause_min_ms: 0,
        pause_max_ms: 0,
    }
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    2_000
}
fn default_backoff_cap_ms() -> u64 {
    300_000
}

/// `[stealth]` section. When enabled, replaces the primary lane's pacing
/// with a much slower profile and adds hard session ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StealthConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Minimum random delay between requests, in milliseconds.
    #[serde(default = "default_stealth_delay_min_ms")]
    pub delay_min_ms: u64,

    /// Maximum random delay between requests, in milliseconds.
    #[serde(default = "default_stealth_delay_max_ms")]
    pub delay_max_ms: u64,

    /// Take a long break after this many requests.
    #[serde(default = "default_break_every")]
    pub break_every: u32,

    /// Minimum break duration, in milliseconds.
    #[serde(default = "default_break_min_ms")]
    pub break_min_ms: u64,

    /// Maximum break duration, in milliseconds.
    #[serde(default = "default_break_max_ms")]
    pub break_max_ms: u64,

    /// Hard cap on requests per hour.
    #[serde(default = "default_max_per_hour")]
    pub max_per_hour: u32,

    /// Hard cap on session duration, in minutes.
    #[serde(default = "default_max_session_mins")]
    pub max_session_mins: u32,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_min_ms: default_stealth_delay_min_ms(),
            delay_max_ms: default_stealth_delay_max_ms(),
            break_every: default_break_every(),
            break_min_ms: default_break_min_ms(),
            break_max_ms: default_break_max_ms(),
            max_per_hour: default_max_per_hour(),
            max_session_mins: default_max_session_mins(),
        }
    }
}

fn default_stealth_delay_min_ms() -> u64 {
    30_000
}
fn default_stealth_delay_max_ms() -> u64 {
    90_000
}
fn default_break_every() -> u32 {
    12
}
fn default_break_min_ms() -> u64 {
    180_000
}
fn default_break_max_ms() -> u64 {
    480_000
}
fn default_max_per_hour() -> u32 {
    50
}
fn default_max_session_mins() -> u32 {
    180
}

/// `[filters]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Website statuses that pass the filter.
    #[serde(default = "default_include_statuses")]
    pub include_statuses: Vec<String>,

    /// Minimum quality score (0-100).
    #[serde(default)]
    pub min_quality: u8,

    #[serde(default)]
    pub require_phone: bool,

    #[serde(default)]
    pub require_email: bool,

    #[serde(default)]
    pub require_address: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_statuses: default_include_statuses(),
            min_quality: 0,
            require_phone: false,
            require_email: false,
            require_address: false,
        }
    }
}

fn default_include_statuses() -> Vec<String> {
    // The pitch targets businesses without a modern web presence.
    vec![
        "none".into(),
        "stale".into(),
        "unknown".into(),
        "unchecked".into(),
    ]
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory exports are written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Export format: "json", "csv", or "both".
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: default_format(),
        }
    }
}

fn default_output_dir() -> String {
    "~/leadscout-exports".into()
}
fn default_format() -> String {
    "json".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadscoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadscout/leadscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadscoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LeadscoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadscoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadscoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadscoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Sanity-check delay windows and caps before a run starts.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    for (lane, limits) in [
        ("primary", &config.rate_limits.primary),
        ("external", &config.rate_limits.external),
    ] {
        if limits.delay_min_ms > limits.delay_max_ms {
            return Err(LeadscoutError::config(format!(
                "rate_limits.{lane}: delay_min_ms exceeds delay_max_ms"
            )));
        }
        if limits.max_per_minute == 0 {
            return Err(LeadscoutError::config(format!(
                "rate_limits.{lane}: max_per_minute must be at least 1"
            )));
        }
    }
    if config.stealth.delay_min_ms > config.stealth.delay_max_ms {
        return Err(LeadscoutError::config(
            "stealth: delay_min_ms exceeds delay_max_ms",
        ));
    }
    if config.filters.min_quality > 100 {
        return Err(LeadscoutError::config(
            "filters: min_quality must be within 0-100",
        ));
    }
    Ok(())
}
