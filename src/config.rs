//! Upload configuration module.
//!
//! Handles loading, validating, and merging `media.toml`. Stock defaults are
//! overridden by whatever keys the user file sets; every value is then passed
//! explicitly into the pipeline, never read from global state.
//!
//! ## Config File Location
//!
//! `--config <path>` on the command line, otherwise `<store>/media.toml`.
//! A missing file means "all defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [limits]
//! max_upload_bytes = 10485760   # 10 MiB, applies to uploads and remote fetches
//! allowed_extensions = ["jpg", "jpeg", "png", "gif", "webp", "svg", "pdf", "doc", "docx"]
//!
//! [images]
//! max_width = 1920              # Bounding box for optimized images
//! max_height = 1080
//! quality = 85                  # 1-100
//!
//! [fetch]
//! connect_timeout_secs = 10
//! timeout_secs = 10
//!
//! [store]
//! unique_hashes = false         # Reject a second asset with the same content hash
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse, so override just the values you want:
//!
//! ```toml
//! [images]
//! quality = 90
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default config filename inside a store root.
pub const CONFIG_FILENAME: &str = "media.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Upload configuration loaded from `media.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Size and extension gates applied before any processing.
    pub limits: LimitsConfig,
    /// Optimization bounds and quality.
    pub images: ImagesConfig,
    /// Remote URL fetch timeouts.
    pub fetch: FetchConfig,
    /// Asset store behaviour.
    pub store: StoreConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl UploadConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_upload_bytes must be non-zero".into(),
            ));
        }
        if self.limits.allowed_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "limits.allowed_extensions must not be empty".into(),
            ));
        }
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.max_width == 0 || self.images.max_height == 0 {
            return Err(ConfigError::Validation(
                "images.max_width and images.max_height must be non-zero".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 || self.fetch.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch timeouts must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Size and extension gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
    /// Accepted file extensions, without the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "webp", "svg", "pdf", "doc", "docx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl LimitsConfig {
    /// Case-insensitive membership test; a leading dot on either side is ignored.
    pub fn is_allowed(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Optimization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Images wider than this are scaled down (aspect ratio kept).
    pub max_width: u32,
    /// Images taller than this are scaled down (aspect ratio kept).
    pub max_height: u32,
    /// Encoding quality (1 = worst, 100 = best). PNG maps it to compression effort.
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            quality: 85,
        }
    }
}

/// Remote fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    /// Whole-request timeout, including reading the body.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            timeout_secs: 10,
        }
    }
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Asset store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// When true the store refuses a second asset with an existing content
    /// hash, closing the race between concurrent uploads of the same bytes.
    pub unique_hashes: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel ingest workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(UploadConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<UploadConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: UploadConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// A missing file yields the stock defaults. A file that exists but fails to
/// parse or validate is an error.
pub fn load_config(path: &Path) -> Result<UploadConfig, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(overlay))
}

/// Returns a fully-commented stock `media.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# media-ingest configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Upload limits
# ---------------------------------------------------------------------------
[limits]
# Largest accepted upload in bytes (uploads and remote fetches).
max_upload_bytes = 10485760

# Accepted file extensions. Anything else is rejected before processing.
allowed_extensions = ["jpg", "jpeg", "png", "gif", "webp", "svg", "pdf", "doc", "docx"]

# ---------------------------------------------------------------------------
# Image optimization (jpg, jpeg, png, webp uploads)
# ---------------------------------------------------------------------------
[images]
# Larger images are scaled down to fit this box, keeping their aspect ratio.
# Smaller images are never scaled up.
max_width = 1920
max_height = 1080

# Encoding quality, 1-100. JPEG uses it directly; PNG and WebP are stored
# lossless and PNG maps it to compression effort.
quality = 85

# ---------------------------------------------------------------------------
# Remote fetch
# ---------------------------------------------------------------------------
[fetch]
connect_timeout_secs = 10
timeout_secs = 10

# ---------------------------------------------------------------------------
# Asset store
# ---------------------------------------------------------------------------
[store]
# Refuse to store two assets with the same content hash even when two
# uploads of the same file race each other.
unique_hashes = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel ingest workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
