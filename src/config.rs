//! Configuration module.
//!
//! Handles loading, validating, and merging `vision-prep.toml`. Stock
//! defaults are the base layer; a config file overrides any subset of them;
//! command-line flags override the result.
//!
//! ## Config File Location
//!
//! `--config PATH` names the file explicitly. Without it, `vision-prep.toml`
//! in the working directory is used if present, otherwise the stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [normalize]
//! max_long_side = 2048              # Hard cap on the longer edge (px)
//! target_min_short_side = 768       # Short-edge floor after a downscale (px)
//! max_bytes = 4194304               # Soft cap on the encoded size (4 MiB)
//! initial_quality = 0.92            # First JPEG quality
//! min_quality = 0.60                # Lowest JPEG quality the loop may reach
//! quality_step = 0.05               # Decrement per compression pass
//! preserve_transparent_format = true
//!
//! [processing]
//! max_processes = 4                 # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [normalize]
//! max_long_side = 1568
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::NormalizeOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILENAME: &str = "vision-prep.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `vision-prep.toml`.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Normalizer bounds.
    pub normalize: NormalizeOptions,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_options(&self.normalize)
    }
}

/// Check normalizer options for values the algorithm cannot work with.
pub fn validate_options(options: &NormalizeOptions) -> Result<(), ConfigError> {
    if options.max_long_side == 0 {
        return Err(ConfigError::Validation(
            "normalize.max_long_side must be greater than 0".into(),
        ));
    }
    if options.target_min_short_side == 0 {
        return Err(ConfigError::Validation(
            "normalize.target_min_short_side must be greater than 0".into(),
        ));
    }
    if options.max_bytes == 0 {
        return Err(ConfigError::Validation(
            "normalize.max_bytes must be greater than 0".into(),
        ));
    }
    for (name, value) in [
        ("initial_quality", options.initial_quality),
        ("min_quality", options.min_quality),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "normalize.{name} must be in (0, 1], got {value}"
            )));
        }
    }
    if options.min_quality > options.initial_quality {
        return Err(ConfigError::Validation(
            "normalize.min_quality must not exceed normalize.initial_quality".into(),
        ));
    }
    if !(options.quality_step >= 0.01 && options.quality_step <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "normalize.quality_step must be in [0.01, 1], got {}",
            options.quality_step
        )));
    }
    Ok(())
}

/// `[processing]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Worker threads for batch runs. Unset means one per core; larger
    /// values are capped at the core count.
    pub max_processes: Option<usize>,
}

/// Worker threads to use for `config`: `max_processes` clamped to
/// `1..=cores`, or all cores when unset.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    match config.max_processes {
        Some(n) => n.clamp(1, cores),
        None => cores,
    }
}

// =============================================================================
// Loading
// =============================================================================

/// [`Config::default`] as a TOML table, the bottom layer every user file is
/// merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Layer `overlay` onto `base`. Tables merge per key, recursively; any other
/// overlay value replaces what was there.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut merged), toml::Value::Table(layer)) => {
            for (key, value) in layer {
                let value = match merged.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            toml::Value::Table(merged)
        }
        (_, replacement) => replacement,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `vision-prep.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    let overlay = load_raw_config(&dir.join(CONFIG_FILENAME))?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Load config from an explicitly named file. A missing file is an error.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let overlay = load_raw_config(path)?.ok_or_else(|| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        ))
    })?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock `vision-prep.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# vision-prep Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as vision-prep.toml in the working directory, or pass
# --config <path>. Command-line flags override values from this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Normalization bounds
# ---------------------------------------------------------------------------
[normalize]
# Hard cap on the longer edge, in pixels. Images are never upscaled.
max_long_side = 2048

# After a downscale, the shorter edge is raised toward this value when the
# original was at least this large, as long as the long-side cap still holds.
target_min_short_side = 768

# Soft cap on the encoded size, in bytes (4 MiB). JPEG quality is stepped
# down until the output fits or min_quality is reached; missing the cap is
# reported, not fatal. PNG output is never recompressed.
max_bytes = 4194304

# JPEG quality as a fraction: first attempt, floor, and step per pass.
initial_quality = 0.92
min_quality = 0.60
quality_step = 0.05

# Keep PNG output when a PNG/WebP/GIF source has real transparency.
# When false, transparent pixels are flattened onto white in a JPEG.
preserve_transparent_format = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel normalization workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
