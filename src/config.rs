//! Editor configuration module.
//!
//! Handles loading, validating, and merging `pressroom.toml`. Stock defaults
//! are serialized to a TOML value, the user's file is merged on top of them
//! key by key, and the result is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [editor]
//! debounce_ms = 1500        # Quiet window before a preview regenerates
//! default_quality = 75      # Quality of newly loaded images (1-100)
//!
//! [encoder]
//! format = "avif"           # avif | jpeg
//! preview_speed = 10        # AVIF encoder speed for previews (1-10)
//! final_speed = 4           # AVIF encoder speed for final encodes (1-10)
//! max_pixels = 100000000    # Largest pixel buffer the decoder may allocate
//!
//! [logging]
//! level = "info"            # off | error | warn | info | debug | trace
//! # file = "pressroom.log"  # Also append log lines to this file
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want:
//!
//! ```toml
//! [editor]
//! debounce_ms = 500
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality, RustBackend};
use crate::imaging::rust_backend::DEFAULT_MAX_PIXELS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// File name looked up when no explicit config path is given.
pub const CONFIG_FILE_NAME: &str = "pressroom.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Editor configuration loaded from `pressroom.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Interactive editing behavior.
    pub editor: EditingConfig,
    /// Encoder format and effort.
    pub encoder: EncoderConfig,
    /// Log level and destination.
    pub logging: LoggingConfig,
}

impl EditorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.editor.default_quality) {
            return Err(ConfigError::Validation(
                "editor.default_quality must be 1-100".into(),
            ));
        }
        for (key, speed) in [
            ("encoder.preview_speed", self.encoder.preview_speed),
            ("encoder.final_speed", self.encoder.final_speed),
        ] {
            if !(1..=10).contains(&speed) {
                return Err(ConfigError::Validation(format!("{key} must be 1-10")));
            }
        }
        if self.encoder.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "encoder.max_pixels must be positive".into(),
            ));
        }
        self.logging.level_filter()?;
        Ok(())
    }

    /// Quiet window of the per-item debounce timer.
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.editor.debounce_ms)
    }

    pub fn default_quality(&self) -> Quality {
        Quality::new(self.editor.default_quality)
    }

    /// The production codec configured from `[encoder]`.
    pub fn build_backend(&self) -> RustBackend {
        RustBackend::new()
            .with_speeds(self.encoder.preview_speed, self.encoder.final_speed)
            .with_max_pixels(self.encoder.max_pixels)
    }
}

/// Interactive editing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditingConfig {
    /// Milliseconds of quiet after the last edit before a preview is rebuilt.
    pub debounce_ms: u64,
    /// Quality assigned to newly ingested images.
    pub default_quality: u32,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1500,
            default_quality: 75,
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Output codec of previews and final artifacts.
    pub format: OutputFormat,
    /// AVIF encoder speed used for previews (10 = fastest).
    pub preview_speed: u8,
    /// AVIF encoder speed used for final encodes.
    pub final_speed: u8,
    /// Pixel budget; larger images fail with no drawing surface.
    pub max_pixels: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Avif,
            preview_speed: 10,
            final_speed: 4,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Optional log file, appended to in addition to stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        log::LevelFilter::from_str(&self.level).map_err(|_| {
            ConfigError::Validation(format!("logging.level {:?} is not a log level", self.level))
        })
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML value, the base every user file merges onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(EditorConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` onto `base`. Tables merge key by key; any
/// other overlay value replaces the base value outright.
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<EditorConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EditorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`, falling back to stock defaults when
/// it does not exist.
pub fn load_config(path: &Path) -> Result<EditorConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `pressroom.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Pressroom Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Interactive editing
# ---------------------------------------------------------------------------
[editor]
# Milliseconds without edits before the preview of an image is rebuilt.
# Every edit inside the window restarts it.
debounce_ms = 1500

# Quality given to newly loaded images (1 = smallest, 100 = best).
default_quality = 75

# ---------------------------------------------------------------------------
# Encoder
# ---------------------------------------------------------------------------
[encoder]
# Output format: "avif" or "jpeg".
format = "avif"

# AVIF encoder speed (1 = slowest/best, 10 = fastest).
# Previews favor speed, final encodes favor compression.
preview_speed = 10
final_speed = 4

# Largest image (width x height) that may be decoded.
max_pixels = 100000000

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# off | error | warn | info | debug | trace. RUST_LOG overrides this.
level = "info"

# Also append log lines to a file.
# file = "pressroom.log"
"##
}
