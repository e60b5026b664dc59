//! TOML run configuration.

use std::path::{Path, PathBuf};

use redlining_layer_models::{Crs, LayerSource};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not a valid run configuration.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// One analysis run: three sources plus output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Directory the CSV tables are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// CRS every layer is normalized into. Defaults to the `EJScreen`
    /// layer's CRS.
    #[serde(default)]
    pub reference_crs: Option<Crs>,
    /// `EJScreen` block-group indicators.
    pub ejscreen: EjScreenConfig,
    /// HOLC redlining zones.
    pub redlining: RedliningConfig,
    /// Bird observation points.
    pub birds: BirdsConfig,
}

/// `EJScreen` layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EjScreenConfig {
    /// Layer name used in logs and errors.
    #[serde(default = "default_ejscreen_name")]
    pub name: String,
    /// Exact `CNTY_NAME` to keep. Empty keeps every county.
    #[serde(default = "default_county")]
    pub county: String,
    /// Where to read the layer from.
    pub source: LayerSource,
}

/// Redlining layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedliningConfig {
    /// Layer name used in logs and errors.
    #[serde(default = "default_redlining_name")]
    pub name: String,
    /// Drop zones without a grade instead of failing.
    #[serde(default)]
    pub drop_ungraded: bool,
    /// Where to read the layer from.
    pub source: LayerSource,
}

/// Bird observation layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BirdsConfig {
    /// Layer name used in logs and errors.
    #[serde(default = "default_birds_name")]
    pub name: String,
    /// Keep only observations from this calendar year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Attribute holding the observation year or date.
    #[serde(default = "default_date_attribute")]
    pub date_attribute: String,
    /// Where to read the layer from.
    pub source: LayerSource,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

fn default_ejscreen_name() -> String {
    "ejscreen".to_string()
}

fn default_county() -> String {
    "Los Angeles County".to_string()
}

fn default_redlining_name() -> String {
    "holc".to_string()
}

fn default_birds_name() -> String {
    "birds".to_string()
}

fn default_date_attribute() -> String {
    "year".to_string()
}

impl RunConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is not a valid config.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}
