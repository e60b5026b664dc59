#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reads source files into [`Layer`]s and prepares them for overlay.
//!
//! `GeoJSON` feature collections and CSV point tables are both turned into
//! the same in-memory layer shape. Filtering and schema validation run on
//! the loaded layers before any CRS or overlay work happens.

pub mod csv_points;
pub mod filter;
pub mod geojson_file;
pub mod schema;

use std::path::Path;

use redlining_layer_models::{Layer, LayerSource};
use thiserror::Error;

/// Errors that can occur while loading or validating layers.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Reading the source file failed.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that failed to read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The `GeoJSON` document could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The `GeoJSON` document is valid but not a `FeatureCollection`.
    #[error("Layer {layer}: expected a GeoJSON FeatureCollection")]
    NotFeatureCollection {
        /// Layer name.
        layer: String,
    },

    /// A geometry could not be converted to a planar geometry.
    #[error("Layer {layer}: feature {index} has an invalid geometry: {message}")]
    InvalidGeometry {
        /// Layer name.
        layer: String,
        /// Position of the feature in its source.
        index: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// A geometry has the wrong kind for its layer.
    #[error("Layer {layer}: feature {index} is a {found}, expected {expected}")]
    UnexpectedGeometry {
        /// Layer name.
        layer: String,
        /// Position of the feature in its layer.
        index: usize,
        /// Geometry kind that was found.
        found: String,
        /// Geometry kind(s) that were expected.
        expected: String,
    },

    /// A coordinate column did not hold a number.
    #[error("Layer {layer}: row {row} has invalid {column} value {value:?}")]
    InvalidCoordinate {
        /// Layer name.
        layer: String,
        /// 1-based data row number.
        row: usize,
        /// Coordinate column name.
        column: String,
        /// Raw cell value.
        value: String,
    },

    /// A CSV column named in the configuration does not exist.
    #[error("Layer {layer}: column {column:?} not found in header")]
    MissingColumn {
        /// Layer name.
        layer: String,
        /// Column that was requested.
        column: String,
    },

    /// A required attribute is absent from a feature.
    #[error("Layer {layer}: feature {index} is missing required attribute {attribute:?}")]
    MissingAttribute {
        /// Layer name.
        layer: String,
        /// Position of the feature in its layer.
        index: usize,
        /// Attribute that was required.
        attribute: String,
    },

    /// A required attribute is present but holds an unusable value.
    #[error("Layer {layer}: feature {index} has invalid {attribute:?} value {value:?}")]
    InvalidAttribute {
        /// Layer name.
        layer: String,
        /// Position of the feature in its layer.
        index: usize,
        /// Attribute name.
        attribute: String,
        /// Display form of the offending value.
        value: String,
    },
}

/// Loads a layer from the configured source.
///
/// # Errors
///
/// Returns [`LayerError`] if the file cannot be read or parsed.
pub fn load(name: &str, source: &LayerSource) -> Result<Layer, LayerError> {
    log::info!("Loading layer {name} from {}", source.path().display());

    let layer = match source {
        LayerSource::Geojson { path, crs } => {
            let text = read_to_string(path)?;
            geojson_file::parse_feature_collection(name, &text, crs.as_ref())?
        }
        LayerSource::Csv {
            path,
            longitude,
            latitude,
            crs,
            delimiter,
        } => {
            let file = std::fs::File::open(path).map_err(|source| LayerError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let options = csv_points::CsvPointOptions {
                longitude,
                latitude,
                crs: crs.clone(),
                delimiter: *delimiter,
            };
            csv_points::read_points(name, file, &options)?
        }
    };

    log::info!(
        "Loaded layer {name}: {} features in {}",
        layer.len(),
        layer.crs
    );

    Ok(layer)
}

fn read_to_string(path: &Path) -> Result<String, LayerError> {
    std::fs::read_to_string(path).map_err(|source| LayerError::Io {
        path: path.display().to_string(),
        source,
    })
}
