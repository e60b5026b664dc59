#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CRS normalization for geometry layers.
//!
//! Every layer carries its CRS explicitly. [`CrsRegistry::normalize`] takes
//! the reference CRS as an argument and returns either the input layer
//! untouched or a reprojected copy, together with a flag saying which
//! happened.

pub mod definitions;
pub mod transform;

use redlining_layer_models::{Crs, Feature, Layer};
use thiserror::Error;

pub use definitions::{CrsRegistry, Definition};
pub use transform::CoordTransformer;

/// Errors that can occur during CRS resolution and reprojection.
#[derive(Debug, Error)]
pub enum CrsError {
    /// The identifier has no registered transform definition.
    #[error("Unknown CRS {crs}: no transform definition available")]
    UnknownCrs {
        /// The unresolved identifier.
        crs: String,
    },

    /// `proj4rs` rejected a registered definition.
    #[error("Invalid definition for {crs}: {message}")]
    Definition {
        /// The identifier whose definition failed.
        crs: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A coordinate could not be transformed.
    #[error("Layer {layer}: failed to reproject feature {index} from {from} to {to}: {message}")]
    Transform {
        /// Layer name.
        layer: String,
        /// Position of the feature in its layer.
        index: usize,
        /// Source CRS.
        from: String,
        /// Target CRS.
        to: String,
        /// Description of what went wrong.
        message: String,
    },
}

/// Result of normalizing a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The layer, now in the reference CRS.
    pub layer: Layer,
    /// Whether coordinates were transformed (false: already matched).
    pub reprojected: bool,
}

impl CrsRegistry {
    /// Builds a transformer from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::UnknownCrs`] if either identifier is unknown, or
    /// [`CrsError::Definition`] if a definition is rejected.
    pub fn transformer(&self, from: &Crs, to: &Crs) -> Result<CoordTransformer, CrsError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        CoordTransformer::new(source, target).map_err(|message| CrsError::Definition {
            crs: format!("{from} -> {to}"),
            message,
        })
    }

    /// Returns `layer` in the `reference` CRS.
    ///
    /// Both identifiers are resolved first, so an unknown CRS fails even
    /// when the two identifiers already match. Attributes are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError`] if resolution or any coordinate transform fails.
    pub fn normalize(&self, reference: &Crs, layer: Layer) -> Result<Normalized, CrsError> {
        self.resolve(reference)?;
        self.resolve(&layer.crs)?;

        if &layer.crs == reference {
            log::info!(
                "{}: already in {reference}, no reprojection needed",
                layer.name
            );
            return Ok(Normalized {
                layer,
                reprojected: false,
            });
        }

        log::info!(
            "{}: reprojecting {} features from {} to {reference}",
            layer.name,
            layer.len(),
            layer.crs
        );

        let transformer = self.transformer(&layer.crs, reference)?;

        let features = layer
            .features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let geometry = transformer
                    .transform_geometry(&feature.geometry)
                    .map_err(|message| CrsError::Transform {
                        layer: layer.name.clone(),
                        index,
                        from: layer.crs.to_string(),
                        to: reference.to_string(),
                        message,
                    })?;
                Ok(Feature::new(geometry, feature.attributes.clone()))
            })
            .collect::<Result<Vec<_>, CrsError>>()?;

        Ok(Normalized {
            layer: Layer::new(layer.name, reference.clone(), features),
            reprojected: true,
        })
    }
}

/// Normalizes `layer` into the CRS of `reference` using the built-in
/// definitions. `reference` is only read.
///
/// # Errors
///
/// See [`CrsRegistry::normalize`].
pub fn normalize_to_layer(reference: &Layer, layer: Layer) -> Result<Normalized, CrsError> {
    CrsRegistry::default().normalize(&reference.crs, layer)
}
