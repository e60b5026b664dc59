//! Per-[`LayerKind`] schema checks run right after loading.

use redlining_layer_models::{AttributeValue, GeometryKind, HolcGrade, Layer, LayerKind, attrs};

use crate::LayerError;

/// Validates that every feature has the geometry kind and attributes the
/// layer kind requires.
///
/// Numeric indicator attributes must be present but may hold missing
/// values; the block-group `ID` must be non-empty text and `grade` must
/// parse as a [`HolcGrade`], because both become grouping keys.
///
/// # Errors
///
/// Returns [`LayerError::UnexpectedGeometry`],
/// [`LayerError::MissingAttribute`], or [`LayerError::InvalidAttribute`]
/// for the first offending feature.
pub fn validate(layer: &Layer, kind: LayerKind) -> Result<(), LayerError> {
    for (index, feature) in layer.features.iter().enumerate() {
        let geometry_kind = GeometryKind::of(&feature.geometry);
        let geometry_ok = if kind.is_polygonal() {
            geometry_kind.is_polygonal()
        } else {
            geometry_kind == GeometryKind::Point
        };
        if !geometry_ok {
            return Err(LayerError::UnexpectedGeometry {
                layer: layer.name.clone(),
                index,
                found: geometry_kind.to_string(),
                expected: if kind.is_polygonal() {
                    "Polygon or MultiPolygon".to_string()
                } else {
                    "Point".to_string()
                },
            });
        }

        for attribute in kind.required_attributes() {
            let Some(value) = feature.attribute(attribute) else {
                return Err(LayerError::MissingAttribute {
                    layer: layer.name.clone(),
                    index,
                    attribute: (*attribute).to_string(),
                });
            };

            let valid = match *attribute {
                attrs::ID => value.as_str().is_some_and(|s| !s.trim().is_empty()),
                attrs::GRADE => value
                    .as_str()
                    .is_some_and(|s| s.trim().parse::<HolcGrade>().is_ok()),
                _ => true,
            };
            if !valid {
                return Err(invalid(layer, index, attribute, value));
            }
        }
    }

    log::debug!("{}: schema valid for {kind}", layer.name);
    Ok(())
}

fn invalid(layer: &Layer, index: usize, attribute: &str, value: &AttributeValue) -> LayerError {
    if value.is_missing() {
        LayerError::MissingAttribute {
            layer: layer.name.clone(),
            index,
            attribute: attribute.to_string(),
        }
    } else {
        LayerError::InvalidAttribute {
            layer: layer.name.clone(),
            index,
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }
}
