//! Parses `GeoJSON` `FeatureCollection` documents into [`Layer`]s.
//!
//! The layer CRS comes from, in order: the caller's override, the legacy
//! top-level `crs` member, or the RFC 7946 default of WGS 84.

use geojson::GeoJson;
use redlining_layer_models::{AttributeValue, Crs, Feature, Layer};

use crate::LayerError;

/// Parses a `FeatureCollection` into a layer.
///
/// Features without a geometry are skipped with a warning.
///
/// # Errors
///
/// Returns [`LayerError`] if the text is not valid `GeoJSON`, is not a
/// `FeatureCollection`, or holds a geometry that cannot be converted.
pub fn parse_feature_collection(
    name: &str,
    text: &str,
    crs_override: Option<&Crs>,
) -> Result<Layer, LayerError> {
    let geojson: GeoJson = text.parse()?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(LayerError::NotFeatureCollection {
            layer: name.to_string(),
        });
    };

    let crs = match crs_override {
        Some(crs) => crs.clone(),
        None => declared_crs(collection.foreign_members.as_ref()).unwrap_or_else(Crs::wgs84),
    };

    let mut features = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;

    for (index, feature) in collection.features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };

        let geometry: geo::Geometry<f64> =
            geometry
                .try_into()
                .map_err(|e: geojson::Error| LayerError::InvalidGeometry {
                    layer: name.to_string(),
                    index,
                    message: e.to_string(),
                })?;

        let attributes = feature
            .properties
            .map(|props| props.into_iter().map(|(k, v)| (k, json_to_attribute(v))).collect())
            .unwrap_or_default();

        features.push(Feature::new(geometry, attributes));
    }

    if skipped > 0 {
        log::warn!("{name}: skipped {skipped} features without geometry");
    }

    Ok(Layer::new(name, crs, features))
}

/// Reads the pre-RFC 7946 `crs` member.
///
/// Handles both the `name` form (`{"type":"name","properties":{"name":
/// "urn:ogc:def:crs:EPSG::3857"}}`) and the older `EPSG` form
/// (`{"type":"EPSG","properties":{"code":3857}}`).
fn declared_crs(foreign_members: Option<&geojson::JsonObject>) -> Option<Crs> {
    let crs = foreign_members?.get("crs")?;
    let props = crs.get("properties")?;

    if let Some(name) = props.get("name").and_then(serde_json::Value::as_str) {
        return Crs::parse(name).ok();
    }

    props
        .get("code")
        .and_then(serde_json::Value::as_u64)
        .and_then(|code| u32::try_from(code).ok())
        .map(Crs::epsg)
}

fn json_to_attribute(value: serde_json::Value) -> AttributeValue {
    match value {
        serde_json::Value::Null => AttributeValue::Missing,
        serde_json::Value::Number(n) => n
            .as_f64()
            .map_or(AttributeValue::Missing, AttributeValue::Number),
        serde_json::Value::String(s) => AttributeValue::Text(s),
        serde_json::Value::Bool(b) => AttributeValue::Text(b.to_string()),
        other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
            AttributeValue::Text(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redlining_layer_models::GeometryKind;

    const ZONES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"grade": "C", "area_id": 12, "label": null},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"grade": "D"},
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn parses_features_and_defaults_to_wgs84() {
        let layer = parse_feature_collection("zones", ZONES, None).unwrap();

        assert_eq!(layer.crs, Crs::wgs84());
        assert_eq!(layer.len(), 1);

        let feature = &layer.features[0];
        assert_eq!(GeometryKind::of(&feature.geometry), GeometryKind::Polygon);
        assert_eq!(feature.text("grade"), Some("C"));
        assert_eq!(
            feature.attribute("area_id"),
            Some(&AttributeValue::Number(12.0))
        );
        assert_eq!(feature.attribute("label"), Some(&AttributeValue::Missing));
    }

    #[test]
    fn reads_legacy_crs_member() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
            "features": []
        }"#;

        let layer = parse_feature_collection("ej", text, None).unwrap();
        assert_eq!(layer.crs, Crs::epsg(3857));
        assert!(layer.is_empty());
    }

    #[test]
    fn override_wins_over_declared_crs() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "EPSG", "properties": {"code": 3857}},
            "features": []
        }"#;

        let declared = parse_feature_collection("ej", text, None).unwrap();
        assert_eq!(declared.crs, Crs::epsg(3857));

        let overridden = parse_feature_collection("ej", text, Some(&Crs::epsg(3310))).unwrap();
        assert_eq!(overridden.crs, Crs::epsg(3310));
    }

    #[test]
    fn rejects_bare_geometry() {
        let text = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        assert!(matches!(
            parse_feature_collection("x", text, None),
            Err(LayerError::NotFeatureCollection { .. })
        ));
    }
}
