//! Attribute filters applied to loaded layers.
//!
//! Filters borrow their input and return a new layer.

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime};
use redlining_layer_models::{AttributeValue, Feature, Layer};

use crate::LayerError;

/// Keeps features whose `attribute` is text exactly equal to `value`.
///
/// # Errors
///
/// Returns [`LayerError::MissingAttribute`] if a feature does not carry the
/// attribute at all.
pub fn filter_equals(layer: &Layer, attribute: &str, value: &str) -> Result<Layer, LayerError> {
    let mut kept = Vec::new();

    for (index, feature) in layer.features.iter().enumerate() {
        let attr = require(layer, index, feature, attribute)?;
        if attr.as_str() == Some(value) {
            kept.push(feature.clone());
        }
    }

    log::info!(
        "{}: kept {} of {} features where {attribute} = {value:?}",
        layer.name,
        kept.len(),
        layer.len()
    );

    Ok(layer.with_features(kept))
}

/// Keeps features whose `attribute` falls in calendar year `year`.
///
/// The attribute may be a number (the year itself), a bare year string, a
/// `YYYY-MM-DD` date, a naive `YYYY-MM-DDTHH:MM:SS` timestamp, or an
/// RFC 3339 timestamp. Features whose value is missing or unparseable are
/// dropped.
///
/// # Errors
///
/// Returns [`LayerError::MissingAttribute`] if a feature does not carry the
/// attribute at all.
pub fn filter_year(layer: &Layer, attribute: &str, year: i32) -> Result<Layer, LayerError> {
    let mut kept = Vec::new();
    let mut unparsed = 0usize;

    for (index, feature) in layer.features.iter().enumerate() {
        let attr = require(layer, index, feature, attribute)?;
        match year_of(attr) {
            Some(y) if y == year => kept.push(feature.clone()),
            Some(_) => {}
            None => unparsed += 1,
        }
    }

    if unparsed > 0 {
        log::warn!(
            "{}: {unparsed} features have no usable {attribute} value",
            layer.name
        );
    }
    log::info!(
        "{}: kept {} of {} features observed in {year}",
        layer.name,
        kept.len(),
        layer.len()
    );

    Ok(layer.with_features(kept))
}

/// Drops features whose `attribute` is absent, missing, or blank text.
#[must_use]
pub fn drop_missing(layer: &Layer, attribute: &str) -> Layer {
    let kept: Vec<Feature> = layer
        .features
        .iter()
        .filter(|f| match f.attribute(attribute) {
            None | Some(AttributeValue::Missing) => false,
            Some(AttributeValue::Text(s)) => !s.trim().is_empty(),
            Some(AttributeValue::Number(n)) => !n.is_nan(),
        })
        .cloned()
        .collect();

    let dropped = layer.len() - kept.len();
    if dropped > 0 {
        log::warn!(
            "{}: dropped {dropped} features without a {attribute} value",
            layer.name
        );
    }

    layer.with_features(kept)
}

fn require<'a>(
    layer: &Layer,
    index: usize,
    feature: &'a Feature,
    attribute: &str,
) -> Result<&'a AttributeValue, LayerError> {
    feature
        .attribute(attribute)
        .ok_or_else(|| LayerError::MissingAttribute {
            layer: layer.name.clone(),
            index,
            attribute: attribute.to_string(),
        })
}

#[allow(clippy::cast_possible_truncation)]
fn year_of(value: &AttributeValue) -> Option<i32> {
    match value {
        AttributeValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i32),
        AttributeValue::Number(_) | AttributeValue::Missing => None,
        AttributeValue::Text(s) => parse_year(s.trim()),
    }
}

fn parse_year(s: &str) -> Option<i32> {
    if let Ok(year) = s.parse::<i32>() {
        return Some(year);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.year());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts.year());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.year());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|ts| ts.year())
}
