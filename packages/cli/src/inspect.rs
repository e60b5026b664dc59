//! `inspect` subcommand: summarize a layer file without running the
//! analysis.

use std::fmt::Write as _;
use std::path::Path;

use clap::ValueEnum;
use redlining_layer_models::{Crs, Layer, LayerSource};

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// `GeoJSON` `FeatureCollection`.
    Geojson,
    /// Delimited point table.
    Csv,
}

impl InputFormat {
    /// Guesses the format from the file extension, defaulting to `GeoJSON`.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv" | "tsv" | "txt") => Self::Csv,
            _ => Self::Geojson,
        }
    }
}

/// Builds a [`LayerSource`] for an ad-hoc file.
///
/// `.tsv` files are read tab-delimited.
#[must_use]
pub fn source_for(
    path: &Path,
    format: Option<InputFormat>,
    longitude: &str,
    latitude: &str,
    crs: Option<Crs>,
) -> LayerSource {
    match format.unwrap_or_else(|| InputFormat::from_path(path)) {
        InputFormat::Geojson => LayerSource::Geojson {
            path: path.to_path_buf(),
            crs,
        },
        InputFormat::Csv => LayerSource::Csv {
            path: path.to_path_buf(),
            longitude: longitude.to_string(),
            latitude: latitude.to_string(),
            crs,
            delimiter: path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("tsv"))
                .then_some('\t'),
        },
    }
}

/// Feature count, CRS, geometry kinds, and attribute names of `layer`.
#[must_use]
pub fn describe(layer: &Layer) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Layer:      {}", layer.name);
    let _ = writeln!(out, "CRS:        {}", layer.crs);
    let _ = writeln!(out, "Features:   {}", layer.len());

    let kinds = layer
        .geometry_kinds()
        .iter()
        .map(|(kind, count)| format!("{kind} ({count})"))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "Geometries: {kinds}");

    let names = layer.attribute_names().into_iter().collect::<Vec<_>>().join(", ");
    let _ = writeln!(out, "Attributes: {names}");

    out
}
