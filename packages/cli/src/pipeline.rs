//! The analysis run: load, normalize, overlay, aggregate, report.
//!
//! [`run`] drives the whole thing from a [`RunConfig`]. The stages are
//! exposed separately so they can be exercised on in-memory layers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use redlining_analytics::AnalyticsError;
use redlining_analytics::tables::{
    bird_observations_by_grade, census_block_by_grade, condition_summary, derive_block_group_codes,
};
use redlining_analytics_models::{BirdObservationRow, CensusBlockRow, ConditionRow, TidyRow};
use redlining_cli_utils::{IndicatifProgress, MultiProgress};
use redlining_crs::{CrsError, CrsRegistry};
use redlining_layer::LayerError;
use redlining_layer::filter::{drop_missing, filter_equals, filter_year};
use redlining_layer::schema::validate;
use redlining_layer_models::{Crs, Layer, LayerKind, attrs};
use redlining_report::{DEFAULT_BAR_WIDTH, ReportError, render_bar_chart, render_table, write_csv};
use redlining_spatial::progress::ProgressCallback;
use redlining_spatial::{OverlayError, overlay};
use thiserror::Error;

use crate::config::{BirdsConfig, EjScreenConfig, RedliningConfig, RunConfig};

/// File name of the census-block-by-grade table.
pub const CENSUS_BLOCK_CSV: &str = "census_block_by_grade.csv";
/// File name of the condition summary table.
pub const CONDITION_SUMMARY_CSV: &str = "condition_summary.csv";
/// File name of the bird observation table.
pub const BIRD_OBSERVATIONS_CSV: &str = "bird_observations_by_grade.csv";

/// Errors that can abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A layer could not be loaded, filtered, or validated.
    #[error(transparent)]
    Layer(#[from] LayerError),
    /// CRS normalization failed.
    #[error(transparent)]
    Crs(#[from] CrsError),
    /// Overlay failed.
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    /// Aggregation failed.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    /// Output could not be written.
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// The three prepared input layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Layers {
    /// Block groups of the selected county.
    pub ejscreen: Layer,
    /// Graded HOLC zones.
    pub redlining: Layer,
    /// Bird observations of the selected year.
    pub birds: Layer,
}

/// The three published tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Tables {
    /// Share of zone/block-group intersections per grade and block group.
    pub census_blocks: Vec<CensusBlockRow>,
    /// Mean environmental conditions per grade.
    pub conditions: Vec<ConditionRow>,
    /// Bird observations per grade.
    pub birds: Vec<BirdObservationRow>,
}

/// Where and how results are emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    /// Directory the CSV files go to.
    pub output_dir: PathBuf,
    /// Write CSV files.
    pub csv: bool,
    /// Print bar charts after each table.
    pub charts: bool,
}

/// Validates the `EJScreen` layer and keeps the configured county.
///
/// # Errors
///
/// Returns [`LayerError`] if a feature lacks `CNTY_NAME` or fails schema
/// validation.
pub fn prepare_ejscreen(layer: &Layer, config: &EjScreenConfig) -> Result<Layer, LayerError> {
    let layer = if config.county.is_empty() {
        layer.clone()
    } else {
        filter_equals(layer, attrs::CNTY_NAME, &config.county)?
    };
    validate(&layer, LayerKind::EjIndicators)?;
    Ok(layer)
}

/// Optionally drops ungraded zones, then validates the redlining layer.
///
/// # Errors
///
/// Returns [`LayerError`] if a zone has no valid grade (and ungraded zones
/// are not dropped) or fails schema validation.
pub fn prepare_redlining(layer: &Layer, config: &RedliningConfig) -> Result<Layer, LayerError> {
    let layer = if config.drop_ungraded {
        drop_missing(layer, attrs::GRADE)
    } else {
        layer.clone()
    };
    validate(&layer, LayerKind::RedliningZones)?;
    Ok(layer)
}

/// Validates the bird layer and keeps the configured observation year.
///
/// # Errors
///
/// Returns [`LayerError`] if a feature is not a point or lacks the date
/// attribute while a year filter is configured.
pub fn prepare_birds(layer: &Layer, config: &BirdsConfig) -> Result<Layer, LayerError> {
    validate(layer, LayerKind::BirdObservations)?;
    match config.year {
        Some(year) => filter_year(layer, &config.date_attribute, year),
        None => Ok(layer.clone()),
    }
}

/// Loads and prepares all three layers named by `config`.
///
/// # Errors
///
/// Returns [`LayerError`] if any layer fails to load or prepare.
pub fn load_layers(config: &RunConfig) -> Result<Layers, LayerError> {
    let ejscreen = redlining_layer::load(&config.ejscreen.name, &config.ejscreen.source)?;
    let redlining = redlining_layer::load(&config.redlining.name, &config.redlining.source)?;
    let birds = redlining_layer::load(&config.birds.name, &config.birds.source)?;

    Ok(Layers {
        ejscreen: prepare_ejscreen(&ejscreen, &config.ejscreen)?,
        redlining: prepare_redlining(&redlining, &config.redlining)?,
        birds: prepare_birds(&birds, &config.birds)?,
    })
}

/// Normalizes every layer into one CRS, overlays the zones with block
/// groups and bird points, and builds the three tables.
///
/// The reference CRS is `reference` if given, else the `EJScreen` layer's.
/// `progress` creates one progress reporter per overlay.
///
/// # Errors
///
/// Returns [`PipelineError`] if normalization, overlay, or aggregation
/// fails.
pub fn analyze(
    layers: Layers,
    reference: Option<&Crs>,
    registry: &CrsRegistry,
    progress: &dyn Fn(&str) -> Arc<dyn ProgressCallback>,
) -> Result<Tables, PipelineError> {
    let reference = reference.unwrap_or(&layers.ejscreen.crs).clone();
    log::info!("Normalizing layers to {reference}");

    let ejscreen = registry.normalize(&reference, layers.ejscreen)?.layer;
    let redlining = registry.normalize(&reference, layers.redlining)?.layer;
    let birds = registry.normalize(&reference, layers.birds)?.layer;

    let zone_blocks = overlay(
        &redlining,
        &ejscreen,
        progress(&format!("{} x {}", redlining.name, ejscreen.name)).as_ref(),
    )?;
    let zone_blocks = derive_block_group_codes(zone_blocks)?;

    let zone_birds = overlay(
        &redlining,
        &birds,
        progress(&format!("{} x {}", redlining.name, birds.name)).as_ref(),
    )?;

    log::info!(
        "{} zone/block-group intersections, {} observations inside zones",
        zone_blocks.len(),
        zone_birds.len()
    );

    Ok(Tables {
        census_blocks: census_block_by_grade(&zone_blocks)?,
        conditions: condition_summary(&zone_blocks)?,
        birds: bird_observations_by_grade(&zone_birds)?,
    })
}

fn emit<R: TidyRow>(
    title: &str,
    file_name: &str,
    rows: &[R],
    options: &OutputOptions,
) -> Result<(), ReportError> {
    println!("{}", render_table(title, rows));
    if options.charts {
        println!("{}", render_bar_chart(title, rows, DEFAULT_BAR_WIDTH));
    }
    if options.csv {
        write_csv(&options.output_dir.join(file_name), rows)?;
    }
    Ok(())
}

/// Prints each table (and chart) and writes the CSV files.
///
/// # Errors
///
/// Returns [`ReportError`] if a CSV file cannot be written.
pub fn write_outputs(tables: &Tables, options: &OutputOptions) -> Result<(), ReportError> {
    emit(
        "Census block groups by grade",
        CENSUS_BLOCK_CSV,
        &tables.census_blocks,
        options,
    )?;
    emit(
        "Environmental conditions by grade",
        CONDITION_SUMMARY_CSV,
        &tables.conditions,
        options,
    )?;
    emit(
        "Bird observations by grade",
        BIRD_OBSERVATIONS_CSV,
        &tables.birds,
        options,
    )?;
    Ok(())
}

/// Runs the full analysis for `config`.
///
/// # Errors
///
/// Returns the first [`PipelineError`] from any stage.
pub fn run(
    config: &RunConfig,
    options: &OutputOptions,
    multi: &MultiProgress,
) -> Result<(), PipelineError> {
    let start = Instant::now();
    let steps = IndicatifProgress::steps_bar(multi, "Pipeline", 3);

    steps.set_message("Loading layers".to_string());
    let layers = load_layers(config)?;
    steps.inc(1);

    steps.set_message("Overlaying".to_string());
    let tables = analyze(
        layers,
        config.reference_crs.as_ref(),
        &CrsRegistry::default(),
        &|message| IndicatifProgress::overlay_bar(multi, message),
    )?;
    steps.inc(1);

    steps.set_message("Writing tables".to_string());
    write_outputs(&tables, options)?;
    steps.inc(1);
    steps.finish("Pipeline complete".to_string());

    log::info!(
        "Pipeline complete in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, point, polygon};
    use redlining_analytics_models::CONDITIONS;
    use redlining_layer_models::{AttributeValue, Attributes, Feature, HolcGrade, LayerSource};
    use redlining_spatial::progress::null_progress;

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
        ])
    }

    fn feature(geometry: Geometry<f64>, pairs: &[(&str, AttributeValue)]) -> Feature {
        let attributes: Attributes = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        Feature::new(geometry, attributes)
    }

    fn block_group(
        geometry: Geometry<f64>,
        id: &str,
        county: &str,
        values: [AttributeValue; 3],
    ) -> Feature {
        let [low_income, pm25, life] = values;
        feature(
            geometry,
            &[
                ("ID", id.into()),
                ("CNTY_NAME", county.into()),
                ("LOWINCPCT", low_income),
                ("P_PM25", pm25),
                ("P_LIFEEXPPCT", life),
            ],
        )
    }

    fn bird(x: f64, y: f64, year: f64) -> Feature {
        feature(
            Geometry::Point(point!(x: x, y: y)),
            &[("year", year.into()), ("species", "Corvus corax".into())],
        )
    }

    fn raw_layers() -> Layers {
        let ejscreen = Layer::new(
            "ejscreen",
            Crs::wgs84(),
            vec![
                block_group(
                    square(-118.29, 34.01, -118.25, 34.05),
                    "060372073011",
                    "Los Angeles County",
                    [0.2.into(), 40.0.into(), 30.0.into()],
                ),
                block_group(
                    square(-118.24, 34.01, -118.21, 34.05),
                    "060372073012",
                    "Los Angeles County",
                    [0.4.into(), 60.0.into(), AttributeValue::Missing],
                ),
                block_group(
                    square(-118.22, 34.06, -118.18, 34.09),
                    "060372073013",
                    "Los Angeles County",
                    [0.9.into(), 90.0.into(), 80.0.into()],
                ),
                block_group(
                    square(-118.29, 34.06, -118.25, 34.09),
                    "060590000001",
                    "Orange County",
                    [1.0.into(), 100.0.into(), 100.0.into()],
                ),
            ],
        );

        let redlining = Layer::new(
            "holc",
            Crs::wgs84(),
            vec![
                feature(square(-118.30, 34.00, -118.20, 34.10), &[("grade", "C".into())]),
                feature(square(-118.20, 34.00, -118.10, 34.10), &[("grade", "D".into())]),
                feature(
                    square(-118.50, 34.00, -118.40, 34.10),
                    &[("grade", AttributeValue::Missing)],
                ),
            ],
        );

        let birds = Layer::new(
            "birds",
            Crs::wgs84(),
            vec![
                bird(-118.28, 34.02, 2022.0),
                bird(-118.26, 34.06, 2022.0),
                bird(-118.22, 34.08, 2022.0),
                bird(-118.27, 34.03, 2021.0),
                bird(-118.15, 34.03, 2022.0),
                bird(-118.12, 34.07, 2022.0),
                bird(-118.45, 34.05, 2022.0),
                bird(-118.60, 34.05, 2022.0),
            ],
        );

        Layers {
            ejscreen,
            redlining,
            birds,
        }
    }

    fn source() -> LayerSource {
        LayerSource::Geojson {
            path: PathBuf::from("unused.geojson"),
            crs: None,
        }
    }

    fn prepared() -> Layers {
        let raw = raw_layers();
        Layers {
            ejscreen: prepare_ejscreen(
                &raw.ejscreen,
                &EjScreenConfig {
                    name: "ejscreen".to_string(),
                    county: "Los Angeles County".to_string(),
                    source: source(),
                },
            )
            .unwrap(),
            redlining: prepare_redlining(
                &raw.redlining,
                &RedliningConfig {
                    name: "holc".to_string(),
                    drop_ungraded: true,
                    source: source(),
                },
            )
            .unwrap(),
            birds: prepare_birds(
                &raw.birds,
                &BirdsConfig {
                    name: "birds".to_string(),
                    year: Some(2022),
                    date_attribute: "year".to_string(),
                    source: source(),
                },
            )
            .unwrap(),
        }
    }

    #[test]
    fn preparation_filters_county_grade_and_year() {
        let layers = prepared();

        assert_eq!(layers.ejscreen.len(), 3);
        assert_eq!(layers.redlining.len(), 2);
        assert_eq!(layers.birds.len(), 7);
    }

    #[test]
    fn ungraded_zone_is_fatal_unless_dropped() {
        let raw = raw_layers();
        let result = prepare_redlining(
            &raw.redlining,
            &RedliningConfig {
                name: "holc".to_string(),
                drop_ungraded: false,
                source: source(),
            },
        );

        assert!(matches!(result, Err(LayerError::MissingAttribute { .. })));
    }

    #[test]
    fn analysis_builds_all_three_tables() {
        let tables = analyze(
            prepared(),
            Some(&Crs::epsg(3857)),
            &CrsRegistry::default(),
            &|_| null_progress(),
        )
        .unwrap();

        let census: Vec<(HolcGrade, &str, f64)> = tables
            .census_blocks
            .iter()
            .map(|r| (r.grade, r.block_group.as_str(), r.percent))
            .collect();
        assert_eq!(
            census,
            vec![
                (HolcGrade::C, "1", 25.0),
                (HolcGrade::C, "2", 25.0),
                (HolcGrade::C, "3", 25.0),
                (HolcGrade::D, "3", 25.0),
            ]
        );

        assert_eq!(tables.conditions.len(), 2 * CONDITIONS.len());
        let c: Vec<Option<f64>> = tables.conditions[..3].iter().map(|r| r.averages).collect();
        assert!((c[0].unwrap() - 0.5).abs() < 1e-9);
        assert!((c[1].unwrap() - 63.33).abs() < 1e-9);
        assert!((c[2].unwrap() - 55.0).abs() < 1e-9);
        assert_eq!(tables.conditions[3].grade, HolcGrade::D);
        assert_eq!(tables.conditions[5].averages, Some(80.0));

        assert_eq!(
            tables.birds,
            vec![
                BirdObservationRow {
                    grade: HolcGrade::C,
                    count: 3,
                    percent_observation: 60.0,
                },
                BirdObservationRow {
                    grade: HolcGrade::D,
                    count: 2,
                    percent_observation: 40.0,
                },
            ]
        );
    }

    #[test]
    fn default_reference_is_the_ejscreen_crs() {
        let mut layers = prepared();
        layers.redlining = CrsRegistry::default()
            .normalize(&Crs::epsg(32611), layers.redlining)
            .unwrap()
            .layer;

        let tables =
            analyze(layers, None, &CrsRegistry::default(), &|_| null_progress()).unwrap();

        assert_eq!(tables.census_blocks.len(), 4);
        assert_eq!(tables.birds.len(), 2);
    }

    #[test]
    fn unknown_reference_crs_aborts() {
        let result = analyze(
            prepared(),
            Some(&Crs::parse("LOCAL:1").unwrap()),
            &CrsRegistry::default(),
            &|_| null_progress(),
        );

        assert!(matches!(
            result,
            Err(PipelineError::Crs(CrsError::UnknownCrs { .. }))
        ));
    }
}
