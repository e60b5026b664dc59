#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spatial overlay of polygon layers against polygon or point layers.
//!
//! Builds an R-tree over the right-hand layer, then for every left-hand
//! polygon computes the actual intersection with each candidate whose
//! envelope overlaps. Only pairs with a non-empty intersection produce an
//! [`IntersectionRecord`]; nothing is null-padded.
//!
//! Boundary rules:
//!
//! * polygon / polygon: the intersection must have positive area, so zones
//!   that only share an edge or a corner do not match.
//! * polygon / point: points on a polygon's boundary match. A point on the
//!   shared edge of two adjacent polygons matches both.

pub mod progress;

use geo::{Area as _, BooleanOps as _, BoundingRect as _, Geometry, Intersects as _};
use geo::{MultiPolygon, Point};
use redlining_layer_models::{Attributes, Feature, GeometryKind, Layer};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

use crate::progress::ProgressCallback;

/// Errors that can occur during overlay.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The two layers are in different coordinate systems.
    #[error("CRS mismatch: {left} is in {left_crs} but {right} is in {right_crs}")]
    CrsMismatch {
        /// Left layer name.
        left: String,
        /// Left layer CRS.
        left_crs: String,
        /// Right layer name.
        right: String,
        /// Right layer CRS.
        right_crs: String,
    },

    /// A feature's geometry cannot take part in this overlay.
    #[error("Layer {layer}: feature {index} is a {kind}, which this overlay does not support")]
    UnsupportedGeometry {
        /// Layer name.
        layer: String,
        /// Position of the feature in its layer.
        index: usize,
        /// Geometry kind found.
        kind: GeometryKind,
    },
}

/// One non-empty intersection between a left and a right feature.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionRecord {
    /// Position of the left (polygon) feature in its layer.
    pub left: usize,
    /// Position of the right feature in its layer.
    pub right: usize,
    /// Clipped multipolygon, or the right-hand point unchanged.
    pub geometry: Geometry<f64>,
    /// Left attributes overlaid with right attributes (right wins).
    pub attributes: Attributes,
}

impl IntersectionRecord {
    fn new(
        left: usize,
        left_feature: &Feature,
        right: usize,
        right_feature: &Feature,
        geometry: Geometry<f64>,
    ) -> Self {
        let mut attributes = left_feature.attributes.clone();
        attributes.extend(
            right_feature
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Self {
            left,
            right,
            geometry,
            attributes,
        }
    }
}

/// A right-hand polygon stored in the R-tree.
struct PolygonEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for PolygonEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A right-hand point stored in the R-tree.
struct PointEntry {
    index: usize,
    point: Point<f64>,
}

impl RTreeObject for PointEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.x(), self.point.y()])
    }
}

/// Overlays polygon layer `left` with `right`, choosing polygon or point
/// semantics from the right layer's geometry.
///
/// # Errors
///
/// Returns [`OverlayError::CrsMismatch`] if the layers' CRS differ, or
/// [`OverlayError::UnsupportedGeometry`] if `left` holds non-polygons or
/// `right` mixes points with polygons.
pub fn overlay(
    left: &Layer,
    right: &Layer,
    progress: &dyn ProgressCallback,
) -> Result<Vec<IntersectionRecord>, OverlayError> {
    let Some(first) = right.features.first() else {
        ensure_same_crs(left, right)?;
        return Ok(Vec::new());
    };

    if GeometryKind::of(&first.geometry) == GeometryKind::Point {
        intersect_points(left, right, progress)
    } else {
        intersect_polygons(left, right, progress)
    }
}

/// Polygon-in-polygon overlay.
///
/// Emits one record per pair whose clipped intersection has positive area,
/// ordered by left then right position.
///
/// # Errors
///
/// See [`overlay`].
pub fn intersect_polygons(
    left: &Layer,
    right: &Layer,
    progress: &dyn ProgressCallback,
) -> Result<Vec<IntersectionRecord>, OverlayError> {
    ensure_same_crs(left, right)?;
    let left_polygons = polygons(left)?;

    let entries = polygons(right)?
        .into_iter()
        .filter_map(|(index, polygon)| {
            compute_envelope(&polygon).map(|envelope| PolygonEntry {
                index,
                envelope,
                polygon,
            })
        })
        .collect();
    let tree = RTree::bulk_load(entries);
    log::debug!("{}: indexed {} polygons", right.name, tree.size());

    progress.set_total(left_polygons.len() as u64);
    progress.set_message(format!("{} x {}", left.name, right.name));

    let mut records = Vec::new();
    let mut candidates = 0usize;

    for (left_index, left_polygon) in &left_polygons {
        progress.inc(1);

        let Some(envelope) = compute_envelope(left_polygon) else {
            continue;
        };

        let mut matches: Vec<&PolygonEntry> =
            tree.locate_in_envelope_intersecting(&envelope).collect();
        matches.sort_by_key(|entry| entry.index);
        candidates += matches.len();

        for entry in matches {
            let clipped = non_degenerate(left_polygon.intersection(&entry.polygon));
            if clipped.0.is_empty() {
                continue;
            }

            records.push(IntersectionRecord::new(
                *left_index,
                &left.features[*left_index],
                entry.index,
                &right.features[entry.index],
                Geometry::MultiPolygon(clipped),
            ));
        }
    }

    log::info!(
        "{} x {}: {} intersections from {candidates} candidate pairs",
        left.name,
        right.name,
        records.len()
    );
    progress.finish(format!(
        "{} x {}: {} intersections",
        left.name,
        right.name,
        records.len()
    ));

    Ok(records)
}

/// Point-in-polygon overlay.
///
/// Emits one record per (polygon, point) pair where the point lies inside
/// the polygon or on its boundary. The point geometry is carried through
/// unchanged.
///
/// # Errors
///
/// See [`overlay`].
pub fn intersect_points(
    left: &Layer,
    right: &Layer,
    progress: &dyn ProgressCallback,
) -> Result<Vec<IntersectionRecord>, OverlayError> {
    ensure_same_crs(left, right)?;
    let left_polygons = polygons(left)?;

    let mut entries = Vec::with_capacity(right.len());
    for (index, feature) in right.features.iter().enumerate() {
        let Geometry::Point(point) = feature.geometry else {
            return Err(unsupported(right, index, &feature.geometry));
        };
        if point.x().is_finite() && point.y().is_finite() {
            entries.push(PointEntry { index, point });
        }
    }
    let tree = RTree::bulk_load(entries);
    log::debug!("{}: indexed {} points", right.name, tree.size());

    progress.set_total(left_polygons.len() as u64);
    progress.set_message(format!("{} x {}", left.name, right.name));

    let mut records = Vec::new();

    for (left_index, left_polygon) in &left_polygons {
        progress.inc(1);

        // Zero-area polygons are treated as empty and never match.
        if left_polygon.unsigned_area() <= 0.0 {
            continue;
        }
        let Some(envelope) = compute_envelope(left_polygon) else {
            continue;
        };

        let mut matches: Vec<&PointEntry> = tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| left_polygon.intersects(&entry.point))
            .collect();
        matches.sort_by_key(|entry| entry.index);

        for entry in matches {
            records.push(IntersectionRecord::new(
                *left_index,
                &left.features[*left_index],
                entry.index,
                &right.features[entry.index],
                Geometry::Point(entry.point),
            ));
        }
    }

    log::info!(
        "{} x {}: {} points matched to polygons",
        left.name,
        right.name,
        records.len()
    );
    progress.finish(format!(
        "{} x {}: {} matches",
        left.name,
        right.name,
        records.len()
    ));

    Ok(records)
}

fn ensure_same_crs(left: &Layer, right: &Layer) -> Result<(), OverlayError> {
    if left.crs == right.crs {
        Ok(())
    } else {
        Err(OverlayError::CrsMismatch {
            left: left.name.clone(),
            left_crs: left.crs.to_string(),
            right: right.name.clone(),
            right_crs: right.crs.to_string(),
        })
    }
}

/// Collects every feature as a [`MultiPolygon`], rejecting other kinds.
fn polygons(layer: &Layer) -> Result<Vec<(usize, MultiPolygon<f64>)>, OverlayError> {
    layer
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| match &feature.geometry {
            Geometry::Polygon(p) => Ok((index, MultiPolygon(vec![p.clone()]))),
            Geometry::MultiPolygon(mp) => Ok((index, mp.clone())),
            other => Err(unsupported(layer, index, other)),
        })
        .collect()
}

fn unsupported(layer: &Layer, index: usize, geometry: &Geometry<f64>) -> OverlayError {
    OverlayError::UnsupportedGeometry {
        layer: layer.name.clone(),
        index,
        kind: GeometryKind::of(geometry),
    }
}

/// Drops zero-area parts left behind by clipping along shared edges.
fn non_degenerate(mp: MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon(
        mp.0.into_iter()
            .filter(|p| p.unsigned_area() > 0.0)
            .collect(),
    )
}

/// Compute the bounding box envelope for a [`MultiPolygon`], or `None` if
/// it has no coordinates.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect().map(|rect| {
        AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use geo::{Area as _, point, polygon};
    use redlining_layer_models::{AttributeValue, Crs};

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
        ])
    }

    fn feature(geometry: Geometry<f64>, attrs: &[(&str, &str)]) -> Feature {
        Feature::new(
            geometry,
            attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), AttributeValue::from(*v)))
                .collect(),
        )
    }

    fn layer(name: &str, features: Vec<Feature>) -> Layer {
        Layer::new(name, Crs::epsg(3857), features)
    }

    #[test]
    fn disjoint_polygons_emit_nothing() {
        let zones = layer(
            "zones",
            vec![feature(square(0.0, 0.0, 1.0, 1.0), &[("grade", "C")])],
        );
        let blocks = layer(
            "blocks",
            vec![feature(square(5.0, 5.0, 6.0, 6.0), &[("ID", "1")])],
        );

        let records = intersect_polygons(&zones, &blocks, &NullProgress).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn overlapping_polygons_emit_clipped_area_and_attribute_union() {
        let zones = layer(
            "zones",
            vec![feature(square(0.0, 0.0, 2.0, 2.0), &[("grade", "C")])],
        );
        let blocks = layer(
            "blocks",
            vec![feature(square(1.0, 1.0, 3.0, 3.0), &[("ID", "0603701")])],
        );

        let records = intersect_polygons(&zones, &blocks, &NullProgress).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!((record.left, record.right), (0, 0));
        assert!((record.geometry.unsigned_area() - 1.0).abs() < 1e-9);
        assert_eq!(
            record.attributes.get("grade"),
            Some(&AttributeValue::from("C"))
        );
        assert_eq!(
            record.attributes.get("ID"),
            Some(&AttributeValue::from("0603701"))
        );
    }

    #[test]
    fn edge_touching_polygons_are_excluded() {
        let zones = layer("zones", vec![feature(square(0.0, 0.0, 1.0, 1.0), &[])]);
        let blocks = layer(
            "blocks",
            vec![
                feature(square(1.0, 0.0, 2.0, 1.0), &[]),
                feature(square(1.0, 1.0, 2.0, 2.0), &[]),
            ],
        );

        let records = intersect_polygons(&zones, &blocks, &NullProgress).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn one_zone_over_three_blocks_yields_three_records() {
        let zones = layer(
            "zones",
            vec![feature(square(0.0, 0.0, 3.0, 1.0), &[("grade", "D")])],
        );
        let blocks = layer(
            "blocks",
            vec![
                feature(square(2.0, 0.0, 3.0, 1.0), &[("ID", "c")]),
                feature(square(0.0, 0.0, 1.0, 1.0), &[("ID", "a")]),
                feature(square(1.0, 0.0, 2.0, 1.0), &[("ID", "b")]),
                feature(square(10.0, 0.0, 11.0, 1.0), &[("ID", "far")]),
            ],
        );

        let records = intersect_polygons(&zones, &blocks, &NullProgress).unwrap();
        let rights: Vec<usize> = records.iter().map(|r| r.right).collect();
        assert_eq!(rights, vec![0, 1, 2]);
        for record in &records {
            assert!((record.geometry.unsigned_area() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn right_attributes_win_on_collision() {
        let zones = layer(
            "zones",
            vec![feature(
                square(0.0, 0.0, 1.0, 1.0),
                &[("name", "zone"), ("grade", "B")],
            )],
        );
        let blocks = layer(
            "blocks",
            vec![feature(square(0.0, 0.0, 1.0, 1.0), &[("name", "block")])],
        );

        let records = intersect_polygons(&zones, &blocks, &NullProgress).unwrap();
        let attributes = &records[0].attributes;
        assert_eq!(attributes.get("name"), Some(&AttributeValue::from("block")));
        assert_eq!(attributes.get("grade"), Some(&AttributeValue::from("B")));
    }

    #[test]
    fn multipolygon_left_features_are_supported() {
        let mp = Geometry::MultiPolygon(MultiPolygon(vec![
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
            polygon![(x: 4.0, y: 0.0), (x: 5.0, y: 0.0), (x: 5.0, y: 1.0), (x: 4.0, y: 1.0)],
        ]));
        let zones = layer("zones", vec![feature(mp, &[])]);
        let blocks = layer("blocks", vec![feature(square(0.5, 0.0, 4.5, 1.0), &[])]);

        let records = intersect_polygons(&zones, &blocks, &NullProgress).unwrap();
        assert_eq!(records.len(), 1);
        assert!((records[0].geometry.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn points_inside_and_outside() {
        let zones = layer(
            "zones",
            vec![feature(square(0.0, 0.0, 2.0, 2.0), &[("grade", "A")])],
        );
        let birds = layer(
            "birds",
            vec![
                feature(Geometry::Point(point!(x: 1.0, y: 1.0)), &[("species", "crow")]),
                feature(Geometry::Point(point!(x: 3.0, y: 1.0)), &[("species", "gull")]),
            ],
        );

        let records = intersect_points(&zones, &birds, &NullProgress).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.right, 0);
        assert_eq!(record.geometry, Geometry::Point(point!(x: 1.0, y: 1.0)));
        assert_eq!(record.attributes.get("grade"), Some(&AttributeValue::from("A")));
        assert_eq!(
            record.attributes.get("species"),
            Some(&AttributeValue::from("crow"))
        );
    }

    #[test]
    fn point_on_shared_boundary_matches_both_zones() {
        let zones = layer(
            "zones",
            vec![
                feature(square(0.0, 0.0, 1.0, 1.0), &[("grade", "C")]),
                feature(square(1.0, 0.0, 2.0, 1.0), &[("grade", "D")]),
            ],
        );
        let birds = layer(
            "birds",
            vec![feature(Geometry::Point(point!(x: 1.0, y: 0.5)), &[])],
        );

        let records = intersect_points(&zones, &birds, &NullProgress).unwrap();
        let lefts: Vec<usize> = records.iter().map(|r| r.left).collect();
        assert_eq!(lefts, vec![0, 1]);
    }

    #[test]
    fn point_on_outer_corner_matches() {
        let zones = layer("zones", vec![feature(square(0.0, 0.0, 1.0, 1.0), &[])]);
        let birds = layer(
            "birds",
            vec![feature(Geometry::Point(point!(x: 0.0, y: 0.0)), &[])],
        );

        let records = intersect_points(&zones, &birds, &NullProgress).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn overlay_dispatches_on_right_geometry() {
        let zones = layer("zones", vec![feature(square(0.0, 0.0, 2.0, 2.0), &[])]);
        let birds = layer(
            "birds",
            vec![feature(Geometry::Point(point!(x: 1.0, y: 1.0)), &[])],
        );
        let blocks = layer("blocks", vec![feature(square(1.0, 1.0, 3.0, 3.0), &[])]);

        let point_records = overlay(&zones, &birds, &NullProgress).unwrap();
        assert!(matches!(point_records[0].geometry, Geometry::Point(_)));

        let polygon_records = overlay(&zones, &blocks, &NullProgress).unwrap();
        assert!(matches!(
            polygon_records[0].geometry,
            Geometry::MultiPolygon(_)
        ));

        let empty = layer("empty", Vec::new());
        assert!(overlay(&zones, &empty, &NullProgress).unwrap().is_empty());
    }

    #[test]
    fn crs_mismatch_is_rejected() {
        let zones = Layer::new(
            "zones",
            Crs::wgs84(),
            vec![feature(square(0.0, 0.0, 1.0, 1.0), &[])],
        );
        let blocks = layer("blocks", vec![feature(square(0.0, 0.0, 1.0, 1.0), &[])]);

        assert!(matches!(
            intersect_polygons(&zones, &blocks, &NullProgress),
            Err(OverlayError::CrsMismatch { .. })
        ));
        assert!(matches!(
            overlay(&zones, &layer("empty", Vec::new()), &NullProgress),
            Err(OverlayError::CrsMismatch { .. })
        ));
    }

    #[test]
    fn mixed_right_geometry_is_rejected() {
        let zones = layer("zones", vec![feature(square(0.0, 0.0, 1.0, 1.0), &[])]);
        let mixed = layer(
            "mixed",
            vec![
                feature(Geometry::Point(point!(x: 0.5, y: 0.5)), &[]),
                feature(square(0.0, 0.0, 1.0, 1.0), &[]),
            ],
        );

        assert!(matches!(
            overlay(&zones, &mixed, &NullProgress),
            Err(OverlayError::UnsupportedGeometry { index: 1, .. })
        ));
    }

    #[test]
    fn point_left_layer_is_rejected() {
        let points = layer(
            "points",
            vec![feature(Geometry::Point(point!(x: 0.5, y: 0.5)), &[])],
        );
        let blocks = layer("blocks", vec![feature(square(0.0, 0.0, 1.0, 1.0), &[])]);

        assert!(matches!(
            intersect_polygons(&points, &blocks, &NullProgress),
            Err(OverlayError::UnsupportedGeometry {
                index: 0,
                kind: GeometryKind::Point,
                ..
            })
        ));
    }

    #[test]
    fn empty_multipolygon_never_matches() {
        let empty = Geometry::MultiPolygon(MultiPolygon(vec![]));
        let zones = layer("zones", vec![feature(empty, &[])]);
        let blocks = layer("blocks", vec![feature(square(0.0, 0.0, 1.0, 1.0), &[])]);
        let birds = layer(
            "birds",
            vec![feature(Geometry::Point(point!(x: 0.0, y: 0.0)), &[])],
        );

        let polygon_records = intersect_polygons(&zones, &blocks, &NullProgress).unwrap();
        let point_records = intersect_points(&zones, &birds, &NullProgress).unwrap();
        assert!(polygon_records.is_empty());
        assert!(point_records.is_empty());
    }
}
