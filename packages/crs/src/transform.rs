//! Coordinate transforms between two resolved CRS definitions.

use geo::{Coord, Geometry, MapCoords as _};
use proj4rs::proj::Proj;

use crate::definitions::Definition;

/// Reusable transformer between two CRS definitions, backed by `proj4rs`.
///
/// Geographic systems take and return degrees; the radian conversion
/// `proj4rs` expects happens here.
pub struct CoordTransformer {
    source_proj: Proj,
    target_proj: Proj,
    source_is_geographic: bool,
    target_is_geographic: bool,
}

impl std::fmt::Debug for CoordTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordTransformer")
            .field("source_is_geographic", &self.source_is_geographic)
            .field("target_is_geographic", &self.target_is_geographic)
            .finish_non_exhaustive()
    }
}

impl CoordTransformer {
    /// Builds a transformer.
    ///
    /// # Errors
    ///
    /// Returns a message if either definition is rejected by `proj4rs`.
    pub fn new(source: &Definition, target: &Definition) -> Result<Self, String> {
        let source_proj = Proj::from_proj_string(&source.proj)
            .map_err(|e| format!("invalid projection {:?}: {e:?}", source.proj))?;
        let target_proj = Proj::from_proj_string(&target.proj)
            .map_err(|e| format!("invalid projection {:?}: {e:?}", target.proj))?;

        Ok(Self {
            source_proj,
            target_proj,
            source_is_geographic: source.geographic,
            target_is_geographic: target.geographic,
        })
    }

    /// Transforms one coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns a message if `proj4rs` fails or produces a non-finite result.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), String> {
        let (in_x, in_y) = if self.source_is_geographic {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        let mut point = (in_x, in_y, 0.0);

        proj4rs::transform::transform(&self.source_proj, &self.target_proj, &mut point)
            .map_err(|e| format!("transform of ({x}, {y}) failed: {e:?}"))?;

        let (out_x, out_y) = if self.target_is_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(format!("transform of ({x}, {y}) produced a non-finite result"));
        }

        Ok((out_x, out_y))
    }

    /// Transforms every coordinate of a geometry.
    ///
    /// # Errors
    ///
    /// Returns the first coordinate failure.
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, String> {
        geometry.try_map_coords(|c| {
            let (x, y) = self.transform(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::CrsRegistry;
    use geo::polygon;
    use redlining_layer_models::Crs;

    fn transformer(from: u32, to: u32) -> CoordTransformer {
        let registry = CrsRegistry::default();
        CoordTransformer::new(
            registry.resolve(&Crs::epsg(from)).unwrap(),
            registry.resolve(&Crs::epsg(to)).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn wgs84_to_web_mercator() {
        let (x, y) = transformer(4326, 3857).transform(-118.25, 34.05).unwrap();

        let radius = 6_378_137.0_f64;
        let expected_x = radius * (-118.25_f64).to_radians();
        let expected_y = radius
            * (std::f64::consts::FRAC_PI_4 + 34.05_f64.to_radians() / 2.0)
                .tan()
                .ln();

        assert!((x - expected_x).abs() < 1e-3, "x = {x}, expected {expected_x}");
        assert!((y - expected_y).abs() < 1e-3, "y = {y}, expected {expected_y}");
    }

    #[test]
    fn round_trip_through_web_mercator() {
        let forward = transformer(4326, 3857);
        let back = transformer(3857, 4326);

        let (x, y) = forward.transform(-118.4, 33.9).unwrap();
        let (lon, lat) = back.transform(x, y).unwrap();

        assert!((lon - -118.4).abs() < 1e-9);
        assert!((lat - 33.9).abs() < 1e-9);
    }

    #[test]
    fn geometry_transform_keeps_shape() {
        let polygon = Geometry::Polygon(polygon![
            (x: -118.3, y: 34.0),
            (x: -118.2, y: 34.0),
            (x: -118.2, y: 34.1),
            (x: -118.3, y: 34.1),
        ]);

        let projected = transformer(4326, 32611)
            .transform_geometry(&polygon)
            .unwrap();

        let Geometry::Polygon(projected) = projected else {
            panic!("expected polygon");
        };
        assert_eq!(projected.exterior().0.len(), 5);
        for coord in projected.exterior().coords() {
            // UTM zone 11 eastings for LA sit around 370-390 km
            assert!(coord.x > 300_000.0 && coord.x < 450_000.0, "{coord:?}");
        }
    }
}
