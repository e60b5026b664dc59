//! Reads point observations from delimited text (GBIF / eBird style
//! exports) into a point [`Layer`].

use std::io::Read;

use redlining_layer_models::{AttributeValue, Attributes, Crs, Feature, Layer};

use crate::LayerError;

/// Column and CRS settings for [`read_points`].
#[derive(Debug, Clone)]
pub struct CsvPointOptions<'a> {
    /// Column holding the x coordinate / longitude.
    pub longitude: &'a str,
    /// Column holding the y coordinate / latitude.
    pub latitude: &'a str,
    /// CRS of the coordinates. Defaults to WGS 84.
    pub crs: Option<Crs>,
    /// Field delimiter. Defaults to `,`.
    pub delimiter: Option<char>,
}

/// Reads one point feature per row.
///
/// Rows with an empty coordinate cell are skipped with a warning. Every
/// other column becomes a text attribute; empty cells become
/// [`AttributeValue::Missing`].
///
/// # Errors
///
/// Returns [`LayerError`] if the CSV is malformed, a coordinate column is
/// missing from the header, or a coordinate cell is not a number.
pub fn read_points<R: Read>(
    name: &str,
    reader: R,
    options: &CsvPointOptions<'_>,
) -> Result<Layer, LayerError> {
    let delimiter = options.delimiter.unwrap_or(',');
    let delimiter = u8::try_from(delimiter).map_err(|_| LayerError::InvalidAttribute {
        layer: name.to_string(),
        index: 0,
        attribute: "delimiter".to_string(),
        value: delimiter.to_string(),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column_index = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| LayerError::MissingColumn {
                layer: name.to_string(),
                column: column.to_string(),
            })
    };
    let lon_idx = column_index(options.longitude)?;
    let lat_idx = column_index(options.latitude)?;

    let mut features = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, record) in rdr.records().enumerate() {
        let record = record?;
        let row = row_idx + 1;

        let lon_raw = record.get(lon_idx).unwrap_or_default().trim();
        let lat_raw = record.get(lat_idx).unwrap_or_default().trim();
        if lon_raw.is_empty() || lat_raw.is_empty() {
            skipped += 1;
            continue;
        }

        let parse = |raw: &str, column: &str| {
            raw.parse::<f64>()
                .map_err(|_| LayerError::InvalidCoordinate {
                    layer: name.to_string(),
                    row,
                    column: column.to_string(),
                    value: raw.to_string(),
                })
        };
        let x = parse(lon_raw, options.longitude)?;
        let y = parse(lat_raw, options.latitude)?;

        let attributes: Attributes = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(i, _)| *i != lon_idx && *i != lat_idx)
            .map(|(_, (header, cell))| {
                let cell = cell.trim();
                let value = if cell.is_empty() {
                    AttributeValue::Missing
                } else {
                    AttributeValue::Text(cell.to_string())
                };
                (header.trim().to_string(), value)
            })
            .collect();

        features.push(Feature::new(
            geo::Geometry::Point(geo::Point::new(x, y)),
            attributes,
        ));
    }

    if skipped > 0 {
        log::warn!("{name}: skipped {skipped} rows without coordinates");
    }

    let crs = options.crs.clone().unwrap_or_else(Crs::wgs84);
    Ok(Layer::new(name, crs, features))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CsvPointOptions<'static> {
        CsvPointOptions {
            longitude: "decimalLongitude",
            latitude: "decimalLatitude",
            crs: None,
            delimiter: None,
        }
    }

    #[test]
    fn reads_points_and_attributes() {
        let csv = "species,decimalLongitude,decimalLatitude,year\n\
                   Corvus brachyrhynchos,-118.25,34.05,2022\n\
                   Sayornis nigricans,-118.30,34.10,\n";

        let layer = read_points("birds", csv.as_bytes(), &options()).unwrap();

        assert_eq!(layer.crs, Crs::wgs84());
        assert_eq!(layer.len(), 2);

        let first = &layer.features[0];
        assert_eq!(
            first.geometry,
            geo::Geometry::Point(geo::Point::new(-118.25, 34.05))
        );
        assert_eq!(first.text("species"), Some("Corvus brachyrhynchos"));
        assert_eq!(first.attribute("year").and_then(AttributeValue::as_f64), Some(2022.0));
        assert!(first.attribute("decimalLongitude").is_none());

        assert_eq!(
            layer.features[1].attribute("year"),
            Some(&AttributeValue::Missing)
        );
    }

    #[test]
    fn skips_rows_without_coordinates() {
        let csv = "decimalLongitude,decimalLatitude\n,34.0\n-118.0,34.0\n";
        let layer = read_points("birds", csv.as_bytes(), &options()).unwrap();
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn tab_delimited_with_crs() {
        let csv = "x\ty\n100.5\t200.5\n";
        let opts = CsvPointOptions {
            longitude: "x",
            latitude: "y",
            crs: Some(Crs::epsg(3857)),
            delimiter: Some('\t'),
        };
        let layer = read_points("birds", csv.as_bytes(), &opts).unwrap();
        assert_eq!(layer.crs, Crs::epsg(3857));
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn missing_coordinate_column_is_an_error() {
        let csv = "lon,lat\n1,2\n";
        assert!(matches!(
            read_points("birds", csv.as_bytes(), &options()),
            Err(LayerError::MissingColumn { .. })
        ));
    }

    #[test]
    fn unparseable_coordinate_is_an_error() {
        let csv = "decimalLongitude,decimalLatitude\nwest,34.0\n";
        match read_points("birds", csv.as_bytes(), &options()) {
            Err(LayerError::InvalidCoordinate { row, column, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "decimalLongitude");
            }
            other => panic!("expected InvalidCoordinate, got {other:?}"),
        }
    }
}
