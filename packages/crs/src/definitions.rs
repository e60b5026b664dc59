//! Registry of CRS identifiers to PROJ.4 definition strings.

use std::collections::BTreeMap;

use redlining_layer_models::Crs;

use crate::CrsError;

/// Built-in definitions, covering the systems the source datasets ship in.
const BUILTIN: &[(u32, &str)] = &[
    (4326, "+proj=longlat +datum=WGS84 +no_defs"),
    (
        4269,
        "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs",
    ),
    (
        3857,
        "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs",
    ),
    (
        3310,
        "+proj=aea +lat_0=0 +lon_0=-120 +lat_1=34 +lat_2=40.5 +x_0=0 +y_0=-4000000 \
         +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
    ),
    (
        2229,
        "+proj=lcc +lat_0=33.5 +lon_0=-118 +lat_1=35.4666666666667 +lat_2=34.0333333333333 \
         +x_0=2000000.0001016 +y_0=500000.0001016 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 \
         +units=us-ft +no_defs",
    ),
    (
        26911,
        "+proj=utm +zone=11 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
    ),
    (32611, "+proj=utm +zone=11 +datum=WGS84 +units=m +no_defs"),
    (
        5070,
        "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 \
         +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
    ),
];

/// A resolved CRS definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// PROJ.4 definition string.
    pub proj: String,
    /// True if coordinates are degrees of longitude/latitude.
    pub geographic: bool,
}

impl Definition {
    /// Creates a definition, detecting geographic systems from `+proj=`.
    #[must_use]
    pub fn new(proj: impl Into<String>) -> Self {
        let proj = proj.into();
        let geographic = proj
            .split_whitespace()
            .any(|p| p == "+proj=longlat" || p == "+proj=latlong");
        Self { proj, geographic }
    }
}

/// Maps [`Crs`] identifiers to transform definitions.
#[derive(Debug, Clone)]
pub struct CrsRegistry {
    definitions: BTreeMap<Crs, Definition>,
}

impl Default for CrsRegistry {
    fn default() -> Self {
        let definitions = BUILTIN
            .iter()
            .map(|(code, proj)| (Crs::epsg(*code), Definition::new(*proj)))
            .collect();
        Self { definitions }
    }
}

impl CrsRegistry {
    /// Adds or replaces a definition.
    #[must_use]
    pub fn with_definition(mut self, crs: Crs, proj: impl Into<String>) -> Self {
        self.definitions.insert(crs, Definition::new(proj));
        self
    }

    /// Looks up the definition for `crs`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::UnknownCrs`] if no definition is registered.
    pub fn resolve(&self, crs: &Crs) -> Result<&Definition, CrsError> {
        self.definitions
            .get(crs)
            .ok_or_else(|| CrsError::UnknownCrs {
                crs: crs.to_string(),
            })
    }

    /// Registered identifiers, in order.
    pub fn identifiers(&self) -> impl Iterator<Item = &Crs> {
        self.definitions.keys()
    }
}
