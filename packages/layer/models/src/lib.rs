#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry layer types shared by every stage of the overlay pipeline.
//!
//! A [`Layer`] is a sequence of [`Feature`]s that all share one [`Crs`].
//! Features carry a planar `geo` geometry plus a flat attribute map. Nothing
//! here is mutated in place: each pipeline stage builds new layers from the
//! previous stage's output.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use geo::Geometry;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Well-known attribute names used by the three source datasets.
pub mod attrs {
    /// EJScreen block-group identifier.
    pub const ID: &str = "ID";
    /// EJScreen county name.
    pub const CNTY_NAME: &str = "CNTY_NAME";
    /// Fraction of the block group that is low income (0-1).
    pub const LOWINCPCT: &str = "LOWINCPCT";
    /// National percentile for PM2.5 (0-100).
    pub const P_PM25: &str = "P_PM25";
    /// National percentile for low life expectancy (0-100).
    pub const P_LIFEEXPPCT: &str = "P_LIFEEXPPCT";
    /// HOLC grade of a redlining zone.
    pub const GRADE: &str = "grade";
    /// Single trailing character of [`ID`], derived after overlay.
    pub const BLOCK_GROUP_CODE: &str = "Block_Group_Code";
}

/// Error returned when a CRS identifier is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCrsError;

impl std::fmt::Display for InvalidCrsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "empty CRS identifier")
    }
}

impl std::error::Error for InvalidCrsError {}

/// A coordinate reference system identifier, normalized to `EPSG:<code>`
/// where the input names an EPSG code.
///
/// Identifiers that are not recognized are kept verbatim so that resolving
/// them to a transform definition fails loudly later instead of here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(String);

impl Crs {
    /// EPSG code of WGS 84 geographic coordinates.
    pub const WGS84_CODE: u32 = 4326;

    /// Builds an identifier from an EPSG code.
    #[must_use]
    pub fn epsg(code: u32) -> Self {
        Self(format!("EPSG:{code}"))
    }

    /// WGS 84 longitude/latitude, the `GeoJSON` default.
    #[must_use]
    pub fn wgs84() -> Self {
        Self::epsg(Self::WGS84_CODE)
    }

    /// Parses a CRS identifier.
    ///
    /// Accepts `EPSG:3857`, `epsg:3857`, `urn:ogc:def:crs:EPSG::3857`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`, `CRS84`, and bare codes like `3857`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCrsError`] if the identifier is empty.
    pub fn parse(value: &str) -> Result<Self, InvalidCrsError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(InvalidCrsError);
        }

        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(Self::wgs84());
        }

        if let Ok(code) = upper.parse::<u32>() {
            return Ok(Self::epsg(code));
        }

        let code = if upper.starts_with("EPSG:") || upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            // urn:ogc:def:crs:EPSG:<version>:<code>, version may be empty
            upper.rsplit(':').next().and_then(|c| c.parse::<u32>().ok())
        } else {
            None
        };
        if let Some(code) = code {
            return Ok(Self::epsg(code));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the normalized identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the EPSG code if this identifier names one.
    #[must_use]
    pub fn epsg_code(&self) -> Option<u32> {
        self.0.strip_prefix("EPSG:")?.parse().ok()
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Crs {
    type Err = InvalidCrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Crs {
    type Error = InvalidCrsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.0
    }
}

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Free text or a categorical label.
    Text(String),
    /// A floating-point number. May be NaN when the source encodes it so.
    Number(f64),
    /// Explicit null in the source.
    Missing,
}

impl AttributeValue {
    /// Returns the text value, if this is [`AttributeValue::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) | Self::Missing => None,
        }
    }

    /// Returns a usable number. NaN and infinities count as missing.
    ///
    /// Text that parses as a number is accepted, since CSV sources carry
    /// every column as text.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Missing => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Whether this value is [`AttributeValue::Missing`].
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Missing => f.write_str("NA"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Attribute name to value. Ordered so output is deterministic.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// One spatial feature: a geometry and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Planar geometry in the owning layer's CRS.
    pub geometry: Geometry<f64>,
    /// Attribute map.
    pub attributes: Attributes,
}

impl Feature {
    /// Creates a feature.
    #[must_use]
    pub const fn new(geometry: Geometry<f64>, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Looks up a text attribute by name.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_str)
    }
}

/// Coarse geometry classification used for validation and summaries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
pub enum GeometryKind {
    /// A single point.
    Point,
    /// Several points.
    MultiPoint,
    /// A single polygon.
    Polygon,
    /// Several polygons.
    MultiPolygon,
    /// Anything else (lines, collections, rects, triangles).
    Other,
}

impl GeometryKind {
    /// Classifies a geometry.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => Self::Point,
            Geometry::MultiPoint(_) => Self::MultiPoint,
            Geometry::Polygon(_) => Self::Polygon,
            Geometry::MultiPolygon(_) => Self::MultiPolygon,
            _ => Self::Other,
        }
    }

    /// Whether this kind has area.
    #[must_use]
    pub const fn is_polygonal(self) -> bool {
        matches!(self, Self::Polygon | Self::MultiPolygon)
    }
}

/// A named collection of features sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Human-readable layer name, used in log output.
    pub name: String,
    /// CRS of every geometry in [`Layer::features`].
    pub crs: Crs,
    /// The features, in source order.
    pub features: Vec<Feature>,
}

impl Layer {
    /// Creates a layer.
    #[must_use]
    pub fn new(name: impl Into<String>, crs: Crs, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            crs,
            features,
        }
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the layer has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns a new layer with the same name and CRS holding `features`.
    #[must_use]
    pub fn with_features(&self, features: Vec<Feature>) -> Self {
        Self {
            name: self.name.clone(),
            crs: self.crs.clone(),
            features,
        }
    }

    /// Counts features per [`GeometryKind`].
    #[must_use]
    pub fn geometry_kinds(&self) -> BTreeMap<GeometryKind, usize> {
        let mut kinds = BTreeMap::new();
        for feature in &self.features {
            *kinds.entry(GeometryKind::of(&feature.geometry)).or_insert(0) += 1;
        }
        kinds
    }

    /// Union of attribute names across all features.
    #[must_use]
    pub fn attribute_names(&self) -> BTreeSet<&str> {
        self.features
            .iter()
            .flat_map(|f| f.attributes.keys().map(String::as_str))
            .collect()
    }
}

/// Home Owners' Loan Corporation neighborhood grade, A (best) to D
/// (hazardous).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum HolcGrade {
    /// "Best".
    A,
    /// "Still Desirable".
    B,
    /// "Definitely Declining".
    C,
    /// "Hazardous".
    D,
}

impl HolcGrade {
    /// All grades in ranking order.
    pub const ALL: &[Self] = &[Self::A, Self::B, Self::C, Self::D];

    /// The descriptive label HOLC surveyors used for the grade.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::A => "Best",
            Self::B => "Still Desirable",
            Self::C => "Definitely Declining",
            Self::D => "Hazardous",
        }
    }
}

/// The three typed source collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum LayerKind {
    /// `EJScreen` block-group polygons.
    EjIndicators,
    /// HOLC redlining polygons.
    RedliningZones,
    /// Bird observation points.
    BirdObservations,
}

impl LayerKind {
    /// Attributes every feature of this kind must carry.
    #[must_use]
    pub const fn required_attributes(self) -> &'static [&'static str] {
        match self {
            Self::EjIndicators => &[
                attrs::ID,
                attrs::LOWINCPCT,
                attrs::P_PM25,
                attrs::P_LIFEEXPPCT,
            ],
            Self::RedliningZones => &[attrs::GRADE],
            Self::BirdObservations => &[],
        }
    }

    /// Whether features of this kind are polygons (as opposed to points).
    #[must_use]
    pub const fn is_polygonal(self) -> bool {
        matches!(self, Self::EjIndicators | Self::RedliningZones)
    }
}

/// Where and how to read a layer, deserialized from the run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSource {
    /// A `GeoJSON` `FeatureCollection` file.
    Geojson {
        /// Path to the file.
        path: PathBuf,
        /// Overrides the CRS declared in (or defaulted for) the file.
        crs: Option<Crs>,
    },
    /// A delimited text file with one point per row.
    Csv {
        /// Path to the file.
        path: PathBuf,
        /// Column holding the x coordinate / longitude.
        longitude: String,
        /// Column holding the y coordinate / latitude.
        latitude: String,
        /// CRS of the coordinates (default: `EPSG:4326`).
        crs: Option<Crs>,
        /// Field delimiter (default: `,`).
        delimiter: Option<char>,
    },
}

impl LayerSource {
    /// Returns the path of the file backing this source.
    #[must_use]
    pub const fn path(&self) -> &PathBuf {
        match self {
            Self::Geojson { path, .. } | Self::Csv { path, .. } => path,
        }
    }
}
