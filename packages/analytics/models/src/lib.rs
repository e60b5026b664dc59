#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate row types and the tidy output tables built from them.
//!
//! The generic rows ([`CountRow`], [`MeanRow`], [`LongRow`]) are produced by
//! the aggregation operations. The tidy rows ([`CensusBlockRow`],
//! [`ConditionRow`], [`BirdObservationRow`]) are the final tables handed to
//! the report sink, with serde column names matching the published column
//! contracts.

use redlining_layer_models::{HolcGrade, attrs};
use serde::{Deserialize, Serialize, Serializer};

/// Rounds to two decimal places for presentation.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Count and share of records for one grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct CountRow<K> {
    /// Grouping key.
    pub key: K,
    /// Number of records with this key.
    pub count: u64,
    /// `count` as a percentage of the records in the same scope.
    pub percent: f64,
}

/// Mean of one numeric attribute within a group.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMean {
    /// Attribute name.
    pub attribute: String,
    /// Arithmetic mean over non-missing values, `None` if there were none.
    pub mean: Option<f64>,
    /// Number of non-missing values that went into the mean.
    pub observations: u64,
}

/// Per-attribute means for one grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanRow<K> {
    /// Grouping key.
    pub key: K,
    /// One entry per requested attribute, in request order.
    pub means: Vec<AttributeMean>,
}

impl<K> MeanRow<K> {
    /// Looks up the mean for `attribute`.
    #[must_use]
    pub fn mean(&self, attribute: &str) -> Option<f64> {
        self.means
            .iter()
            .find(|m| m.attribute == attribute)
            .and_then(|m| m.mean)
    }
}

/// One (key, condition) pair from a wide-to-long reshape.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow<K> {
    /// Grouping key.
    pub key: K,
    /// Condition label.
    pub condition: String,
    /// Value for this key and condition.
    pub value: Option<f64>,
}

/// A numeric attribute paired with its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    /// Source attribute name.
    pub attribute: &'static str,
    /// Label used in the `Conditions` column.
    pub label: &'static str,
}

/// The three environmental conditions summarized per grade.
pub const CONDITIONS: &[Condition] = &[
    Condition {
        attribute: attrs::LOWINCPCT,
        label: "% low income",
    },
    Condition {
        attribute: attrs::P_PM25,
        label: "Percentile PM2.5",
    },
    Condition {
        attribute: attrs::P_LIFEEXPPCT,
        label: "Percentile low life expectancy",
    },
];

/// A row of a tidy output table.
///
/// Implementors expose their cells as display strings plus one category /
/// value pair used for bar charts.
pub trait TidyRow: Serialize {
    /// Column headers, in cell order.
    const COLUMNS: &'static [&'static str];

    /// Cell values formatted for display, in [`Self::COLUMNS`] order.
    fn cells(&self) -> Vec<String>;

    /// Bar label for charts.
    fn category(&self) -> String;

    /// Bar length for charts.
    fn value(&self) -> Option<f64>;
}

fn format2(value: Option<f64>) -> String {
    value.map_or_else(|| "NA".to_string(), |v| format!("{v:.2}"))
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_2dp<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}"))
}

#[allow(clippy::ref_option)]
fn serialize_opt_2dp<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serialize_2dp(v, serializer),
        None => serializer.serialize_none(),
    }
}

/// Share of intersected block groups per grade and block-group code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusBlockRow {
    /// HOLC grade.
    #[serde(rename = "Grade")]
    pub grade: HolcGrade,
    /// Single-character block-group code.
    #[serde(rename = "Block_group")]
    pub block_group: String,
    /// Percentage of all intersection records, 2 decimals.
    #[serde(rename = "Percent", serialize_with = "serialize_2dp")]
    pub percent: f64,
}

impl TidyRow for CensusBlockRow {
    const COLUMNS: &'static [&'static str] = &["Grade", "Block_group", "Percent"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.grade.to_string(),
            self.block_group.clone(),
            format2(Some(self.percent)),
        ]
    }

    fn category(&self) -> String {
        format!("{} / {}", self.grade, self.block_group)
    }

    fn value(&self) -> Option<f64> {
        Some(self.percent)
    }
}

/// Mean of one environmental condition per grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRow {
    /// HOLC grade.
    #[serde(rename = "Grade")]
    pub grade: HolcGrade,
    /// One of the [`CONDITIONS`] labels.
    #[serde(rename = "Conditions")]
    pub conditions: String,
    /// Mean value, 2 decimals. `None` when the grade had no usable values.
    #[serde(rename = "Averages", serialize_with = "serialize_opt_2dp")]
    pub averages: Option<f64>,
}

impl TidyRow for ConditionRow {
    const COLUMNS: &'static [&'static str] = &["Grade", "Conditions", "Averages"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.grade.to_string(),
            self.conditions.clone(),
            format2(self.averages),
        ]
    }

    fn category(&self) -> String {
        format!("{} / {}", self.grade, self.conditions)
    }

    fn value(&self) -> Option<f64> {
        self.averages
    }
}

/// Bird observation count and share per grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirdObservationRow {
    /// HOLC grade.
    #[serde(rename = "Grade")]
    pub grade: HolcGrade,
    /// Number of observations inside zones of this grade.
    #[serde(rename = "Count")]
    pub count: u64,
    /// Share of all matched observations, 2 decimals.
    #[serde(serialize_with = "serialize_2dp")]
    pub percent_observation: f64,
}

impl TidyRow for BirdObservationRow {
    const COLUMNS: &'static [&'static str] = &["Grade", "Count", "percent_observation"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.grade.to_string(),
            self.count.to_string(),
            format2(Some(self.percent_observation)),
        ]
    }

    fn category(&self) -> String {
        self.grade.to_string()
    }

    fn value(&self) -> Option<f64> {
        Some(self.percent_observation)
    }
}
