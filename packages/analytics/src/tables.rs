//! The three published tables.

use redlining_analytics_models::{
    BirdObservationRow, CONDITIONS, CensusBlockRow, ConditionRow, round2,
};
use redlining_layer_models::{AttributeValue, HolcGrade, attrs};
use redlining_spatial::IntersectionRecord;

use crate::aggregate::{group_count_percent, group_mean, wide_to_long};
use crate::{AnalyticsError, Record};

fn required_text<'a, T: Record>(
    record: &'a T,
    attribute: &str,
) -> Result<&'a str, AnalyticsError> {
    match record.attributes().get(attribute) {
        Some(AttributeValue::Text(value)) if !value.is_empty() => Ok(value.as_str()),
        Some(value @ AttributeValue::Number(_)) => Err(AnalyticsError::InvalidAttribute {
            record: record.describe(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }),
        _ => Err(AnalyticsError::MissingAttribute {
            record: record.describe(),
            attribute: attribute.to_string(),
        }),
    }
}

/// Reads and parses the HOLC `grade` of a record.
///
/// # Errors
///
/// Returns [`AnalyticsError::MissingAttribute`] if the grade is absent or
/// missing, and [`AnalyticsError::InvalidAttribute`] if it is not A-D.
pub fn grade_key<T: Record>(record: &T) -> Result<HolcGrade, AnalyticsError> {
    let value = required_text(record, attrs::GRADE)?;
    value
        .trim()
        .parse()
        .map_err(|_| AnalyticsError::InvalidAttribute {
            record: record.describe(),
            attribute: attrs::GRADE.to_string(),
            value: value.to_string(),
        })
}

/// Reads the derived `Block_Group_Code` of a record.
///
/// # Errors
///
/// Returns [`AnalyticsError::MissingAttribute`] if the code is absent.
pub fn block_group_key<T: Record>(record: &T) -> Result<String, AnalyticsError> {
    required_text(record, attrs::BLOCK_GROUP_CODE).map(str::to_string)
}

/// The single trailing character of a block-group identifier.
#[must_use]
pub fn block_group_code(id: &str) -> Option<char> {
    id.trim_end().chars().last()
}

/// Adds `Block_Group_Code` to every record, derived from its `ID`.
///
/// # Errors
///
/// Returns [`AnalyticsError::MissingAttribute`] if a record has no usable
/// `ID`.
pub fn derive_block_group_codes(
    records: Vec<IntersectionRecord>,
) -> Result<Vec<IntersectionRecord>, AnalyticsError> {
    records
        .into_iter()
        .map(|mut record| {
            let code = block_group_code(required_text(&record, attrs::ID)?).ok_or_else(|| {
                AnalyticsError::MissingAttribute {
                    record: record.describe(),
                    attribute: attrs::ID.to_string(),
                }
            })?;
            record.attributes.insert(
                attrs::BLOCK_GROUP_CODE.to_string(),
                AttributeValue::Text(code.to_string()),
            );
            Ok(record)
        })
        .collect()
}

/// Share of zone/block-group intersections per `(grade, block group)`,
/// computed over all intersections.
///
/// Records must already carry `Block_Group_Code`
/// (see [`derive_block_group_codes`]).
///
/// # Errors
///
/// Propagates grouping key failures.
pub fn census_block_by_grade(
    records: &[IntersectionRecord],
) -> Result<Vec<CensusBlockRow>, AnalyticsError> {
    let rows = group_count_percent(records, |r| Ok((grade_key(r)?, block_group_key(r)?)))?;

    log::info!(
        "census block table: {} rows from {} intersections",
        rows.len(),
        records.len()
    );

    Ok(rows
        .into_iter()
        .map(|row| CensusBlockRow {
            grade: row.key.0,
            block_group: row.key.1,
            percent: round2(row.percent),
        })
        .collect())
}

/// Mean of each environmental condition per grade, in long form.
///
/// # Errors
///
/// Propagates grouping key failures.
pub fn condition_summary(
    records: &[IntersectionRecord],
) -> Result<Vec<ConditionRow>, AnalyticsError> {
    let attributes: Vec<&str> = CONDITIONS.iter().map(|c| c.attribute).collect();
    let wide = group_mean(records, grade_key, &attributes)?;

    for row in &wide {
        for mean in row.means.iter().filter(|m| m.mean.is_none()) {
            log::warn!("grade {}: no usable {} values", row.key, mean.attribute);
        }
    }

    Ok(wide_to_long(&wide, CONDITIONS)
        .into_iter()
        .map(|row| ConditionRow {
            grade: row.key,
            conditions: row.condition,
            averages: row.value.map(round2),
        })
        .collect())
}

/// Observation count and share per grade.
///
/// # Errors
///
/// Propagates grouping key failures.
pub fn bird_observations_by_grade(
    records: &[IntersectionRecord],
) -> Result<Vec<BirdObservationRow>, AnalyticsError> {
    let rows = group_count_percent(records, grade_key)?;

    log::info!(
        "bird table: {} observations across {} grades",
        records.len(),
        rows.len()
    );

    Ok(rows
        .into_iter()
        .map(|row| BirdObservationRow {
            grade: row.key,
            count: row.count,
            percent_observation: round2(row.percent),
        })
        .collect())
}
