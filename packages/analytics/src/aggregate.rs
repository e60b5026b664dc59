//! Generic grouped aggregation.
//!
//! Every operation takes a key function returning `Result`, so a record
//! that cannot produce its key aborts the whole aggregation instead of
//! landing in an undefined group. Output rows are ordered by key.

use std::collections::BTreeMap;

use redlining_analytics_models::{AttributeMean, Condition, CountRow, LongRow, MeanRow};
use redlining_layer_models::AttributeValue;

use crate::{AnalyticsError, Record};

#[allow(clippy::cast_precision_loss)]
fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Counts records per key. Percentages are computed over the whole input,
/// so they sum to 100 for any non-empty input even when the key is
/// composite.
///
/// # Errors
///
/// Propagates the first error returned by `key`.
pub fn group_count_percent<T, K, F>(
    records: &[T],
    key: F,
) -> Result<Vec<CountRow<K>>, AnalyticsError>
where
    K: Ord,
    F: Fn(&T) -> Result<K, AnalyticsError>,
{
    let mut counts: BTreeMap<K, u64> = BTreeMap::new();
    for record in records {
        *counts.entry(key(record)?).or_insert(0) += 1;
    }

    let total = records.len() as u64;

    Ok(counts
        .into_iter()
        .map(|(key, count)| CountRow {
            key,
            count,
            percent: percent(count, total),
        })
        .collect())
}

/// Counts records per `(outer, inner)` key with percentages normalized
/// within each outer group, so each outer group sums to 100.
///
/// # Errors
///
/// Propagates the first error returned by either key function.
pub fn group_count_percent_within<T, O, I, FO, FI>(
    records: &[T],
    outer: FO,
    inner: FI,
) -> Result<Vec<CountRow<(O, I)>>, AnalyticsError>
where
    O: Ord + Clone,
    I: Ord,
    FO: Fn(&T) -> Result<O, AnalyticsError>,
    FI: Fn(&T) -> Result<I, AnalyticsError>,
{
    let mut counts: BTreeMap<(O, I), u64> = BTreeMap::new();
    let mut outer_totals: BTreeMap<O, u64> = BTreeMap::new();

    for record in records {
        let o = outer(record)?;
        let i = inner(record)?;
        *outer_totals.entry(o.clone()).or_insert(0) += 1;
        *counts.entry((o, i)).or_insert(0) += 1;
    }

    Ok(counts
        .into_iter()
        .map(|(key, count)| {
            let total = outer_totals.get(&key.0).copied().unwrap_or(0);
            CountRow {
                key,
                count,
                percent: percent(count, total),
            }
        })
        .collect())
}

/// Means of the named numeric attributes per key.
///
/// Absent attributes, explicit missing values, NaN, and text that does not
/// parse as a number are excluded from both the sum and the count. A group
/// with no usable values for an attribute gets a `None` mean.
///
/// # Errors
///
/// Propagates the first error returned by `key`.
#[allow(clippy::cast_precision_loss)]
pub fn group_mean<T, K, F>(
    records: &[T],
    key: F,
    attributes: &[&str],
) -> Result<Vec<MeanRow<K>>, AnalyticsError>
where
    T: Record,
    K: Ord,
    F: Fn(&T) -> Result<K, AnalyticsError>,
{
    // (sum, observations) per attribute, in request order
    let mut groups: BTreeMap<K, Vec<(f64, u64)>> = BTreeMap::new();

    for record in records {
        let sums = groups
            .entry(key(record)?)
            .or_insert_with(|| vec![(0.0, 0); attributes.len()]);

        for (slot, attribute) in sums.iter_mut().zip(attributes) {
            if let Some(value) = record
                .attributes()
                .get(*attribute)
                .and_then(AttributeValue::as_f64)
            {
                slot.0 += value;
                slot.1 += 1;
            }
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, sums)| MeanRow {
            key,
            means: sums
                .into_iter()
                .zip(attributes)
                .map(|((sum, observations), attribute)| AttributeMean {
                    attribute: (*attribute).to_string(),
                    mean: (observations > 0).then(|| sum / observations as f64),
                    observations,
                })
                .collect(),
        })
        .collect())
}

/// Reshapes one row per key with N means into N rows per key, each pairing
/// a condition label with its value. Rows keep key order, then condition
/// order.
#[must_use]
pub fn wide_to_long<K: Clone>(rows: &[MeanRow<K>], conditions: &[Condition]) -> Vec<LongRow<K>> {
    rows.iter()
        .flat_map(|row| {
            conditions.iter().map(move |condition| LongRow {
                key: row.key.clone(),
                condition: condition.label.to_string(),
                value: row.mean(condition.attribute),
            })
        })
        .collect()
}
