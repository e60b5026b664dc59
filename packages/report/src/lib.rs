#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Presentation sink for the tidy tables.
//!
//! Renders any [`TidyRow`] table as an aligned console table or a
//! horizontal text bar chart, and writes it out as CSV using the row's
//! serde column names.

use std::io::Write;
use std::path::{Path, PathBuf};

use redlining_analytics_models::TidyRow;
use thiserror::Error;

/// Default bar width in characters for [`render_bar_chart`].
pub const DEFAULT_BAR_WIDTH: usize = 40;

/// Errors that can occur while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Creating the output directory or file failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// The path being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

const SEPARATOR: &str = "  ";

fn format_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
        .trim_end()
        .to_string()
}

/// Renders `rows` as a left-aligned text table under `title`.
#[must_use]
pub fn render_table<R: TidyRow>(title: &str, rows: &[R]) -> String {
    let cells: Vec<Vec<String>> = rows.iter().map(TidyRow::cells).collect();

    let widths: Vec<usize> = R::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, header)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(String::len)
                .chain(std::iter::once(header.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&format_line(R::COLUMNS.iter().copied(), &widths));
    out.push('\n');
    let rule = widths.iter().sum::<usize>() + SEPARATOR.len() * widths.len().saturating_sub(1);
    out.push_str(&"-".repeat(rule));
    out.push('\n');

    for row in &cells {
        out.push_str(&format_line(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }

    if rows.is_empty() {
        out.push_str("(no rows)\n");
    }

    out
}

/// Renders `rows` as a horizontal bar chart, one bar per row.
///
/// Bars are scaled so the largest value spans `width` characters. Rows
/// without a value are labelled `NA` and get no bar.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn render_bar_chart<R: TidyRow>(title: &str, rows: &[R], width: usize) -> String {
    let labels: Vec<String> = rows.iter().map(TidyRow::category).collect();
    let label_width = labels.iter().map(String::len).max().unwrap_or(0);

    let max = rows
        .iter()
        .filter_map(TidyRow::value)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');

    for (row, label) in rows.iter().zip(&labels) {
        let line = match row.value() {
            Some(value) if value.is_finite() => {
                let len = if max > 0.0 {
                    ((value.max(0.0) / max) * width as f64).round() as usize
                } else {
                    0
                };
                format!("{label:<label_width$} | {} {value:.2}", "#".repeat(len))
            }
            _ => format!("{label:<label_width$} | NA"),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Serializes `rows` as CSV into `writer`, header first.
///
/// # Errors
///
/// Returns [`ReportError::Csv`] if serialization fails.
pub fn write_csv_to<W: Write, R: TidyRow>(writer: W, rows: &[R]) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    if rows.is_empty() {
        csv_writer.write_record(R::COLUMNS)?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }

    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes `rows` to `path` as CSV, creating parent directories.
///
/// # Errors
///
/// Returns [`ReportError`] if the file cannot be created or written.
pub fn write_csv<R: TidyRow>(path: &Path, rows: &[R]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ReportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file = std::fs::File::create(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    write_csv_to(std::io::BufWriter::new(file), rows)?;

    log::info!("Wrote {} rows to {}", rows.len(), path.display());

    Ok(())
}
