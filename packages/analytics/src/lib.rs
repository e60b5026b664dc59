#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation over overlay results.
//!
//! [`aggregate`] holds the generic, key-function driven operations
//! (group-count-percentage, group-mean, wide-to-long). [`tables`] builds the
//! three published tables from intersection records on top of them.

pub mod aggregate;
pub mod tables;

use redlining_layer_models::{Attributes, Feature};
use redlining_spatial::IntersectionRecord;
use thiserror::Error;

/// Errors that can occur during aggregation.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A grouping attribute is absent or missing.
    #[error("{record} is missing grouping attribute {attribute:?}")]
    MissingAttribute {
        /// Description of the offending record.
        record: String,
        /// Attribute that was required.
        attribute: String,
    },

    /// A grouping attribute holds a value that cannot be used as a key.
    #[error("{record} has invalid {attribute:?} value {value:?}")]
    InvalidAttribute {
        /// Description of the offending record.
        record: String,
        /// Attribute name.
        attribute: String,
        /// Display form of the offending value.
        value: String,
    },
}

/// Anything with an attribute map that can be aggregated.
pub trait Record {
    /// The record's attributes.
    fn attributes(&self) -> &Attributes;

    /// Short description used in error messages.
    fn describe(&self) -> String;
}

impl Record for IntersectionRecord {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn describe(&self) -> String {
        format!("intersection ({}, {})", self.left, self.right)
    }
}

impl Record for Feature {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn describe(&self) -> String {
        "feature".to_string()
    }
}
