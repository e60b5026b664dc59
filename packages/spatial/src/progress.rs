//! Overlay progress.
//!
//! [`overlay`](crate::overlay) and its polygon and point variants walk
//! the left-hand zone layer once. They announce the zone count through
//! [`ProgressCallback::set_total`], advance one unit per zone and finish
//! with the number of intersections found. The CLI renders this as an
//! `indicatif` bar; library callers and tests pass [`NullProgress`].

use std::sync::Arc;

/// Receives zone-by-zone progress from an overlay.
pub trait ProgressCallback: Send + Sync {
    /// Number of left-hand zones the overlay will visit.
    fn set_total(&self, total: u64);

    /// `delta` more zones have been matched against the right layer.
    fn inc(&self, delta: u64);

    /// Label for the running overlay, e.g. `holc x ejscreen`.
    fn set_message(&self, msg: String);

    /// Called once with an intersection summary after the last zone.
    fn finish(&self, msg: String);
}

/// Discards overlay progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Shared [`NullProgress`], for callers that hand out one reporter per
/// overlay.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
