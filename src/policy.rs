//! Ordering and truncation of the working set for time-boxed runs.
//!
//! Prioritized sources come first.  Within each group the stalest source
//! leads, and a source that has never refreshed successfully counts as
//! infinitely stale.  Ties keep their input order.

use std::cmp::Ordering;

use crate::model::Source;

/// Order `sources` and keep at most `max` of them.
pub fn prioritize(mut sources: Vec<Source>, max: Option<usize>) -> Vec<Source> {
    // Stable sort so equal keys keep the caller's order.
    sources.sort_by(compare);
    if let Some(max) = max {
        sources.truncate(max);
    }
    sources
}

fn compare(a: &Source, b: &Source) -> Ordering {
    // `true` must sort first, hence b before a.
    b.prioritized
        .cmp(&a.prioritized)
        // `None < Some(_)` so never-refreshed sources lead.
        .then_with(|| a.last_refreshed.cmp(&b.last_refreshed))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
