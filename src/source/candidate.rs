//! The record every fetcher produces.
//!
//! `CandidateItem` is an item-shaped value that has been fetched but not yet
//! checked against the store.  Fetchers convert their native format into
//! candidates; the merge engine decides which of them become stored
//! [`Item`](crate::model::Item)s.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A freshly fetched entry, normalised from any feed format.
///
/// ## Sorting
///
/// `CandidateItem` implements [`Ord`] for **reverse-chronological** ordering:
/// newer items sort before older ones, and items without a date sort last.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CandidateItem {
    /// Identifier supplied by the feed, used for de-duplication.
    ///
    /// For RSS this is the `<guid>` element (falling back to `<link>`).
    /// `None` when the feed provides neither; the title then stands in.
    pub feed_id: Option<String>,

    /// Human-readable headline.
    pub title: String,

    /// Optional body or summary text.
    pub summary: Option<String>,

    /// URL to the full content.
    pub link: Option<String>,

    /// Publication timestamp.  `None` sorts after all dated items.
    pub published: Option<DateTime<Utc>>,
}

impl CandidateItem {
    pub fn new(feed_id: Option<&str>, title: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.map(String::from),
            title: title.into(),
            summary: None,
            link: None,
            published: None,
        }
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published = Some(at);
        self
    }
}

// ---------------------------------------------------------------------------
// Ordering — reverse chronological (newest first)
// ---------------------------------------------------------------------------

impl Ord for CandidateItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // `None` is less than `Some(_)`, so comparing `other` first puts
        // undated items at the bottom.
        other.published.cmp(&self.published)
    }
}

impl PartialOrd for CandidateItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
