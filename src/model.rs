//! Persistent records owned by the store.
//!
//! A [`Source`] is a subscribed feed; an [`Item`] is one article that belongs
//! to exactly one source through its [`SourceId`].  Only the refresh
//! orchestrator writes refresh state (`last_refreshed`, `last_error`,
//! `consecutive_failures`) and only after an attempt has completed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::source::CandidateItem;

/// Stable identifier of a subscribed source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locally generated item identifier.  Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// A subscribed content origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    /// Display label, also handed to the fetcher.
    pub label: String,
    /// Feed URL.
    pub address: String,
    /// Completion time of the last successful refresh.  `None` means the
    /// source has never refreshed successfully.
    #[serde(default)]
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Message of the most recent failed attempt; cleared on success.
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub prioritized: bool,
    /// Failed attempts since the last success.
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl Source {
    pub fn new(id: impl Into<String>, label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: SourceId::new(id),
            label: label.into(),
            address: address.into(),
            last_refreshed: None,
            last_error: None,
            prioritized: false,
            consecutive_failures: 0,
        }
    }

    pub fn prioritized(mut self, prioritized: bool) -> Self {
        self.prioritized = prioritized;
        self
    }

    /// A source whose latest attempt failed, as opposed to one that is merely
    /// stale.
    pub fn is_failing(&self) -> bool {
        self.last_error.is_some()
    }
}

/// One stored article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub source_id: SourceId,
    /// Identifier supplied by the feed (RSS guid / link), if any.
    pub feed_id: Option<String>,
    pub title: String,
    pub summary: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub saved: bool,
}

impl Item {
    /// Materialise a candidate that survived de-duplication.
    pub fn from_candidate(source_id: &SourceId, candidate: CandidateItem) -> Self {
        Self {
            id: ItemId::generate(),
            source_id: source_id.clone(),
            feed_id: candidate.feed_id,
            title: candidate.title,
            summary: candidate.summary,
            link: candidate.link,
            published: candidate.published,
            read: false,
            saved: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_source_is_never_refreshed() {
        let src = Source::new("a", "A", "https://a.example/feed");
        assert!(src.last_refreshed.is_none());
        assert!(!src.is_failing());
        assert!(!src.prioritized);
    }

    #[test]
    fn items_from_same_candidate_get_distinct_ids() {
        let sid = SourceId::new("a");
        let cand = CandidateItem::new(Some("g1"), "Title");
        let first = Item::from_candidate(&sid, cand.clone());
        let second = Item::from_candidate(&sid, cand);
        assert_ne!(first.id, second.id);
        assert_eq!(first.feed_id.as_deref(), Some("g1"));
        assert_eq!(first.source_id, sid);
        assert!(!first.read && !first.saved);
    }
}
