//! De-duplication of fetched candidates against stored items.
//!
//! Two items are duplicates when they share a feed identifier, or, when the
//! candidate has no feed identifier, when they share an exact title within
//! the same source.  A present identifier is authoritative: a candidate with
//! an unseen identifier is new even if its title collides.
//!
//! [`ExistingKeys`] is loaded once per run and is read-only while fetches are
//! in flight; the orchestrator folds committed items back in with
//! [`ExistingKeys::insert`] on its single commit path.

use std::collections::{HashMap, HashSet};

use crate::model::{Item, SourceId};
use crate::source::CandidateItem;

/// The parts of a stored item that take part in duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    pub source_id: SourceId,
    pub feed_id: Option<String>,
    pub title: String,
}

impl From<&Item> for ItemKey {
    fn from(item: &Item) -> Self {
        Self {
            source_id: item.source_id.clone(),
            feed_id: item.feed_id.clone(),
            title: item.title.clone(),
        }
    }
}

/// Identifier and per-source title index over every stored item.
#[derive(Debug, Default, Clone)]
pub struct ExistingKeys {
    feed_ids: HashSet<String>,
    titles: HashMap<SourceId, HashSet<String>>,
}

/// Result of splitting one batch of candidates.
#[derive(Debug, Default)]
pub struct Partition {
    /// Candidates that must be persisted, in input order.
    pub fresh: Vec<CandidateItem>,
    /// Number of candidates rejected as duplicates.
    pub duplicates: usize,
}

impl ExistingKeys {
    pub fn from_keys(keys: impl IntoIterator<Item = ItemKey>) -> Self {
        let mut existing = Self::default();
        for key in keys {
            existing.insert(key);
        }
        existing
    }

    pub fn insert(&mut self, key: ItemKey) {
        if let Some(id) = key.feed_id {
            self.feed_ids.insert(id);
        }
        self.titles.entry(key.source_id).or_default().insert(key.title);
    }

    pub fn len(&self) -> usize {
        self.titles.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Whether `candidate` duplicates something already stored for `source`.
    pub fn contains(&self, source: &SourceId, candidate: &CandidateItem) -> bool {
        match &candidate.feed_id {
            Some(id) => self.feed_ids.contains(id),
            None => self
                .titles
                .get(source)
                .is_some_and(|titles| titles.contains(&candidate.title)),
        }
    }

    /// Split a fetched batch into new candidates and duplicates.
    ///
    /// Repeats inside the batch itself are caught too: only the first
    /// occurrence of an identifier (or, for identifier-less candidates, of a
    /// title) survives.
    pub fn partition(&self, source: &SourceId, candidates: Vec<CandidateItem>) -> Partition {
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_titles: HashSet<String> = HashSet::new();
        let mut out = Partition::default();

        for candidate in candidates {
            let repeat = match &candidate.feed_id {
                Some(id) => !seen_ids.insert(id.clone()),
                None => !seen_titles.insert(candidate.title.clone()),
            };
            if repeat || self.contains(source, &candidate) {
                out.duplicates += 1;
            } else {
                out.fresh.push(candidate);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
