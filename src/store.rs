//! The persistent store the orchestrator reads from and commits to.
//!
//! [`Store`] is the minimal contract a refresh run needs: read every item's
//! de-duplication key once, then record one result per source.  Each
//! `record_*` call is atomic with respect to its own source.
//!
//! [`MemoryStore`] is a mutex-guarded implementation that can be snapshotted
//! to a JSON file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::ItemKey;
use crate::model::{Item, Source, SourceId};

pub trait Store: Send + Sync {
    /// De-duplication keys of every stored item.  Failing here means the
    /// store is unavailable and no refresh can run.
    fn item_keys(&self) -> Result<Vec<ItemKey>>;

    /// Insert `items` for `source`, set its refresh time to `at`, clear its
    /// error and failure streak.  All or nothing.
    fn record_success(&self, source: &SourceId, items: Vec<Item>, at: DateTime<Utc>) -> Result<()>;

    /// Store `error` on `source` without touching its refresh time.
    fn record_failure(&self, source: &SourceId, error: &str) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    sources: Vec<Source>,
    items: Vec<Item>,
}

impl Snapshot {
    fn source_mut(&mut self, id: &SourceId) -> Result<&mut Source> {
        self.sources
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| anyhow!("unknown source {id}"))
    }
}

/// In-process store with optional JSON persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a snapshot written by [`save`](Self::save).  A missing file
    /// yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read store file: {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse store file: {}", path.display()))?;
        Ok(Self {
            inner: Mutex::new(snapshot),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = {
            let guard = self.lock()?;
            serde_json::to_string_pretty(&*guard).context("Failed to serialise store")?
        };
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write store file: {}", path.display()))
    }

    /// Add a source.  Returns `false` if one with the same id already exists;
    /// the existing record is left as is.
    pub fn subscribe(&self, source: Source) -> Result<bool> {
        let mut guard = self.lock()?;
        if guard.sources.iter().any(|s| s.id == source.id) {
            return Ok(false);
        }
        guard.sources.push(source);
        Ok(true)
    }

    /// Remove a source and every item that belongs to it.
    pub fn unsubscribe(&self, id: &SourceId) -> Result<bool> {
        let mut guard = self.lock()?;
        let before = guard.sources.len();
        guard.sources.retain(|s| &s.id != id);
        if guard.sources.len() == before {
            return Ok(false);
        }
        guard.items.retain(|i| &i.source_id != id);
        Ok(true)
    }

    pub fn sources(&self) -> Result<Vec<Source>> {
        Ok(self.lock()?.sources.clone())
    }

    pub fn source(&self, id: &SourceId) -> Result<Option<Source>> {
        Ok(self.lock()?.sources.iter().find(|s| &s.id == id).cloned())
    }

    pub fn items_for(&self, id: &SourceId) -> Result<Vec<Item>> {
        Ok(self
            .lock()?
            .items
            .iter()
            .filter(|i| &i.source_id == id)
            .cloned()
            .collect())
    }

    pub fn item_count(&self) -> Result<usize> {
        Ok(self.lock()?.items.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>> {
        self.inner.lock().map_err(|_| anyhow!("store lock poisoned"))
    }
}

impl Store for MemoryStore {
    fn item_keys(&self) -> Result<Vec<ItemKey>> {
        Ok(self.lock()?.items.iter().map(ItemKey::from).collect())
    }

    fn record_success(&self, source: &SourceId, items: Vec<Item>, at: DateTime<Utc>) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(stray) = items.iter().find(|i| &i.source_id != source) {
            bail!("item {:?} does not belong to source {source}", stray.id);
        }
        let src = guard.source_mut(source)?;
        src.last_refreshed = Some(at);
        src.last_error = None;
        src.consecutive_failures = 0;
        guard.items.extend(items);
        Ok(())
    }

    fn record_failure(&self, source: &SourceId, error: &str) -> Result<()> {
        let mut guard = self.lock()?;
        let src = guard.source_mut(source)?;
        src.last_error = Some(error.to_string());
        src.consecutive_failures = src.consecutive_failures.saturating_add(1);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
