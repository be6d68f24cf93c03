//! One refresh run across a set of sources.
//!
//! ```text
//!  sources ──► policy (time-boxed only) ──► pool ──► window ──► merge ──► store
//!                                          (C tasks)  (deadline)  (keys)  (commit)
//! ```
//!
//! All store writes happen here, on the task that called [`Orchestrator::run`],
//! one outcome at a time.  Pool tasks only fetch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::guard::ExecutionWindow;
use crate::merge::{ExistingKeys, ItemKey};
use crate::model::{Item, Source};
use crate::policy;
use crate::pool::{self, Job, RefreshOutcome};
use crate::source::Fetcher;
use crate::store::Store;

/// Why a run was started, which decides its ceiling and whether it is
/// bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// User-initiated pull: every source, high concurrency.
    Interactive,
    /// App-launch refresh: every source.
    WarmUp,
    /// Background refresh under a hard budget.  Sources are prioritised and
    /// cut to `max_sources`; results arriving after `deadline` are dropped.
    TimeBoxed {
        deadline: Duration,
        max_sources: Option<usize>,
    },
}

/// Concurrency ceiling per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimits {
    pub interactive: usize,
    pub warm_up: usize,
    pub time_boxed: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            interactive: 8,
            warm_up: 6,
            time_boxed: 2,
        }
    }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshRunSummary {
    /// Sources handed to the pool.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Attempted sources whose result never made it in before the deadline.
    pub abandoned: usize,
    /// Items committed across all sources.
    pub new_items: usize,
    pub elapsed: Duration,
    /// Set when the execution window expired.
    pub truncated: bool,
}

impl RefreshRunSummary {
    pub fn is_complete(&self) -> bool {
        !self.truncated && self.abandoned == 0
    }
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    limits: ConcurrencyLimits,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn Store>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            store,
            fetcher,
            clock: Arc::new(SystemClock),
            limits: ConcurrencyLimits::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_limits(mut self, limits: ConcurrencyLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Refresh `sources` and merge what they return.
    ///
    /// Per-source failures end up on the source record, not in the returned
    /// error.  `Err` means the store could not be read and nothing was
    /// attempted.
    pub async fn run(&self, sources: Vec<Source>, mode: RefreshMode) -> Result<RefreshRunSummary> {
        let started = Instant::now();

        let (working, ceiling, mut window) = match mode {
            RefreshMode::Interactive => (sources, self.limits.interactive, ExecutionWindow::unbounded()),
            RefreshMode::WarmUp => (sources, self.limits.warm_up, ExecutionWindow::unbounded()),
            RefreshMode::TimeBoxed { deadline, max_sources } => (
                policy::prioritize(sources, max_sources),
                self.limits.time_boxed,
                ExecutionWindow::new(started, deadline),
            ),
        };

        let mut keys = ExistingKeys::from_keys(
            self.store
                .item_keys()
                .context("store unavailable, refresh not started")?,
        );

        info!(?mode, sources = working.len(), ceiling, known_items = keys.len(), "refresh run started");

        let jobs: Vec<Job> = working.iter().map(Job::from).collect();
        let mut summary = RefreshRunSummary {
            attempted: jobs.len(),
            ..Default::default()
        };
        let mut outcomes = pool::spawn(Arc::clone(&self.fetcher), Arc::clone(&self.clock), jobs, ceiling);

        while let Some(outcome) = window.next(&mut outcomes).await {
            self.commit(outcome, &mut keys, &mut summary);
        }
        // Dropping the receiver tells the pool to stop launching; anything
        // still running is left to finish on its own.
        drop(outcomes);

        summary.truncated = window.is_expired();
        summary.abandoned = summary.attempted - summary.succeeded - summary.failed;
        summary.elapsed = started.elapsed();

        if summary.truncated {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                abandoned = summary.abandoned,
                "refresh run hit its deadline"
            );
        } else {
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                new_items = summary.new_items,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "refresh run finished"
            );
        }
        Ok(summary)
    }

    fn commit(&self, outcome: RefreshOutcome, keys: &mut ExistingKeys, summary: &mut RefreshRunSummary) {
        let RefreshOutcome {
            source_id,
            result,
            completed_at,
        } = outcome;

        match result {
            Ok(candidates) => {
                let fetched = candidates.len();
                let mut partition = keys.partition(&source_id, candidates);
                partition.fresh.sort();

                let items: Vec<Item> = partition
                    .fresh
                    .into_iter()
                    .map(|c| Item::from_candidate(&source_id, c))
                    .collect();
                let committed: Vec<ItemKey> = items.iter().map(ItemKey::from).collect();
                let count = items.len();

                match self.store.record_success(&source_id, items, completed_at) {
                    Ok(()) => {
                        for key in committed {
                            keys.insert(key);
                        }
                        summary.succeeded += 1;
                        summary.new_items += count;
                        debug!(source = %source_id, fetched, new = count, duplicates = partition.duplicates, "source refreshed");
                    }
                    Err(e) => {
                        let e = format!("{e:#}");
                        error!(source = %source_id, error = %e, "failed to commit refresh");
                        summary.failed += 1;
                    }
                }
            }
            Err(message) => {
                warn!(source = %source_id, error = %message, "refresh failed");
                if let Err(e) = self.store.record_failure(&source_id, &message) {
                    let e = format!("{e:#}");
                    error!(source = %source_id, error = %e, "failed to record refresh error");
                }
                summary.failed += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
