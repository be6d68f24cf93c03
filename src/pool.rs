//! Bounded concurrent fetching with streaming results.
//!
//! [`spawn`] starts a driver task that keeps at most `ceiling` fetches in
//! flight.  The moment one finishes, the next pending job is launched and the
//! finished job's [`RefreshOutcome`] is sent down the channel, so outcomes
//! arrive in completion order, not input order.
//!
//! A failing or panicking fetch only produces a failed outcome for its own
//! source.  If the receiver is dropped the driver stops launching work and
//! detaches whatever is still running; those fetches finish on their own and
//! their results are discarded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tracing::{debug, error};

use crate::clock::Clock;
use crate::model::{Source, SourceId};
use crate::source::{CandidateItem, Fetcher};

/// What the pool needs to know about one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source_id: SourceId,
    pub label: String,
    pub address: String,
}

impl From<&Source> for Job {
    fn from(source: &Source) -> Self {
        Self {
            source_id: source.id.clone(),
            label: source.label.clone(),
            address: source.address.clone(),
        }
    }
}

/// Result of one source's fetch.  Consumed once by the orchestrator.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub source_id: SourceId,
    /// Fetched candidates, or the rendered error chain.
    pub result: Result<Vec<CandidateItem>, String>,
    pub completed_at: DateTime<Utc>,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// Start fetching `jobs` with at most `ceiling` in flight (0 is treated as 1).
///
/// The returned channel yields one outcome per job and closes once every
/// job has reported.  Empty input yields an already-closed channel.
pub fn spawn(
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    jobs: Vec<Job>,
    ceiling: usize,
) -> mpsc::UnboundedReceiver<RefreshOutcome> {
    let (tx, rx) = mpsc::unbounded_channel();
    if jobs.is_empty() {
        return rx;
    }

    let ceiling = ceiling.max(1);
    tokio::spawn(async move {
        let mut pending = jobs.into_iter();
        let mut in_flight: JoinSet<RefreshOutcome> = JoinSet::new();
        let mut owners: HashMap<task::Id, SourceId> = HashMap::new();

        for job in pending.by_ref().take(ceiling) {
            launch(&mut in_flight, &mut owners, &fetcher, &clock, job);
        }

        while let Some(joined) = in_flight.join_next_with_id().await {
            if tx.is_closed() {
                debug!(abandoned = in_flight.len(), "receiver gone, detaching in-flight fetches");
                in_flight.detach_all();
                return;
            }
            // Refill the freed slot first, whatever became of the finished task.
            if let Some(job) = pending.next() {
                launch(&mut in_flight, &mut owners, &fetcher, &clock, job);
            }

            let outcome = match joined {
                Ok((id, outcome)) => {
                    owners.remove(&id);
                    outcome
                }
                Err(e) => {
                    let Some(source_id) = owners.remove(&e.id()) else {
                        error!(error = %e, "fetch task failed for an unknown source");
                        continue;
                    };
                    error!(source = %source_id, error = %e, "fetch task did not complete");
                    RefreshOutcome {
                        source_id,
                        result: Err(format!("fetch task failed: {e}")),
                        completed_at: clock.now(),
                    }
                }
            };

            if tx.send(outcome).is_err() {
                in_flight.detach_all();
                return;
            }
        }
    });

    rx
}

fn launch(
    in_flight: &mut JoinSet<RefreshOutcome>,
    owners: &mut HashMap<task::Id, SourceId>,
    fetcher: &Arc<dyn Fetcher>,
    clock: &Arc<dyn Clock>,
    job: Job,
) {
    let source_id = job.source_id.clone();
    let handle = in_flight.spawn(fetch_one(Arc::clone(fetcher), Arc::clone(clock), job));
    owners.insert(handle.id(), source_id);
}

async fn fetch_one(fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>, job: Job) -> RefreshOutcome {
    debug!(source = %job.source_id, address = %job.address, "fetch started");
    let result = fetcher
        .fetch(&job.address, &job.label)
        .await
        .map_err(|e| format!("{e:#}"));
    RefreshOutcome {
        source_id: job.source_id,
        result,
        completed_at: clock.now(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Address format: `<millis>` to succeed after a delay, `fail` or `panic`.
    #[derive(Default)]
    struct ScriptedFetcher {
        active: AtomicUsize,
        peak: AtomicUsize,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, address: &str, label: &str) -> Result<Vec<CandidateItem>> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let result = match address {
                "fail" => Err(anyhow!("{label} unreachable")),
                "panic" => panic!("fetcher blew up"),
                millis => {
                    tokio::time::sleep(Duration::from_millis(millis.parse()?)).await;
                    Ok(vec![CandidateItem::new(Some(label), label)])
                }
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    fn job(id: &str, address: &str) -> Job {
        Job {
            source_id: SourceId::new(id),
            label: id.to_string(),
            address: address.to_string(),
        }
    }

    fn start(fetcher: &Arc<ScriptedFetcher>, jobs: Vec<Job>, ceiling: usize) -> mpsc::UnboundedReceiver<RefreshOutcome> {
        let fetcher: Arc<dyn Fetcher> = fetcher.clone();
        spawn(fetcher, Arc::new(SystemClock), jobs, ceiling)
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<RefreshOutcome>) -> Vec<RefreshOutcome> {
        let mut out = Vec::new();
        while let Some(o) = rx.recv().await {
            out.push(o);
        }
        out
    }

    #[tokio::test]
    async fn empty_input_closes_immediately() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let outcomes = drain(start(&fetcher, Vec::new(), 4)).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_arrive_in_completion_order() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let jobs = vec![job("slow", "300"), job("fast", "10"), job("mid", "100")];
        let order: Vec<String> = drain(start(&fetcher, jobs, 3))
            .await
            .into_iter()
            .map(|o| o.source_id.0)
            .collect();
        assert_eq!(order, ["fast", "mid", "slow"]);
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_ceiling() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let jobs = (0..12).map(|i| job(&format!("s{i}"), &format!("{}", 5 + (i * 7) % 40))).collect();
        let outcomes = drain(start(&fetcher, jobs, 3)).await;

        assert_eq!(outcomes.len(), 12);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slot_is_refilled_as_soon_as_one_finishes() {
        // With a fixed batch of two, "c" would wait for the 500ms job.
        let fetcher = Arc::new(ScriptedFetcher::default());
        let jobs = vec![job("a", "500"), job("b", "10"), job("c", "10")];
        let started = tokio::time::Instant::now();
        let mut rx = start(&fetcher, jobs, 2);

        let mut seen = Vec::new();
        while let Some(o) = rx.recv().await {
            seen.push((o.source_id.0, started.elapsed()));
        }
        assert_eq!(seen[1].0, "c");
        assert!(seen[1].1 < Duration::from_millis(100), "c finished at {:?}", seen[1].1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_and_panic_are_isolated() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let jobs = vec![job("bad", "fail"), job("boom", "panic"), job("good", "20")];
        let outcomes = drain(start(&fetcher, jobs, 1)).await;

        assert_eq!(outcomes.len(), 3);
        let by_id = |id: &str| outcomes.iter().find(|o| o.source_id.as_str() == id).unwrap();
        assert!(by_id("bad").error().unwrap().contains("bad unreachable"));
        assert!(by_id("boom").error().unwrap().contains("fetch task failed"));
        assert!(by_id("good").is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn panicked_task_frees_its_slot() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let jobs = vec![job("boom", "panic"), job("next", "10"), job("last", "10")];
        let outcomes = drain(start(&fetcher, jobs, 1)).await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.source_id.as_str()).collect();
        assert_eq!(ids, ["boom", "next", "last"]);
        assert_eq!(fetcher.started.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_receiver_stops_new_launches() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let jobs = vec![job("a", "10"), job("b", "10"), job("c", "10"), job("d", "10")];
        let mut rx = start(&fetcher, jobs, 1);

        assert_eq!(rx.recv().await.unwrap().source_id.as_str(), "a");
        drop(rx);
        tokio::time::sleep(Duration::from_secs(1)).await;

        // "b" was already running when the receiver went away and ran to
        // completion; nothing after it started.
        assert_eq!(fetcher.started.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.finished.load(Ordering::SeqCst), 2);
    }
}
