//! Periodic refresh trigger for `--watch`.
//!
//! The orchestrator has no timers of its own; this loop is the caller that
//! decides when to invoke it.  A tick that fails is logged and the loop waits
//! for the next one.

use std::future::Future;
use std::io;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

/// Call `tick` immediately and then every `interval` until `shutdown`
/// resolves.  A tick that overruns the interval delays the next one instead
/// of bunching them up.
pub async fn run_periodic<F, Fut>(interval: Duration, shutdown: impl Future<Output = ()>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    tokio::pin!(shutdown);
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, stopping periodic refresh");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = tick().await {
                    error!("refresh run failed: {:#}", e);
                }
            }
        }
    }
}

/// Resolve when `signal` fires.  If the signal handler could not be
/// installed, log it and never resolve, so `--watch` keeps running.
pub async fn shutdown_on(signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!("cannot listen for Ctrl-C, stop the process another way: {}", e);
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ticks_until_shutdown() {
        let ticks = AtomicUsize::new(0);
        let counter = &ticks;
        run_periodic(Duration::from_secs(10), time::sleep(Duration::from_secs(35)), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
        // t = 0, 10, 20, 30
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_forever_without_signal_handler() {
        let broken = async { Err::<(), _>(io::Error::other("no signal driver")) };
        let waited = time::timeout(Duration::from_secs(3600), shutdown_on(broken)).await;
        assert!(waited.is_err(), "shutdown must not fire when the handler is missing");

        let fired = time::timeout(Duration::from_secs(1), shutdown_on(async { Ok::<(), io::Error>(()) })).await;
        assert!(fired.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_does_not_stop_the_loop() {
        let ticks = AtomicUsize::new(0);
        let counter = &ticks;
        run_periodic(Duration::from_secs(10), time::sleep(Duration::from_secs(15)), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                bail!("store unavailable");
            }
            Ok(())
        })
        .await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }
}
