//! feed-refresh — refresh subscribed feeds from the command line.
//!
//! ```text
//! feed-refresh [config.toml] [--mode interactive|warm-up|background] [--watch]
//! ```
//!
//! * **config** — feeds and refresh limits (default `feeds.toml`).
//! * **`--mode`** — `background` runs time-boxed with the configured deadline
//!   and source cap; the other two refresh every feed.
//! * **`--watch`** — repeat on the configured interval until Ctrl-C.
//!
//! The store is loaded from and saved back to `store_path` around each run.

mod poll;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use feed_refresh::config::Config;
use feed_refresh::source::RssFetcher;
use feed_refresh::store::MemoryStore;
use feed_refresh::{Orchestrator, RefreshMode, RefreshRunSummary};

const DEFAULT_CONFIG: &str = "feeds.toml";

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    Interactive,
    WarmUp,
    Background,
}

struct Args {
    config: PathBuf,
    mode: ModeArg,
    watch: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args {
        config: PathBuf::from(DEFAULT_CONFIG),
        mode: ModeArg::Interactive,
        watch: false,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--watch" => parsed.watch = true,
            "--mode" => {
                let value = args.next().context("--mode needs a value")?;
                parsed.mode = match value.as_str() {
                    "interactive" => ModeArg::Interactive,
                    "warm-up" => ModeArg::WarmUp,
                    "background" => ModeArg::Background,
                    other => bail!("unknown mode {other:?} (expected interactive, warm-up or background)"),
                };
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            path => parsed.config = PathBuf::from(path),
        }
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// One run
// ---------------------------------------------------------------------------

async fn refresh_once(
    orchestrator: &Orchestrator,
    store: &MemoryStore,
    mode: RefreshMode,
    store_path: Option<&Path>,
) -> Result<()> {
    let sources = store.sources()?;
    let summary = orchestrator.run(sources, mode).await?;
    report(&summary, store)?;
    if let Some(path) = store_path {
        store.save(path)?;
    }
    Ok(())
}

fn report(summary: &RefreshRunSummary, store: &MemoryStore) -> Result<()> {
    println!(
        "{} of {} feeds refreshed, {} failed, {} new items in {:.1}s{}",
        summary.succeeded,
        summary.attempted,
        summary.failed,
        summary.new_items,
        summary.elapsed.as_secs_f64(),
        if summary.truncated {
            format!(" (deadline hit, {} abandoned)", summary.abandoned)
        } else {
            String::new()
        },
    );
    for source in store.sources()?.iter().filter(|s| s.is_failing()) {
        println!(
            "  ! {} — {}",
            source.label,
            source.last_error.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::load(&args.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    // -- store ---------------------------------------------------------------
    let store = Arc::new(match &config.store_path {
        Some(path) => MemoryStore::load(path)?,
        None => MemoryStore::new(),
    });
    for feed in &config.feeds {
        if store.subscribe(feed.to_source())? {
            info!(feed = %feed.label, "subscribed");
        }
    }
    if store.sources()?.is_empty() {
        warn!(config = %args.config.display(), "no feeds configured");
    }

    // -- orchestrator ----------------------------------------------------------
    let fetcher = Arc::new(RssFetcher::new(config.refresh.fetch_timeout())?);
    let orchestrator = Orchestrator::new(store.clone(), fetcher).with_limits(config.refresh.limits());
    let mode = match args.mode {
        ModeArg::Interactive => RefreshMode::Interactive,
        ModeArg::WarmUp => RefreshMode::WarmUp,
        ModeArg::Background => config.refresh.time_boxed_mode(),
    };
    let store_path = config.store_path.as_deref();

    if args.watch {
        let shutdown = poll::shutdown_on(tokio::signal::ctrl_c());
        poll::run_periodic(config.refresh.watch_interval(), shutdown, || {
            refresh_once(&orchestrator, &store, mode, store_path)
        })
        .await;
        Ok(())
    } else {
        refresh_once(&orchestrator, &store, mode, store_path).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
