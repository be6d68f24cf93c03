//! feed-refresh — refreshes a set of subscribed feeds and merges new items
//! into a local store.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  sources  ┌──────────────┐  jobs   ┌─────────┐  fetch  ┌──────────┐
//! │  caller  │ ────────► │ orchestrator │ ──────► │  pool   │ ──────► │ Fetcher  │
//! └──────────┘           └──────────────┘         └─────────┘         └──────────┘
//!                          │    ▲                      │ RefreshOutcome
//!                   commit │    └──── guard ◄──────────┘ (completion order)
//!                          ▼       (deadline)
//!                   ┌──────────┐
//!                   │  store   │ ◄── merge (de-duplication keys)
//!                   └──────────┘
//! ```
//!
//! * **`source`** — the [`Fetcher`](source::Fetcher) trait and the RSS
//!   implementation.
//! * **`pool`** — sliding-window concurrent fetching.
//! * **`merge`** — decides which fetched candidates are new.
//! * **`policy`** — ordering and truncation for time-boxed runs.
//! * **`guard`** — the execution window that ends a time-boxed run.
//! * **`orchestrator`** — wires the above together for one run.
//! * **`store`** — the persistence contract plus an in-memory store.

pub mod clock;
pub mod config;
pub mod guard;
pub mod merge;
pub mod model;
pub mod orchestrator;
pub mod policy;
pub mod pool;
pub mod source;
pub mod store;

pub use model::{Item, ItemId, Source, SourceId};
pub use orchestrator::{ConcurrencyLimits, Orchestrator, RefreshMode, RefreshRunSummary};
