//! The source fetcher boundary.
//!
//! This module defines the [`Fetcher`] trait and the [`CandidateItem`] it
//! produces.  Concrete fetchers live in sub-modules (currently only
//! [`rss`]).
//!
//! ## Adding a new format
//!
//! 1. Create a new file in this directory (e.g. `atom.rs`).
//! 2. Define a struct and implement [`Fetcher`] for it.
//! 3. Add `mod atom;` below and re-export your struct in the `pub use` block.
//!
//! The pool, merge engine and orchestrator are format-agnostic.

mod candidate;
mod rss;

pub use candidate::CandidateItem;
pub use rss::RssFetcher;

use anyhow::Result;
use async_trait::async_trait;

/// Retrieves the current content of one feed.
///
/// The pool calls [`fetch()`](Fetcher::fetch) from many tasks at once, so
/// implementations must be `Send + Sync`.  There is no retry at the caller:
/// any error is terminal for that attempt and ends up in the source's
/// `last_error`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch and parse the feed at `address`.
    async fn fetch(&self, address: &str, label: &str) -> Result<Vec<CandidateItem>>;
}
