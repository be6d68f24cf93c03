//! RSS 2.0 fetcher.
//!
//! Downloads a feed with [`reqwest`] and parses it with the [`rss`] crate.
//! Parsing is split out into [`RssFetcher::parse_channel`] so it can be tested
//! without the network.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use super::{CandidateItem, Fetcher};

/// Fetches RSS feeds over HTTP.
#[derive(Clone)]
pub struct RssFetcher {
    client: Client,
}

impl RssFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feed-refresh/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Convert an already-parsed [`rss::Channel`] into candidates.
    pub fn parse_channel(channel: &rss::Channel) -> Vec<CandidateItem> {
        channel
            .items()
            .iter()
            .map(|item| {
                // Prefer <guid>, fall back to <link>.
                let feed_id = item
                    .guid()
                    .map(|g| g.value().trim().to_string())
                    .filter(|g| !g.is_empty())
                    .or_else(|| item.link().map(String::from));

                // Unparseable dates degrade to None.
                let published = item
                    .pub_date()
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                    .map(|dt| dt.with_timezone(&Utc));

                CandidateItem {
                    feed_id,
                    title: item.title().unwrap_or("(untitled)").to_string(),
                    summary: item.description().map(String::from),
                    link: item.link().map(String::from),
                    published,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Fetcher for RssFetcher {
    async fn fetch(&self, address: &str, label: &str) -> Result<Vec<CandidateItem>> {
        let body = self
            .client
            .get(address)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .with_context(|| format!("{label}: request to {address} failed"))?
            .bytes()
            .await
            .with_context(|| format!("{label}: failed to read response body"))?;
        let channel = rss::Channel::read_from(body.as_ref())
            .with_context(|| format!("{label}: response is not a valid RSS document"))?;
        Ok(Self::parse_channel(&channel))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Vec<CandidateItem> {
        let channel = rss::Channel::read_from(xml.as_bytes()).unwrap();
        RssFetcher::parse_channel(&channel)
    }

    #[test]
    fn parse_channel_extracts_items() {
        let items = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>First Post</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <description>First description</description>
    </item>
    <item>
      <title>Second Post</title>
      <link>https://example.com/2</link>
      <guid>guid-2</guid>
    </item>
  </channel>
</rss>"#,
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].feed_id.as_deref(), Some("guid-1"));
        assert_eq!(items[0].title, "First Post");
        assert_eq!(items[0].summary.as_deref(), Some("First description"));
        assert!(items[0].published.is_some());
        assert_eq!(items[1].feed_id.as_deref(), Some("guid-2"));
        assert!(items[1].summary.is_none());
    }

    #[test]
    fn falls_back_to_link_when_no_guid() {
        let items = parse(
            r#"<rss version="2.0"><channel><title>T</title>
<item><title>No GUID</title><link>https://example.com/no-guid</link></item>
</channel></rss>"#,
        );
        assert_eq!(items[0].feed_id.as_deref(), Some("https://example.com/no-guid"));
    }

    #[test]
    fn identifier_absent_without_guid_or_link() {
        let items = parse(
            r#"<rss version="2.0"><channel><title>T</title>
<item><title>Bare</title><pubDate>not-a-real-date</pubDate></item>
</channel></rss>"#,
        );
        assert!(items[0].feed_id.is_none());
        assert!(items[0].published.is_none());
    }

    #[test]
    fn handles_missing_title() {
        let items = parse(
            r#"<rss version="2.0"><channel><title>T</title>
<item><guid>g1</guid></item>
</channel></rss>"#,
        );
        assert_eq!(items[0].title, "(untitled)");
    }
}
