//! Crawler module for discovering and ingesting decisions
//!
//! This module contains the core crawling logic, including:
//! - Change feed pagination per authority
//! - HTTP fetching of decision documents
//! - XML parsing with fallbacks for missing fields
//! - Vocabulary reference resolution
//! - Request throttling and bounded retry
//! - Overall crawl coordination

mod coordinator;
mod feed;
mod fetcher;
mod parser;
mod resolver;
mod retry;
mod throttle;

pub use coordinator::{
    Coordinator, CrawlReport, CrawlSettings, DiscoveryFailure, Ingested, ItemFailure,
};
pub use feed::{parse_feed_entries, ChangeFeed, ChangeFeedPager, FeedPage};
pub use fetcher::{build_http_client, DocumentFetcher, HttpDocumentFetcher};
pub use parser::{parse_document, ParseWarning, ParsedDecision};
pub use resolver::{AuthorityResolution, ResolvedReferences, VocabularyResolver};
pub use retry::RetryPolicy;
pub use throttle::{RequestThrottle, ThrottlePermit};

use crate::config::Config;
use crate::Result;
use chrono::NaiveDate;

/// Runs a complete crawl of one authority category
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the storage layer
/// 2. Build the HTTP client, throttle and retry policy
/// 3. Discover and ingest the changed decisions of every authority
/// 4. Return the run report
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration, stored with the run
/// * `category` - Authority category, e.g. "Rechtbank"
/// * `since` - Only decisions modified on or after this date
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished
/// * `Err(CrawlError)` - Crawl could not start or the store failed
pub async fn crawl(
    config: &Config,
    config_hash: &str,
    category: &str,
    since: NaiveDate,
) -> Result<CrawlReport> {
    let coordinator = Coordinator::from_config(config, config_hash)?;
    coordinator.run(category, since).await
}
