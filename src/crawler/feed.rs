//! Change feed discovery
//!
//! The search endpoint returns an Atom feed of the decisions an authority
//! published or modified since a date. Results are paged with a fixed page
//! size; a page with fewer entries than requested is the last one.

use crate::crawler::fetcher::get_text;
use crate::crawler::throttle::RequestThrottle;
use crate::{CrawlError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use roxmltree::Document;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Path of the search endpoint, relative to the API base URL
pub const SEARCH_PATH: &str = "/uitspraken/zoeken";

/// Lists the identifiers of decisions that changed since a date
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Lists the ECLIs of one authority modified on or after `since`
    ///
    /// The result is de-duplicated and keeps the order in which the
    /// identifiers were first seen. A failure on any page fails the call.
    async fn list_changed_identifiers(&self, creator: &str, since: NaiveDate)
        -> Result<Vec<String>>;
}

/// One page of the Atom feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    /// Number of `entry` elements, with or without an id
    pub entry_count: usize,

    /// Ids of the entries, in feed order
    pub identifiers: Vec<String>,
}

impl FeedPage {
    /// Entries that carried no usable id
    pub fn missing_ids(&self) -> usize {
        self.entry_count - self.identifiers.len()
    }
}

/// Parses a search response
///
/// # Arguments
///
/// * `xml` - The Atom feed returned by the search endpoint
///
/// # Returns
///
/// * `Ok(FeedPage)` - The entries of this page
/// * `Err(String)` - The body is not an Atom feed
pub fn parse_feed_entries(xml: &str) -> std::result::Result<FeedPage, String> {
    let document = Document::parse(xml).map_err(|e| e.to_string())?;
    let feed = document.root_element();

    if feed.tag_name().name() != "feed" || feed.tag_name().namespace() != Some(ATOM_NS) {
        return Err(format!(
            "expected an Atom feed, found <{}>",
            feed.tag_name().name()
        ));
    }

    let mut page = FeedPage::default();
    for entry in feed.children().filter(|n| is_atom(n, "entry")) {
        page.entry_count += 1;

        let id = entry
            .children()
            .find(|n| is_atom(n, "id"))
            .and_then(|n| n.text())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if let Some(id) = id {
            page.identifiers.push(id.to_string());
        }
    }

    Ok(page)
}

fn is_atom(node: &roxmltree::Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(ATOM_NS)
}

/// Pages through the search endpoint of the Open Data API
pub struct ChangeFeedPager {
    client: Client,
    base_url: String,
    page_size: u32,
    throttle: Option<Arc<RequestThrottle>>,
}

impl ChangeFeedPager {
    /// Creates a pager
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `base_url` - API base URL, e.g. `https://data.rechtspraak.nl`
    /// * `page_size` - Entries requested per page (at least 1)
    pub fn new(client: Client, base_url: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
            throttle: None,
        }
    }

    /// Routes every page request through a shared throttle
    pub fn with_throttle(mut self, throttle: Arc<RequestThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Builds the search URL for one page
    pub fn page_url(&self, creator: &str, since: NaiveDate, offset: u64) -> Result<Url> {
        let url = Url::parse_with_params(
            &format!("{}{}", self.base_url, SEARCH_PATH),
            &[
                ("creator", creator.to_string()),
                ("modified", since.format("%Y-%m-%d").to_string()),
                ("from", offset.to_string()),
                ("max", self.page_size.to_string()),
            ],
        )?;
        Ok(url)
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        let _permit = match &self.throttle {
            Some(throttle) => Some(throttle.acquire().await?),
            None => None,
        };
        get_text(&self.client, url).await
    }
}

#[async_trait]
impl ChangeFeed for ChangeFeedPager {
    async fn list_changed_identifiers(
        &self,
        creator: &str,
        since: NaiveDate,
    ) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut identifiers = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let url = self.page_url(creator, since, offset)?;
            tracing::debug!("Requesting feed page {}", url);

            let body = self.fetch_page(&url).await?;
            let page = parse_feed_entries(&body).map_err(|message| CrawlError::InvalidFeed {
                url: url.to_string(),
                message,
            })?;

            if page.missing_ids() > 0 {
                tracing::warn!(
                    "{} feed entries without id at offset {} for {}",
                    page.missing_ids(),
                    offset,
                    creator
                );
            }

            let entry_count = page.entry_count;
            for id in page.identifiers {
                if seen.insert(id.clone()) {
                    identifiers.push(id);
                }
            }

            if entry_count < self.page_size as usize {
                break;
            }
            offset += u64::from(self.page_size);
        }

        tracing::debug!(
            "Discovered {} identifiers for {} since {}",
            identifiers.len(),
            creator,
            since
        );
        Ok(identifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(entries: &[&str]) -> String {
        let entries: String = entries
            .iter()
            .map(|id| format!("<entry><id>{}</id><title>{}</title></entry>", id, id))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><feed xmlns="http://www.w3.org/2005/Atom"><title>Zoekresultaten</title>{}</feed>"#,
            entries
        )
    }

    #[test]
    fn test_parse_feed_entries() {
        let page = parse_feed_entries(&feed(&["ECLI:NL:HR:2024:1", "ECLI:NL:HR:2024:2"])).unwrap();
        assert_eq!(page.entry_count, 2);
        assert_eq!(page.identifiers, vec!["ECLI:NL:HR:2024:1", "ECLI:NL:HR:2024:2"]);
        assert_eq!(page.missing_ids(), 0);
    }

    #[test]
    fn test_parse_empty_feed() {
        let page = parse_feed_entries(&feed(&[])).unwrap();
        assert_eq!(page, FeedPage::default());
    }

    #[test]
    fn test_entry_without_id_is_counted() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><title>x</title></entry><entry><id> ECLI:NL:HR:2024:3 </id></entry></feed>"#;
        let page = parse_feed_entries(xml).unwrap();
        assert_eq!(page.entry_count, 2);
        assert_eq!(page.identifiers, vec!["ECLI:NL:HR:2024:3"]);
        assert_eq!(page.missing_ids(), 1);
    }

    #[test]
    fn test_not_a_feed() {
        assert!(parse_feed_entries("<html><body>Onderhoud</body></html>").is_err());
        assert!(parse_feed_entries("not xml").is_err());
    }

    #[test]
    fn test_page_url() {
        let pager = ChangeFeedPager::new(Client::new(), "https://data.rechtspraak.nl/", 1000);
        let url = pager
            .page_url(
                "http://standaarden.overheid.nl/owms/terms/Hoge_Raad_der_Nederlanden",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                2000,
            )
            .unwrap();

        assert_eq!(url.path(), "/uitspraken/zoeken");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("modified".to_string(), "2024-01-01".to_string())));
        assert!(pairs.contains(&("from".to_string(), "2000".to_string())));
        assert!(pairs.contains(&("max".to_string(), "1000".to_string())));
    }
}
