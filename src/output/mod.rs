//! Output module for crawl reports and database statistics
//!
//! This module handles:
//! - Formatting the report of a crawl run or import
//! - Loading and displaying statistics from the decision database
//! - Listing the authority categories that can be crawled

mod report;
pub mod stats;

pub use report::{format_report, print_report};
pub use stats::{format_statistics, load_statistics, print_statistics, DatabaseStatistics};

use crate::storage::VocabularyStore;
use crate::Result;

/// Lists the crawlable categories with their authorities
///
/// # Arguments
///
/// * `storage` - The vocabulary store
///
/// # Returns
///
/// * `Ok(Vec<(String, Vec<String>)>)` - Category names with authority names
/// * `Err(CrawlError)` - Failed to query the store
pub fn list_categories(storage: &dyn VocabularyStore) -> Result<Vec<(String, Vec<String>)>> {
    let mut categories = Vec::new();
    for category in storage.categories()? {
        let authorities = storage
            .authorities_by_category(&category)?
            .into_iter()
            .map(|a| a.name)
            .collect();
        categories.push((category, authorities));
    }
    Ok(categories)
}

/// Prints the categories returned by [`list_categories`]
pub fn print_categories(categories: &[(String, Vec<String>)]) {
    if categories.is_empty() {
        println!("No authorities found. Import the authority vocabulary first.");
        return;
    }

    for (category, authorities) in categories {
        println!("{} ({})", category, authorities.len());
        for name in authorities {
            println!("  - {}", name);
        }
    }
}
