//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the components together:
//! - Discovering changed identifiers per authority of a category
//! - Skipping decisions that are already stored
//! - Fetching, parsing, resolving and storing each remaining decision
//! - Isolating per-item failures and recording them
//! - Persisting the run record and building the final report

use crate::config::Config;
use crate::crawler::feed::{ChangeFeed, ChangeFeedPager};
use crate::crawler::fetcher::{build_http_client, DocumentFetcher, HttpDocumentFetcher};
use crate::crawler::parser::parse_document;
use crate::crawler::resolver::VocabularyResolver;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::throttle::RequestThrottle;
use crate::model::ItemOutcome;
use crate::storage::{
    open_storage, RecordStore, RunStatus, SqliteStorage, StorageError, StorageResult,
    VocabularyStore,
};
use crate::{CrawlError, FailureKind, Result};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Per-run behaviour of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Re-fetch and overwrite decisions that are already stored
    pub refresh_existing: bool,

    /// Maximum number of items of one authority processed at once
    pub max_concurrent: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            refresh_existing: false,
            max_concurrent: 1,
        }
    }
}

/// A discovered identifier that could not be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub ecli: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// An authority whose change feed could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    pub authority: String,
    pub reason: String,
}

/// Summary of a crawl run or an import
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// ID of the persisted run record, if any
    pub run_id: Option<i64>,

    /// Distinct identifiers discovered (or files offered to an import)
    pub discovered: usize,

    pub created: usize,
    pub updated: usize,

    /// Identifiers that were already stored and not fetched
    pub skipped: usize,

    pub failures: Vec<ItemFailure>,

    /// ECLIs stored under the placeholder authority
    pub authority_fallbacks: Vec<String>,

    pub discovery_failures: Vec<DiscoveryFailure>,

    /// Total number of parser warnings over all stored items
    pub parse_warnings: usize,
}

impl CrawlReport {
    /// Decisions written to the store, new or updated
    pub fn stored(&self) -> usize {
        self.created + self.updated
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True if every authority could be discovered
    ///
    /// Individual item failures do not make a run unsuccessful.
    pub fn is_success(&self) -> bool {
        self.discovery_failures.is_empty()
    }

    fn record_failure(&mut self, ecli: &str, error: &CrawlError) {
        self.failures.push(ItemFailure {
            ecli: ecli.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        });
    }

    fn count(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Created => self.created += 1,
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            // Listed with their reason in `failures`
            ItemOutcome::Failed => {}
        }
    }

    fn record_ingest(&mut self, ingested: &Ingested) {
        if ingested.authority_fallback {
            self.authority_fallbacks.push(ingested.ecli.clone());
        }
        self.parse_warnings += ingested.warnings;
    }
}

/// Result of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub ecli: String,
    pub created: bool,
    pub authority_fallback: bool,
    pub warnings: usize,
}

impl Ingested {
    pub fn outcome(&self) -> ItemOutcome {
        if self.created {
            ItemOutcome::Created
        } else {
            ItemOutcome::Updated
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<S> {
    storage: Arc<Mutex<S>>,
    feed: Arc<dyn ChangeFeed>,
    fetcher: Arc<dyn DocumentFetcher>,
    throttle: Arc<RequestThrottle>,
    retry: RetryPolicy,
    settings: CrawlSettings,
    config_hash: String,
}

impl Coordinator<SqliteStorage> {
    /// Creates a coordinator backed by the configured database and the live API
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration, stored with every run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - Failed to open storage or build the HTTP client
    pub fn from_config(config: &Config, config_hash: &str) -> Result<Self> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let client = build_http_client(&config.user_agent, &config.api)?;

        let max_concurrent = config.crawler.max_concurrent_requests as usize;
        let throttle = Arc::new(RequestThrottle::new(
            max_concurrent,
            Duration::from_millis(config.crawler.delay_ms),
        ));

        let feed = ChangeFeedPager::new(client.clone(), &config.api.base_url, config.api.page_size)
            .with_throttle(Arc::clone(&throttle));
        let fetcher = HttpDocumentFetcher::new(client, &config.api.base_url);

        Ok(Self::new(
            Arc::new(Mutex::new(storage)),
            Arc::new(feed),
            Arc::new(fetcher),
        )
        .with_throttle(throttle)
        .with_retry(RetryPolicy::from_config(&config.crawler))
        .with_settings(CrawlSettings {
            refresh_existing: config.crawler.refresh_existing,
            max_concurrent,
        })
        .with_config_hash(config_hash))
    }
}

impl<S: RecordStore + VocabularyStore> Coordinator<S> {
    /// Creates a coordinator from its collaborators
    ///
    /// Without further configuration requests are not throttled, nothing is
    /// retried and items are processed one at a time.
    pub fn new(
        storage: Arc<Mutex<S>>,
        feed: Arc<dyn ChangeFeed>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self {
            storage,
            feed,
            fetcher,
            throttle: Arc::new(RequestThrottle::new(1, Duration::ZERO)),
            retry: RetryPolicy::none(),
            settings: CrawlSettings::default(),
            config_hash: String::new(),
        }
    }

    pub fn with_throttle(mut self, throttle: Arc<RequestThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_settings(mut self, settings: CrawlSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_config_hash(mut self, config_hash: &str) -> Self {
        self.config_hash = config_hash.to_string();
        self
    }

    /// Shared handle to the store
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    /// Runs a closure against the locked store
    ///
    /// The guard is dropped before this returns, so it is never held across
    /// an await point.
    fn with_store<T>(&self, f: impl FnOnce(&mut S) -> StorageResult<T>) -> Result<T> {
        let mut store = self.storage.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(f(&mut store)?)
    }

    /// Loads a snapshot of the vocabularies
    pub fn load_resolver(&self) -> Result<VocabularyResolver> {
        self.with_store(|store| VocabularyResolver::load(store))
    }

    /// Crawls every authority of a category for decisions changed since a date
    ///
    /// # Flow
    ///
    /// 1. Look up the authorities of the category and load the vocabularies
    /// 2. Create a run record
    /// 3. For each authority:
    ///    a. Discover changed identifiers (retried on network errors)
    ///    b. Drop identifiers already seen in this run
    ///    c. Skip stored decisions, or fetch, parse, resolve and store them
    /// 4. Store the run counters and return the report
    ///
    /// A failed item is recorded and the crawl continues. A failed discovery
    /// is recorded and the next authority is crawled.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The run finished, possibly with failures
    /// * `Err(CrawlError::UnknownCategory)` - The category has no authorities
    /// * `Err(CrawlError)` - The store could not be read or written
    pub async fn run(&self, category: &str, since: NaiveDate) -> Result<CrawlReport> {
        let authorities = self.with_store(|store| store.authorities_by_category(category))?;
        if authorities.is_empty() {
            return Err(CrawlError::UnknownCategory(category.to_string()));
        }

        let resolver = self.load_resolver()?;
        let run_id =
            self.with_store(|store| store.create_run(category, since, &self.config_hash))?;

        tracing::info!(
            "Starting run {} for {} ({} authorities) since {}",
            run_id,
            category,
            authorities.len(),
            since
        );

        let mut report = CrawlReport {
            run_id: Some(run_id),
            ..CrawlReport::default()
        };
        let mut seen = HashSet::new();

        for authority in &authorities {
            let discovered = self
                .retry
                .run(&format!("Discovery for {}", authority.name), || {
                    self.feed
                        .list_changed_identifiers(&authority.identifier, since)
                })
                .await;

            let identifiers = match discovered {
                Ok(identifiers) => identifiers,
                Err(e) => {
                    tracing::error!("Discovery failed for {}: {}", authority.name, e);
                    report.discovery_failures.push(DiscoveryFailure {
                        authority: authority.name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let fresh: Vec<String> = identifiers
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect();
            report.discovered += fresh.len();

            tracing::info!(
                "{}: {} decisions to process",
                authority.name,
                fresh.len()
            );

            let resolver = &resolver;
            let results: Vec<(String, Result<Option<Ingested>>)> = stream::iter(fresh)
                .map(|ecli| async move {
                    let result = self.process_item(&ecli, resolver).await;
                    (ecli, result)
                })
                .buffer_unordered(self.settings.max_concurrent.max(1))
                .collect()
                .await;

            for (ecli, result) in results {
                let outcome = match result {
                    Ok(None) => ItemOutcome::Skipped,
                    Ok(Some(ingested)) => {
                        report.record_ingest(&ingested);
                        ingested.outcome()
                    }
                    Err(e) => {
                        tracing::warn!("{}: {}", ecli, e);
                        report.record_failure(&ecli, &e);
                        let recorded = self.with_store(|store| {
                            store.record_failure(run_id, &ecli, e.kind(), &e.to_string())
                        });
                        if let Err(record_error) = recorded {
                            tracing::error!("Could not record failure of {}: {}", ecli, record_error);
                        }
                        ItemOutcome::Failed
                    }
                };
                report.count(outcome);
            }
        }

        self.finish_run(run_id, &report)?;

        tracing::info!(
            "Run {} finished: {} discovered, {} stored, {} skipped, {} failed",
            run_id,
            report.discovered,
            report.stored(),
            report.skipped,
            report.failed()
        );

        Ok(report)
    }

    /// Processes a single discovered identifier
    ///
    /// Returns `None` if the decision is already stored and was not fetched.
    async fn process_item(
        &self,
        ecli: &str,
        resolver: &VocabularyResolver,
    ) -> Result<Option<Ingested>> {
        if !self.settings.refresh_existing && self.with_store(|store| store.exists(ecli))? {
            tracing::debug!("{} already stored, skipping", ecli);
            return Ok(None);
        }

        let raw = self
            .retry
            .run(&format!("Fetch of {}", ecli), || self.fetch_throttled(ecli))
            .await?;

        let ingested = self.ingest_document(&raw, resolver)?;
        if ingested.ecli != ecli {
            tracing::warn!(
                "Requested {} but the document identifies itself as {}",
                ecli,
                ingested.ecli
            );
        }

        Ok(Some(ingested))
    }

    async fn fetch_throttled(&self, ecli: &str) -> Result<String> {
        let _permit = self.throttle.acquire().await?;
        self.fetcher.fetch(ecli).await
    }

    /// Parses, resolves and stores one raw document
    ///
    /// This is the path shared by crawling and the file import.
    ///
    /// # Arguments
    ///
    /// * `raw` - The XML document
    /// * `resolver` - Vocabulary snapshot used to resolve references
    ///
    /// # Returns
    ///
    /// * `Ok(Ingested)` - The decision was created or updated
    /// * `Err(CrawlError)` - Malformed document, unknown reference or storage failure
    pub fn ingest_document(&self, raw: &str, resolver: &VocabularyResolver) -> Result<Ingested> {
        let parsed = parse_document(raw)?;
        for warning in &parsed.warnings {
            tracing::warn!("{}: {}", parsed.ecli(), warning);
        }

        let references = resolver.resolve_references(&parsed)?;

        let outcome = self.with_store(|store| {
            store.upsert_decision(
                &parsed.fields,
                &references.authority,
                &references.subject_areas,
                &references.procedure_kinds,
            )
        })?;

        tracing::debug!(
            "{} {}",
            if outcome.created { "Created" } else { "Updated" },
            outcome.decision
        );

        Ok(Ingested {
            ecli: outcome.decision.ecli,
            created: outcome.created,
            authority_fallback: references.authority_fallback,
            warnings: parsed.warnings.len(),
        })
    }

    /// Imports decision documents from files
    ///
    /// Every file is ingested regardless of whether the decision exists. A
    /// file that cannot be read or ingested is reported as a failure under
    /// its path.
    pub fn import_files(&self, paths: &[PathBuf]) -> Result<CrawlReport> {
        let resolver = self.load_resolver()?;
        let mut report = CrawlReport {
            discovered: paths.len(),
            ..CrawlReport::default()
        };

        for path in paths {
            let key = path.display().to_string();
            let result = std::fs::read_to_string(path)
                .map_err(CrawlError::from)
                .and_then(|raw| self.ingest_document(&raw, &resolver));

            match result {
                Ok(ingested) => {
                    tracing::info!("Imported {} from {}", ingested.ecli, key);
                    report.record_ingest(&ingested);
                    report.count(ingested.outcome());
                }
                Err(e) => {
                    tracing::warn!("{}: {}", key, e);
                    report.record_failure(&key, &e);
                    report.count(ItemOutcome::Failed);
                }
            }
        }

        Ok(report)
    }

    fn finish_run(&self, run_id: i64, report: &CrawlReport) -> Result<()> {
        self.with_store(|store| {
            let mut run = store.get_run(run_id)?;
            run.status = if report.is_success() {
                RunStatus::Completed
            } else {
                RunStatus::Partial
            };
            run.discovered = report.discovered as u64;
            run.stored = report.stored() as u64;
            run.skipped = report.skipped as u64;
            run.failed = report.failed() as u64;
            run.authority_fallbacks = report.authority_fallbacks.len() as u64;
            store.finish_run(&run)
        })
    }
}
