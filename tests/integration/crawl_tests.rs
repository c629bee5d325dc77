//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the Open Data API and test
//! discovery, fetching and storage end-to-end against a SQLite file.

use chrono::NaiveDate;
use rechtspraak_crawler::config::{ApiConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use rechtspraak_crawler::crawler::{ChangeFeed, ChangeFeedPager, Coordinator};
use rechtspraak_crawler::model::{DecisionFields, DecisionKind, NewAuthority};
use rechtspraak_crawler::storage::{RecordStore, RunStatus, SqliteStorage, VocabularyStore};
use rechtspraak_crawler::FailureKind;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREATOR: &str = "urn:x";
const CIVIL: &str = "http://psi.rechtspraak.nl/rechtsgebied#civielRecht";

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &Path, page_size: u32) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            page_size,
            timeout_secs: 5,
        },
        crawler: CrawlerConfig {
            delay_ms: 0, // No spacing needed against the mock server
            max_concurrent_requests: 1,
            max_retries: 2,
            retry_backoff_ms: 1,
            refresh_existing: false,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.display().to_string(),
        },
    }
}

/// Seeds the test authority and one subject area
fn seed_vocabularies(db_path: &Path) -> SqliteStorage {
    let mut storage = SqliteStorage::new(db_path).expect("Failed to open DB");
    storage
        .upsert_authority(&NewAuthority {
            name: "Testrechtbank".to_string(),
            category: "Test".to_string(),
            identifier: CREATOR.to_string(),
            abbreviation: "RBTEST".to_string(),
            begin_date: NaiveDate::from_ymd_opt(2013, 1, 1).unwrap(),
            end_date: None,
        })
        .unwrap();
    storage.upsert_subject_area("Civiel recht", CIVIL).unwrap();
    storage
}

fn since() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn feed(ids: &[String]) -> String {
    let entries: String = ids
        .iter()
        .map(|id| format!("<entry><id>{}</id><title>{}</title></entry>", id, id))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><feed xmlns="http://www.w3.org/2005/Atom"><subtitle>Aantal gevonden ECLI's: {}</subtitle>{}</feed>"#,
        ids.len(),
        entries
    )
}

fn ids(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("ECLI:NL:{}:2024:{}", prefix, i)).collect()
}

/// A decision document; `case_number` None leaves out `psi:zaaknummer`
fn decision_xml(ecli: &str, creator: &str, case_number: Option<&str>, body: &str) -> String {
    let case_number = case_number
        .map(|n| format!("<psi:zaaknummer>{}</psi:zaaknummer>", n))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<open-rechtspraak xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:psi="http://psi.rechtspraak.nl/" xmlns="http://www.rechtspraak.nl/schema/rechtspraak-1.0">
  <rdf:RDF>
    <rdf:Description>
      <dcterms:identifier>{ecli}</dcterms:identifier>
      <dcterms:creator>{creator}</dcterms:creator>
      <dcterms:date>2024-01-15</dcterms:date>
      <dcterms:issued>2024-01-20</dcterms:issued>
      {case_number}
      <dcterms:type>Uitspraak</dcterms:type>
      <dcterms:subject resourceIdentifier="{CIVIL}">Civiel recht</dcterms:subject>
    </rdf:Description>
  </rdf:RDF>
  <inhoudsindicatie><para>Samenvatting</para></inhoudsindicatie>
  {body}
</open-rechtspraak>"#
    )
}

async fn mount_feed(server: &MockServer, from: &str, ids: &[String], expected: u64) {
    Mock::given(method("GET"))
        .and(path("/uitspraken/zoeken"))
        .and(query_param("creator", CREATOR))
        .and(query_param("from", from))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed(ids)))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_document(server: &MockServer, ecli: &str, xml: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/uitspraken/content"))
        .and(query_param("id", ecli))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml))
        .expect(expected)
        .mount(server)
        .await;
}

fn pager(server: &MockServer, page_size: u32) -> ChangeFeedPager {
    ChangeFeedPager::new(reqwest::Client::new(), server.uri(), page_size)
}

#[tokio::test]
async fn test_empty_feed_needs_one_request() {
    let server = MockServer::start().await;
    mount_feed(&server, "0", &[], 1).await;

    let found = pager(&server, 2)
        .list_changed_identifiers(CREATOR, since())
        .await
        .expect("Discovery failed");

    assert!(found.is_empty());
}

#[tokio::test]
async fn test_full_page_requests_next_page() {
    let server = MockServer::start().await;
    let all = ids("RBTEST", 2);
    mount_feed(&server, "0", &all, 1).await;
    mount_feed(&server, "2", &[], 1).await;

    let found = pager(&server, 2)
        .list_changed_identifiers(CREATOR, since())
        .await
        .expect("Discovery failed");

    assert_eq!(found, all);
}

#[tokio::test]
async fn test_partial_last_page_ends_pagination() {
    let server = MockServer::start().await;
    let all = ids("RBTEST", 3);
    mount_feed(&server, "0", &all[..2], 1).await;
    mount_feed(&server, "2", &all[2..], 1).await;
    mount_feed(&server, "4", &[], 0).await;

    let found = pager(&server, 2)
        .list_changed_identifiers(CREATOR, since())
        .await
        .expect("Discovery failed");

    assert_eq!(found, all);
}

#[tokio::test]
async fn test_duplicates_across_pages_are_removed() {
    let server = MockServer::start().await;
    let all = ids("RBTEST", 3);
    mount_feed(&server, "0", &[all[0].clone(), all[1].clone()], 1).await;
    mount_feed(&server, "2", &[all[1].clone(), all[2].clone()], 1).await;
    mount_feed(&server, "4", &[], 1).await;

    let found = pager(&server, 2)
        .list_changed_identifiers(CREATOR, since())
        .await
        .expect("Discovery failed");

    assert_eq!(found, all);
}

#[tokio::test]
async fn test_failed_page_fails_discovery() {
    let server = MockServer::start().await;
    mount_feed(&server, "0", &ids("RBTEST", 2), 1).await;
    Mock::given(method("GET"))
        .and(path("/uitspraken/zoeken"))
        .and(query_param("from", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = pager(&server, 2)
        .list_changed_identifiers(CREATOR, since())
        .await;

    let error = result.expect_err("Discovery should fail");
    assert_eq!(error.kind(), FailureKind::Network);
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_crawl_skips_existing_and_stores_new() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("decisions.db");

    let a = "ECLI:NL:RBTEST:2024:1";
    let b = "ECLI:NL:RBTEST:2024:2";

    // A is already stored
    {
        let mut storage = seed_vocabularies(&db_path);
        let authority = storage.find_authority_by_name("Testrechtbank").unwrap().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        storage
            .upsert_decision(
                &DecisionFields {
                    ecli: a.to_string(),
                    case_number: "C/1".to_string(),
                    decision_date: date,
                    publication_date: date,
                    raw_document: String::new(),
                    summary: String::new(),
                    body: String::new(),
                    kind: DecisionKind::Decision,
                },
                &authority,
                &[],
                &[],
            )
            .unwrap();
    }

    mount_feed(&server, "0", &[a.to_string(), b.to_string()], 1).await;
    mount_document(&server, a, decision_xml(a, "Testrechtbank", Some("C/1"), ""), 0).await;
    mount_document(
        &server,
        b,
        decision_xml(b, "Testrechtbank", Some("C/2"), "<uitspraak><para>Recht</para></uitspraak>"),
        1,
    )
    .await;

    let config = create_test_config(&server.uri(), &db_path, 1000);
    let coordinator = Coordinator::from_config(&config, "test-hash").unwrap();
    let report = coordinator.run("Test", since()).await.expect("Crawl failed");

    assert_eq!(report.discovered, 2);
    assert_eq!(report.stored(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed(), 0);
    assert!(report.is_success());

    let storage = SqliteStorage::new(&db_path).unwrap();
    let stored = storage.get_decision(b).unwrap().expect("B not stored");
    assert_eq!(stored.case_number, "C/2");
    assert_eq!(stored.body, "Recht\n");
    assert_eq!(stored.authority.name, "Testrechtbank");
    assert_eq!(stored.subject_areas.len(), 1);
    assert_eq!(stored.subject_areas[0].identifier, CIVIL);

    let run = storage.get_run(report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!((run.discovered, run.stored, run.skipped, run.failed), (2, 1, 1, 0));
}

#[tokio::test]
async fn test_unknown_authority_uses_placeholder() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("decisions.db");
    drop(seed_vocabularies(&db_path));

    let ecli = "ECLI:NL:RBTEST:2024:7";
    mount_feed(&server, "0", &[ecli.to_string()], 1).await;
    mount_document(
        &server,
        ecli,
        decision_xml(ecli, "Rechtbank die niet bestaat", None, "<conclusie><para>Advies</para></conclusie>"),
        1,
    )
    .await;

    let config = create_test_config(&server.uri(), &db_path, 1000);
    let coordinator = Coordinator::from_config(&config, "test-hash").unwrap();
    let report = coordinator.run("Test", since()).await.expect("Crawl failed");

    assert_eq!(report.created, 1);
    assert_eq!(report.authority_fallbacks, vec![ecli.to_string()]);
    assert_eq!(report.parse_warnings, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let stored = storage.get_decision(ecli).unwrap().unwrap();
    assert!(stored.authority.is_sentinel());
    assert_eq!(stored.case_number, "");
    assert_eq!(stored.body, "Advies\n");

    let run = storage.get_run(report.run_id.unwrap()).unwrap();
    assert_eq!(run.authority_fallbacks, 1);
}

#[tokio::test]
async fn test_transient_document_error_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("decisions.db");
    drop(seed_vocabularies(&db_path));

    let ecli = "ECLI:NL:RBTEST:2024:8";
    mount_feed(&server, "0", &[ecli.to_string()], 1).await;

    // First attempt fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/uitspraken/content"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_document(
        &server,
        ecli,
        decision_xml(ecli, "Testrechtbank", Some("C/8"), "<uitspraak>Ok</uitspraak>"),
        1,
    )
    .await;

    let config = create_test_config(&server.uri(), &db_path, 1000);
    let coordinator = Coordinator::from_config(&config, "test-hash").unwrap();
    let report = coordinator.run("Test", since()).await.expect("Crawl failed");

    assert_eq!(report.created, 1);
    assert_eq!(report.failed(), 0);
}

#[tokio::test]
async fn test_item_failures_are_recorded() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("decisions.db");
    drop(seed_vocabularies(&db_path));

    let good = "ECLI:NL:RBTEST:2024:10";
    let missing = "ECLI:NL:RBTEST:2024:11";
    let unknown_subject = "ECLI:NL:RBTEST:2024:12";

    mount_feed(
        &server,
        "0",
        &[good.to_string(), missing.to_string(), unknown_subject.to_string()],
        1,
    )
    .await;
    mount_document(
        &server,
        good,
        decision_xml(good, "Testrechtbank", Some("C/10"), "<uitspraak>Ok</uitspraak>"),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/uitspraken/content"))
        .and(query_param("id", missing))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_document(
        &server,
        unknown_subject,
        decision_xml(unknown_subject, "Testrechtbank", Some("C/12"), "")
            .replace(CIVIL, "http://psi.rechtspraak.nl/rechtsgebied#onbekend"),
        1,
    )
    .await;

    let config = create_test_config(&server.uri(), &db_path, 1000);
    let coordinator = Coordinator::from_config(&config, "test-hash").unwrap();
    let report = coordinator.run("Test", since()).await.expect("Crawl failed");

    assert_eq!(report.discovered, 3);
    assert_eq!(report.created, 1);
    assert_eq!(report.failed(), 2);
    assert!(report.is_success());

    let storage = SqliteStorage::new(&db_path).unwrap();
    let failures = storage.get_failures(report.run_id.unwrap()).unwrap();
    let mut kinds: Vec<(String, FailureKind)> =
        failures.into_iter().map(|f| (f.ecli, f.kind)).collect();
    kinds.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        kinds,
        vec![
            (missing.to_string(), FailureKind::Network),
            (unknown_subject.to_string(), FailureKind::NotFound),
        ]
    );
    assert!(storage.get_decision(unknown_subject).unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_feed_marks_run_partial() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("decisions.db");
    drop(seed_vocabularies(&db_path));

    // One attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/uitspraken/zoeken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &db_path, 1000);
    let coordinator = Coordinator::from_config(&config, "test-hash").unwrap();
    let report = coordinator.run("Test", since()).await.expect("Crawl failed");

    assert!(!report.is_success());
    assert_eq!(report.discovery_failures.len(), 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, RunStatus::Partial);
}
