//! Rechtspraak crawler: incremental ingestion of Dutch case law
//!
//! This crate discovers decisions ("uitspraken") that changed on the Open Data
//! Rechtspraak API since a given date, fetches their XML documents, extracts
//! structured fields, resolves vocabulary references and stores the result in
//! SQLite.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Invalid feed from {url}: {message}")]
    InvalidFeed { url: String, message: String },

    #[error("Malformed document {id}: {reason}")]
    MalformedDocument { id: String, reason: String },

    #[error("Unknown {vocabulary} reference: {key}")]
    NotFound {
        vocabulary: model::Vocabulary,
        key: String,
    },

    #[error("Unknown authority category: {0}")]
    UnknownCategory(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request throttle closed")]
    Throttle,
}

/// Coarse classification of a failure, used in crawl reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Network,
    MalformedDocument,
    NotFound,
    Storage,
    Other,
}

impl FailureKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::MalformedDocument => "malformed_document",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
            Self::Other => "other",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "network" => Some(Self::Network),
            "malformed_document" => Some(Self::MalformedDocument),
            "not_found" => Some(Self::NotFound),
            "storage" => Some(Self::Storage),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl CrawlError {
    /// Builds an error from a failed reqwest call, separating timeouts
    pub fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Http {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Returns the failure class of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http { .. }
            | Self::Status { .. }
            | Self::Timeout { .. }
            | Self::InvalidFeed { .. }
            | Self::Reqwest(_) => FailureKind::Network,
            Self::MalformedDocument { .. } => FailureKind::MalformedDocument,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Database(_) | Self::Storage(_) => FailureKind::Storage,
            _ => FailureKind::Other,
        }
    }

    /// Returns true if repeating the same request may succeed
    ///
    /// Timeouts, connection failures, HTTP 5xx and HTTP 429 are retryable.
    /// Malformed documents, unresolved references and storage failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Http { source, .. } | Self::Reqwest(source) => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub use config::Config;
pub use crawler::{Coordinator, CrawlReport};
pub use model::{Authority, Decision, DecisionKind, ProcedureKind, SubjectArea};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_roundtrip() {
        for kind in [
            FailureKind::Network,
            FailureKind::MalformedDocument,
            FailureKind::NotFound,
            FailureKind::Storage,
            FailureKind::Other,
        ] {
            assert_eq!(FailureKind::from_db_string(kind.to_db_string()), Some(kind));
        }
    }

    #[test]
    fn test_status_retryability() {
        let err = |status| CrawlError::Status {
            url: "https://data.rechtspraak.nl/uitspraken/content".to_string(),
            status,
        };
        assert!(err(503).is_retryable());
        assert!(err(500).is_retryable());
        assert!(err(429).is_retryable());
        assert!(!err(404).is_retryable());
        assert!(!err(400).is_retryable());
    }

    #[test]
    fn test_non_network_errors_not_retryable() {
        let malformed = CrawlError::MalformedDocument {
            id: "ECLI:NL:HR:2024:1".to_string(),
            reason: "missing identifier".to_string(),
        };
        assert!(!malformed.is_retryable());
        assert_eq!(malformed.kind(), FailureKind::MalformedDocument);

        let not_found = CrawlError::NotFound {
            vocabulary: model::Vocabulary::SubjectArea,
            key: "http://psi.rechtspraak.nl/rechtsgebied#onbekend".to_string(),
        };
        assert!(!not_found.is_retryable());
        assert_eq!(not_found.kind(), FailureKind::NotFound);

        let timeout = CrawlError::Timeout {
            url: "https://data.rechtspraak.nl".to_string(),
        };
        assert!(timeout.is_retryable());
        assert_eq!(timeout.kind(), FailureKind::Network);
    }
}
