use crate::model::{Authority, ProcedureKind, SubjectArea};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::fmt;

/// Represents the kind of a published decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecisionKind {
    /// A court ruling ("Uitspraak")
    #[default]
    Decision,

    /// An advisory opinion of the Advocate General ("Conclusie")
    Opinion,
}

impl DecisionKind {
    /// Parses the `dcterms:type` value of a document
    ///
    /// Returns None if the value is not one of the two known kinds.
    pub fn from_document_value(s: &str) -> Option<Self> {
        match s.trim() {
            "Uitspraak" => Some(Self::Decision),
            "Conclusie" => Some(Self::Opinion),
            _ => None,
        }
    }

    /// Converts the kind to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Decision => "Uitspraak",
            Self::Opinion => "Conclusie",
        }
    }

    /// Parses a kind from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::from_document_value(s)
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Scalar fields written by an ingest
///
/// Everything here is overwritten on re-ingest. Vocabulary links and the
/// analysis metadata map are handled separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionFields {
    pub ecli: String,
    pub case_number: String,
    pub decision_date: NaiveDate,
    pub publication_date: NaiveDate,
    pub raw_document: String,
    pub summary: String,
    pub body: String,
    pub kind: DecisionKind,
}

/// A decision as stored in the database
#[derive(Debug, Clone)]
pub struct Decision {
    pub id: i64,
    pub ecli: String,
    pub case_number: String,
    pub decision_date: NaiveDate,
    pub publication_date: NaiveDate,
    pub raw_document: String,
    pub summary: String,
    pub body: String,
    pub kind: DecisionKind,
    /// Analysis results keyed by job identifier; never written by ingest
    pub metadata: Map<String, Value>,
    pub authority: Authority,
    pub subject_areas: Vec<SubjectArea>,
    pub procedure_kinds: Vec<ProcedureKind>,
    pub created_at: String,
    pub updated_at: String,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uitspraak {} ({})", self.ecli, self.authority.abbreviation)
    }
}

/// What happened to a single discovered identifier during a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemOutcome {
    /// A new decision was created
    Created,

    /// An existing decision was overwritten (refresh mode)
    Updated,

    /// The decision already exists and was not fetched
    Skipped,

    /// Fetching, parsing, resolving or storing failed
    Failed,
}
