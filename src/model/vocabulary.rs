use chrono::NaiveDate;
use std::fmt;

/// Name of the placeholder authority used when a creator cannot be resolved
pub const SENTINEL_AUTHORITY_NAME: &str = "Onbekende instantie";

/// Abbreviation of the placeholder authority
pub const SENTINEL_ABBREVIATION: &str = "XX";

/// The three controlled vocabularies a decision can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocabulary {
    Authority,
    SubjectArea,
    ProcedureKind,
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authority => write!(f, "authority"),
            Self::SubjectArea => write!(f, "subject area"),
            Self::ProcedureKind => write!(f, "procedure kind"),
        }
    }
}

/// A court or other body with decision-issuing power during an interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub id: i64,
    pub name: String,
    /// Authority type, e.g. "Rechtbank" or "Hoge Raad"
    pub category: String,
    /// Vocabulary URL, used as the `creator` filter on the discovery endpoint
    pub identifier: String,
    pub abbreviation: String,
    pub begin_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl Authority {
    /// Returns true if this is the placeholder for unresolvable creators
    pub fn is_sentinel(&self) -> bool {
        self.abbreviation == SENTINEL_ABBREVIATION
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.abbreviation)
    }
}

/// Authority fields supplied by the vocabulary import
#[derive(Debug, Clone)]
pub struct NewAuthority {
    pub name: String,
    pub category: String,
    pub identifier: String,
    pub abbreviation: String,
    pub begin_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// A legal subject area ("rechtsgebied")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectArea {
    pub id: i64,
    pub name: String,
    pub identifier: String,
}

/// A kind of procedure ("proceduresoort")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureKind {
    pub id: i64,
    pub name: String,
    pub identifier: String,
}
