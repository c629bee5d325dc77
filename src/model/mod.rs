//! Domain model for decisions and their controlled vocabularies
//!
//! # Components
//!
//! - `Authority`, `SubjectArea`, `ProcedureKind`: read-only vocabulary entries
//! - `Decision`: a stored decision with its vocabulary links
//! - `DecisionKind`: primary decision or advisory opinion
//! - `ItemOutcome`: what happened to one identifier during a crawl

mod decision;
mod vocabulary;

pub use decision::{Decision, DecisionFields, DecisionKind, ItemOutcome};
pub use vocabulary::{
    Authority, NewAuthority, ProcedureKind, SubjectArea, Vocabulary, SENTINEL_ABBREVIATION,
    SENTINEL_AUTHORITY_NAME,
};

use chrono::NaiveDate;

/// Date used when a document carries no usable date
pub fn minimal_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1000, 1, 1).unwrap_or(NaiveDate::MIN)
}
