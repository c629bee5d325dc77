//! XML parser for decision documents
//!
//! This module turns a raw `open-rechtspraak` document into the fields of a
//! decision:
//! - Metadata from the `rdf:RDF/rdf:Description` blocks
//! - Vocabulary references (subject areas and procedure kinds)
//! - Plain text of the summary and the decision body
//!
//! Missing optional fields fall back to defaults and are reported as
//! warnings. Only a missing ECLI or authority name, or a document that is not
//! well-formed XML, rejects the document.

use crate::model::{minimal_date, DecisionFields, DecisionKind};
use crate::{CrawlError, Result};
use chrono::NaiveDate;
use roxmltree::{Document, Node, ParsingOptions};
use std::fmt;

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
pub const PSI_NS: &str = "http://psi.rechtspraak.nl/";
pub const RS_NS: &str = "http://www.rechtspraak.nl/schema/rechtspraak-1.0";

const UNKNOWN_ID: &str = "<unknown>";

/// A recoverable problem found while parsing a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    MissingDecisionDate,
    InvalidDecisionDate(String),
    MissingPublicationDate,
    InvalidPublicationDate(String),
    MissingCaseNumber,
    MissingKind,
    UnknownKind(String),
    MissingSummary,
    MissingBody,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDecisionDate => write!(f, "no decision date, using 1000-01-01"),
            Self::InvalidDecisionDate(v) => {
                write!(f, "invalid decision date '{}', using 1000-01-01", v)
            }
            Self::MissingPublicationDate => write!(f, "no publication date, using 1000-01-01"),
            Self::InvalidPublicationDate(v) => {
                write!(f, "invalid publication date '{}', using 1000-01-01", v)
            }
            Self::MissingCaseNumber => write!(f, "no case number"),
            Self::MissingKind => write!(f, "no document type, assuming Uitspraak"),
            Self::UnknownKind(v) => write!(f, "unknown document type '{}', assuming Uitspraak", v),
            Self::MissingSummary => write!(f, "no inhoudsindicatie"),
            Self::MissingBody => write!(f, "no uitspraak or conclusie section"),
        }
    }
}

/// A parsed document, before vocabulary resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDecision {
    /// Scalar fields, ready to be stored
    pub fields: DecisionFields,

    /// Name of the issuing authority (`dcterms:creator`)
    pub authority_name: String,

    /// Subject-area identifiers, in document order
    pub subject_refs: Vec<String>,

    /// Procedure-kind identifiers, in document order
    pub procedure_refs: Vec<String>,

    /// Problems that were resolved with a default
    pub warnings: Vec<ParseWarning>,
}

impl ParsedDecision {
    pub fn ecli(&self) -> &str {
        &self.fields.ecli
    }
}

/// Parses a decision document
///
/// # Arguments
///
/// * `raw` - The XML document as returned by the content endpoint
///
/// # Returns
///
/// * `Ok(ParsedDecision)` - Parsed document, possibly with warnings
/// * `Err(CrawlError::MalformedDocument)` - Not well-formed, or no ECLI or authority
///
/// # Example
///
/// ```no_run
/// use rechtspraak_crawler::crawler::parse_document;
///
/// let xml = std::fs::read_to_string("ECLI_NL_HR_2024_1.xml").unwrap();
/// let parsed = parse_document(&xml).unwrap();
/// println!("{} by {}", parsed.fields.ecli, parsed.authority_name);
/// ```
pub fn parse_document(raw: &str) -> Result<ParsedDecision> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document =
        Document::parse_with_options(raw, options).map_err(|e| CrawlError::MalformedDocument {
            id: UNKNOWN_ID.to_string(),
            reason: e.to_string(),
        })?;

    let root = document.root_element();
    let descriptions: Vec<Node> = root
        .children()
        .filter(|n| is(n, RDF_NS, "RDF"))
        .flat_map(|rdf| rdf.children())
        .filter(|n| is(n, RDF_NS, "Description"))
        .collect();

    let ecli = metadata_text(&descriptions, DCTERMS_NS, "identifier").ok_or_else(|| {
        CrawlError::MalformedDocument {
            id: UNKNOWN_ID.to_string(),
            reason: "missing dcterms:identifier".to_string(),
        }
    })?;

    let authority_name = metadata_text(&descriptions, DCTERMS_NS, "creator").ok_or_else(|| {
        CrawlError::MalformedDocument {
            id: ecli.clone(),
            reason: "missing dcterms:creator".to_string(),
        }
    })?;

    let mut warnings = Vec::new();

    let decision_date = match metadata_text(&descriptions, DCTERMS_NS, "date") {
        None => {
            warnings.push(ParseWarning::MissingDecisionDate);
            minimal_date()
        }
        Some(value) => parse_date(&value).unwrap_or_else(|| {
            warnings.push(ParseWarning::InvalidDecisionDate(value));
            minimal_date()
        }),
    };

    let publication_date = match metadata_text(&descriptions, DCTERMS_NS, "issued") {
        None => {
            warnings.push(ParseWarning::MissingPublicationDate);
            minimal_date()
        }
        Some(value) => parse_date(&value).unwrap_or_else(|| {
            warnings.push(ParseWarning::InvalidPublicationDate(value));
            minimal_date()
        }),
    };

    let case_number = metadata_text(&descriptions, PSI_NS, "zaaknummer").unwrap_or_else(|| {
        warnings.push(ParseWarning::MissingCaseNumber);
        String::new()
    });

    let kind = match metadata_text(&descriptions, DCTERMS_NS, "type") {
        None => {
            warnings.push(ParseWarning::MissingKind);
            DecisionKind::default()
        }
        Some(value) => DecisionKind::from_document_value(&value).unwrap_or_else(|| {
            warnings.push(ParseWarning::UnknownKind(value));
            DecisionKind::default()
        }),
    };

    let procedure_refs = resource_identifiers(&descriptions, PSI_NS, "procedure");
    let subject_refs = resource_identifiers(&descriptions, DCTERMS_NS, "subject");

    let summary = match section(root, "inhoudsindicatie") {
        Some(node) => section_text(node),
        None => {
            warnings.push(ParseWarning::MissingSummary);
            String::new()
        }
    };

    let body = match section(root, "uitspraak").or_else(|| section(root, "conclusie")) {
        Some(node) => section_text(node),
        None => {
            warnings.push(ParseWarning::MissingBody);
            String::new()
        }
    };

    Ok(ParsedDecision {
        fields: DecisionFields {
            ecli,
            case_number,
            decision_date,
            publication_date,
            raw_document: raw.to_string(),
            summary,
            body,
            kind,
        },
        authority_name,
        subject_refs,
        procedure_refs,
        warnings,
    })
}

fn is(node: &Node, namespace: &str, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(namespace)
}

/// Trimmed text of the first matching metadata element with content
fn metadata_text(descriptions: &[Node], namespace: &str, name: &str) -> Option<String> {
    descriptions
        .iter()
        .flat_map(|d| d.children())
        .find(|n| is(n, namespace, name))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// All `resourceIdentifier` attributes of the matching metadata elements
fn resource_identifiers(descriptions: &[Node], namespace: &str, name: &str) -> Vec<String> {
    descriptions
        .iter()
        .flat_map(|d| d.children())
        .filter(|n| is(n, namespace, name))
        .filter_map(|n| n.attribute("resourceIdentifier"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn section<'a, 'input>(root: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    root.children().find(|n| is(n, RS_NS, name))
}

/// Concatenates the leading text of every element in the subtree
///
/// Each fragment is followed by a newline. Whitespace-only fragments, such as
/// the indentation between child elements, are dropped; the Rechtspraak
/// reference tooling keeps them, so bodies stored by it can contain extra
/// blank lines that this crawler does not produce.
fn section_text(node: Node) -> String {
    let mut text = String::new();
    for element in node.descendants().filter(|n| n.is_element()) {
        if let Some(fragment) = element.text() {
            if !fragment.trim().is_empty() {
                text.push_str(fragment);
                text.push('\n');
            }
        }
    }
    text
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
