//! Vocabulary reference resolution
//!
//! Documents refer to their authority by name and to subject areas and
//! procedure kinds by vocabulary identifier. The resolver maps those keys to
//! stored vocabulary entries. It never creates entries: the vocabularies are
//! seeded by separate import jobs.

use crate::crawler::parser::ParsedDecision;
use crate::model::{Authority, ProcedureKind, SubjectArea, Vocabulary};
use crate::storage::{StorageResult, VocabularyStore};
use crate::{CrawlError, Result};
use std::collections::HashMap;

/// Outcome of an authority lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityResolution {
    /// The name matched a known authority
    Resolved(Authority),

    /// The name is unknown; the placeholder authority is used instead
    Fallback(Authority),
}

impl AuthorityResolution {
    pub fn authority(&self) -> &Authority {
        match self {
            Self::Resolved(a) | Self::Fallback(a) => a,
        }
    }

    pub fn into_authority(self) -> Authority {
        match self {
            Self::Resolved(a) | Self::Fallback(a) => a,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// All references of one document, resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReferences {
    pub authority: Authority,
    pub subject_areas: Vec<SubjectArea>,
    pub procedure_kinds: Vec<ProcedureKind>,
    /// True if the authority name was unknown and the placeholder was used
    pub authority_fallback: bool,
}

/// In-memory snapshot of the three vocabularies
///
/// Loaded once per crawl run; the vocabularies do not change while a run is
/// in progress.
#[derive(Debug, Clone)]
pub struct VocabularyResolver {
    authorities: HashMap<String, Authority>,
    subject_areas: HashMap<String, SubjectArea>,
    procedure_kinds: HashMap<String, ProcedureKind>,
    sentinel: Authority,
}

impl VocabularyResolver {
    /// Loads the vocabularies from a store
    ///
    /// # Arguments
    ///
    /// * `store` - The vocabulary store
    ///
    /// # Returns
    ///
    /// * `Ok(VocabularyResolver)` - Snapshot of all vocabularies
    /// * `Err(StorageError)` - Query failed or the placeholder authority is missing
    pub fn load<S: VocabularyStore + ?Sized>(store: &S) -> StorageResult<Self> {
        let sentinel = store.sentinel_authority()?;

        let authorities = store
            .all_authorities()?
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();
        let subject_areas = store
            .all_subject_areas()?
            .into_iter()
            .map(|s| (s.identifier.clone(), s))
            .collect();
        let procedure_kinds = store
            .all_procedure_kinds()?
            .into_iter()
            .map(|p| (p.identifier.clone(), p))
            .collect();

        Ok(Self {
            authorities,
            subject_areas,
            procedure_kinds,
            sentinel,
        })
    }

    /// Looks up an authority by exact name
    pub fn resolve_authority(&self, name: &str) -> AuthorityResolution {
        match self.authorities.get(name) {
            Some(authority) => AuthorityResolution::Resolved(authority.clone()),
            None => AuthorityResolution::Fallback(self.sentinel.clone()),
        }
    }

    /// Looks up a subject area by vocabulary identifier
    pub fn resolve_subject_area(&self, identifier: &str) -> Result<SubjectArea> {
        self.subject_areas
            .get(identifier)
            .cloned()
            .ok_or_else(|| CrawlError::NotFound {
                vocabulary: Vocabulary::SubjectArea,
                key: identifier.to_string(),
            })
    }

    /// Looks up a procedure kind by vocabulary identifier
    pub fn resolve_procedure_kind(&self, identifier: &str) -> Result<ProcedureKind> {
        self.procedure_kinds
            .get(identifier)
            .cloned()
            .ok_or_else(|| CrawlError::NotFound {
                vocabulary: Vocabulary::ProcedureKind,
                key: identifier.to_string(),
            })
    }

    /// Resolves every reference of a parsed document
    ///
    /// An unknown authority falls back to the placeholder and is logged. An
    /// unknown subject area or procedure kind fails the whole document.
    pub fn resolve_references(&self, parsed: &ParsedDecision) -> Result<ResolvedReferences> {
        let authority = self.resolve_authority(&parsed.authority_name);
        let authority_fallback = authority.is_fallback();
        if authority_fallback {
            tracing::warn!(
                "{}: unknown authority '{}', stored under {}",
                parsed.ecli(),
                parsed.authority_name,
                self.sentinel
            );
        }

        let subject_areas = parsed
            .subject_refs
            .iter()
            .map(|id| self.resolve_subject_area(id))
            .collect::<Result<Vec<_>>>()?;

        let procedure_kinds = parsed
            .procedure_refs
            .iter()
            .map(|id| self.resolve_procedure_kind(id))
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedReferences {
            authority: authority.into_authority(),
            subject_areas,
            procedure_kinds,
            authority_fallback,
        })
    }

    pub fn sentinel(&self) -> &Authority {
        &self.sentinel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecisionFields, DecisionKind, NewAuthority};
    use crate::storage::SqliteStorage;
    use chrono::NaiveDate;

    const CIVIL: &str = "http://psi.rechtspraak.nl/rechtsgebied#civielRecht";
    const APPEAL: &str = "http://psi.rechtspraak.nl/procedure#hogerBeroep";

    fn seeded_store() -> SqliteStorage {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_authority(&NewAuthority {
                name: "Gerechtshof Amsterdam".to_string(),
                category: "Gerechtshof".to_string(),
                identifier: "http://standaarden.overheid.nl/owms/terms/Gerechtshof_Amsterdam"
                    .to_string(),
                abbreviation: "GHAMS".to_string(),
                begin_date: NaiveDate::from_ymd_opt(2013, 1, 1).unwrap(),
                end_date: None,
            })
            .unwrap();
        storage.upsert_subject_area("Civiel recht", CIVIL).unwrap();
        storage.upsert_procedure_kind("Hoger beroep", APPEAL).unwrap();
        storage
    }

    fn parsed(authority: &str, subjects: &[&str], procedures: &[&str]) -> ParsedDecision {
        ParsedDecision {
            fields: DecisionFields {
                ecli: "ECLI:NL:GHAMS:2024:10".to_string(),
                case_number: "200.1".to_string(),
                decision_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                publication_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                raw_document: String::new(),
                summary: String::new(),
                body: String::new(),
                kind: DecisionKind::Decision,
            },
            authority_name: authority.to_string(),
            subject_refs: subjects.iter().map(|s| s.to_string()).collect(),
            procedure_refs: procedures.iter().map(|s| s.to_string()).collect(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_known_authority() {
        let resolver = VocabularyResolver::load(&seeded_store()).unwrap();
        let resolution = resolver.resolve_authority("Gerechtshof Amsterdam");
        assert!(!resolution.is_fallback());
        assert_eq!(resolution.authority().abbreviation, "GHAMS");
    }

    #[test]
    fn test_unknown_authority_falls_back() {
        let resolver = VocabularyResolver::load(&seeded_store()).unwrap();
        let resolution = resolver.resolve_authority("Rechtbank Atlantis");
        assert!(resolution.is_fallback());
        assert!(resolution.authority().is_sentinel());
    }

    #[test]
    fn test_unknown_subject_area_is_not_found() {
        let resolver = VocabularyResolver::load(&seeded_store()).unwrap();
        match resolver.resolve_subject_area("http://psi.rechtspraak.nl/rechtsgebied#onbekend") {
            Err(CrawlError::NotFound { vocabulary, .. }) => {
                assert_eq!(vocabulary, Vocabulary::SubjectArea)
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_references() {
        let resolver = VocabularyResolver::load(&seeded_store()).unwrap();

        let refs = resolver
            .resolve_references(&parsed("Gerechtshof Amsterdam", &[CIVIL], &[APPEAL]))
            .unwrap();
        assert!(!refs.authority_fallback);
        assert_eq!(refs.subject_areas.len(), 1);
        assert_eq!(refs.procedure_kinds[0].identifier, APPEAL);

        let refs = resolver
            .resolve_references(&parsed("Onbekend hof", &[], &[]))
            .unwrap();
        assert!(refs.authority_fallback);
        assert!(refs.authority.is_sentinel());
    }

    #[test]
    fn test_unknown_procedure_fails_references() {
        let resolver = VocabularyResolver::load(&seeded_store()).unwrap();
        let result = resolver.resolve_references(&parsed(
            "Gerechtshof Amsterdam",
            &[CIVIL],
            &["http://psi.rechtspraak.nl/procedure#onbekend"],
        ));
        assert!(matches!(result, Err(CrawlError::NotFound { .. })));
    }
}
