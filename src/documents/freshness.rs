//! Decides, at the start of a cycle, which document types must be fetched.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::documents::types::DocTypeCode;
use crate::persistence::{DocumentStore, DocumentStoreExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    /// Nothing stale and the cache is populated: no source call.
    UpToDate,
    /// Fetch exactly these types.
    Fetch(BTreeSet<DocTypeCode>),
    /// Nothing stale but nothing cached either: fetch the full default set.
    ColdStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    /// Order the staleness check walked.
    pub order: Vec<DocTypeCode>,
    /// True when the stored order was empty or unusable and the default was used.
    pub used_default_order: bool,
    /// Types skipped without a lookup (unsupported here).
    pub irrelevant: Vec<DocTypeCode>,
    pub action: PlanAction,
}

impl CyclePlan {
    pub fn stale_set(&self) -> BTreeSet<DocTypeCode> {
        match &self.action {
            PlanAction::Fetch(types) => types.clone(),
            PlanAction::ColdStart => DocTypeCode::DEFAULT_ORDER.into_iter().collect(),
            PlanAction::UpToDate => BTreeSet::new(),
        }
    }
}

/// Parses the stored order, dropping unknown codes and duplicates.
///
/// Returns the default order (and `true`) when nothing usable is left.
pub fn effective_order(raw: &[String]) -> (Vec<DocTypeCode>, bool) {
    let mut seen = BTreeSet::new();
    let order: Vec<DocTypeCode> = raw
        .iter()
        .filter_map(|code| DocTypeCode::parse(code))
        .filter(|t| seen.insert(*t))
        .collect();

    if order.is_empty() {
        (DocTypeCode::DEFAULT_ORDER.to_vec(), true)
    } else {
        (order, false)
    }
}

pub fn has_any_tracked(store: &dyn DocumentStore) -> bool {
    DocTypeCode::TRACKED
        .iter()
        .any(|t| store.document(*t).is_some())
}

pub fn plan_cycle(raw_order: &[String], store: &dyn DocumentStore, now: DateTime<Utc>) -> CyclePlan {
    let (order, used_default_order) = effective_order(raw_order);

    let mut stale = BTreeSet::new();
    let mut irrelevant = Vec::new();

    for doc_type in &order {
        if !doc_type.is_supported() {
            irrelevant.push(*doc_type);
            continue;
        }

        match store.document(*doc_type) {
            Some(record) => {
                log::trace!(
                    "[LOADER] {} expires {} (status {:?}){}",
                    doc_type,
                    record.expiration_date,
                    record.status,
                    if record.is_stale(now) { ", needs update" } else { "" }
                );
                if record.is_stale(now) {
                    stale.insert(*doc_type);
                }
            }
            None => {
                log::trace!("[LOADER] {} not cached", doc_type);
                stale.insert(*doc_type);
            }
        }
    }

    let action = if !stale.is_empty() {
        PlanAction::Fetch(stale)
    } else if has_any_tracked(store) {
        PlanAction::UpToDate
    } else {
        PlanAction::ColdStart
    };

    CyclePlan {
        order,
        used_default_order,
        irrelevant,
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::types::{DocumentEntry, DocumentRecord, DocumentStatus, LocalizationOverride};
    use crate::persistence::MemoryStore;
    use chrono::Duration;

    fn record(doc_type: DocTypeCode, status: DocumentStatus, expires_in: Duration) -> DocumentRecord {
        DocumentRecord {
            doc_type,
            data: vec![DocumentEntry {
                doc_number: "N-1".into(),
                doc_data: Default::default(),
            }],
            status,
            expiration_date: Utc::now() + expires_in,
            localization_override: LocalizationOverride::default(),
        }
    }

    #[test]
    fn unknown_only_order_falls_back_to_default() {
        let (order, fallback) = effective_order(&["residence-permit".to_string()]);
        assert!(fallback);
        assert_eq!(order, DocTypeCode::DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn absent_expired_and_processing_are_stale() {
        let store = MemoryStore::new();
        store.save_document(&record(DocTypeCode::IdCard, DocumentStatus::Ok, Duration::hours(1))).unwrap();
        store.save_document(&record(DocTypeCode::Passport, DocumentStatus::Ok, Duration::hours(-1))).unwrap();
        store
            .save_document(&record(DocTypeCode::DriverLicense, DocumentStatus::Processing, Duration::hours(5)))
            .unwrap();

        let order: Vec<String> = ["driver-license", "id-card", "birth-certificate", "passport"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let plan = plan_cycle(&order, &store, Utc::now());

        let expected: BTreeSet<_> = [
            DocTypeCode::DriverLicense,
            DocTypeCode::BirthCertificate,
            DocTypeCode::Passport,
        ]
        .into_iter()
        .collect();
        assert_eq!(plan.action, PlanAction::Fetch(expected));
    }

    #[test]
    fn taxpayer_card_is_never_fetched() {
        let store = MemoryStore::new();
        let plan = plan_cycle(&["taxpayer-card".to_string()], &store, Utc::now());

        assert_eq!(plan.irrelevant, vec![DocTypeCode::TaxpayerCard]);
        assert_eq!(plan.action, PlanAction::ColdStart);
    }

    #[test]
    fn fresh_cache_is_up_to_date() {
        let store = MemoryStore::new();
        for t in DocTypeCode::DEFAULT_ORDER {
            store.save_document(&record(t, DocumentStatus::Ok, Duration::hours(1))).unwrap();
        }
        let plan = plan_cycle(&[], &store, Utc::now());
        assert!(plan.used_default_order);
        assert_eq!(plan.action, PlanAction::UpToDate);
    }
}
