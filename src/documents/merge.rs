//! Folds a source response into the store.
//!
//! Locally held localization always wins over what the source sends. Types
//! the response omits are not touched.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::documents::ordering::OrderingService;
use crate::documents::types::{DocTypeCode, DocumentsBundle};
use crate::persistence::{DocumentStore, DocumentStoreExt, StoringKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Settled status: the response replaced the stored record.
    Replaced,
    /// Unsettled status over an existing record: only expiration moved.
    ExpirationUpdated,
    /// Unsettled status, nothing stored before: stored as received.
    Inserted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub outcomes: Vec<(DocTypeCode, MergeOutcome)>,
    pub order_updated: bool,
}

impl MergeReport {
    pub fn outcome(&self, doc_type: DocTypeCode) -> Option<MergeOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| *t == doc_type)
            .map(|(_, o)| *o)
    }
}

pub fn apply_bundle(
    store: &dyn DocumentStore,
    ordering: &dyn OrderingService,
    bundle: DocumentsBundle,
    now: DateTime<Utc>,
) -> MergeReport {
    let mut report = MergeReport::default();

    for (doc_type, incoming) in bundle.records {
        if !doc_type.is_supported() || incoming.data.is_empty() {
            log::debug!("[LOADER] skipping {} in merge", doc_type);
            continue;
        }

        let stored = store.document(doc_type);

        let localization = match &stored {
            Some(s) => s.localization_override.clone(),
            None => incoming.localization_override.clone().with_default_locale(),
        };
        let resolved = incoming.with_localization(localization);

        let (record, outcome) = if resolved.status.is_settled() {
            (resolved, MergeOutcome::Replaced)
        } else if let Some(mut existing) = stored {
            existing.expiration_date = resolved.expiration_date;
            (existing, MergeOutcome::ExpirationUpdated)
        } else {
            (resolved, MergeOutcome::Inserted)
        };

        if let Err(e) = store.save_document(&record) {
            log::error!("[LOADER] failed to save {}: {}", doc_type, e);
            continue;
        }
        if outcome == MergeOutcome::Replaced {
            ordering.clean_synchronized(doc_type);
        }

        log::debug!("[LOADER] merged {} -> {:?}", doc_type, outcome);
        report.outcomes.push((doc_type, outcome));
    }

    if let Some(order) = bundle.documents_type_order {
        ordering.set_order(order, false);
        report.order_updated = true;
    }

    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Err(e) = store.save(StoringKey::LastDocumentUpdate, &stamp) {
        log::error!("[LOADER] failed to record last update: {}", e);
    }

    report
}
