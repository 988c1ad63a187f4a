//! User-preferred display order of document types.
//!
//! The loader reads the order, seeds it when unusable and overwrites it with
//! the source's order hint. Long-term ownership stays here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::documents::types::DocTypeCode;
use crate::persistence::{DocumentStore, DocumentStoreExt, StoringKey};

pub trait OrderingService: Send + Sync {
    /// Raw type codes in display order; may contain unknown codes.
    fn doc_types_order(&self) -> Vec<String>;

    /// `synchronize` marks the order as pending upload to the backend.
    fn set_order(&self, order: Vec<String>, synchronize: bool);

    /// Order of entry identifiers inside one document type.
    fn order_for(&self, doc_type: DocTypeCode) -> Vec<String>;

    fn set_order_for(&self, doc_type: DocTypeCode, order: Vec<String>, synchronize: bool);

    /// Drops the pending-sync mark of a type whose content was just replaced.
    fn clean_synchronized(&self, doc_type: DocTypeCode);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceOrder {
    order: Vec<String>,
    needs_sync: bool,
}

/// Ordering kept in the shared document store.
#[derive(Clone)]
pub struct StoredOrderingService {
    store: Arc<dyn DocumentStore>,
}

impl StoredOrderingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn needs_sync(&self) -> bool {
        self.store
            .get_value(StoringKey::DocumentsOrderSync)
            .unwrap_or(false)
    }

    pub fn needs_sync_for(&self, doc_type: DocTypeCode) -> bool {
        self.instance_order(doc_type).needs_sync
    }

    fn instance_order(&self, doc_type: DocTypeCode) -> InstanceOrder {
        self.store
            .get_value(StoringKey::InstanceOrder(doc_type))
            .unwrap_or_default()
    }

    fn write<T: Serialize>(&self, key: StoringKey, value: &T) {
        if let Err(e) = self.store.save(key, value) {
            log::error!("[ORDER] failed to write {}: {}", key, e);
        }
    }
}

impl OrderingService for StoredOrderingService {
    fn doc_types_order(&self) -> Vec<String> {
        self.store
            .get_value(StoringKey::DocumentsOrder)
            .unwrap_or_default()
    }

    fn set_order(&self, order: Vec<String>, synchronize: bool) {
        log::debug!("[ORDER] set order {:?} (synchronize={})", order, synchronize);
        self.write(StoringKey::DocumentsOrder, &order);
        if synchronize {
            self.write(StoringKey::DocumentsOrderSync, &true);
        }
    }

    fn order_for(&self, doc_type: DocTypeCode) -> Vec<String> {
        self.instance_order(doc_type).order
    }

    fn set_order_for(&self, doc_type: DocTypeCode, order: Vec<String>, synchronize: bool) {
        let current = self.instance_order(doc_type);
        self.write(
            StoringKey::InstanceOrder(doc_type),
            &InstanceOrder {
                order,
                needs_sync: synchronize || current.needs_sync,
            },
        );
    }

    fn clean_synchronized(&self, doc_type: DocTypeCode) {
        let mut current = self.instance_order(doc_type);
        if current.needs_sync {
            log::trace!("[ORDER] clearing pending sync for {}", doc_type);
            current.needs_sync = false;
            self.write(StoringKey::InstanceOrder(doc_type), &current);
        }
    }
}
