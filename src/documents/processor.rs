//! Turns stored documents into presentation models.
//!
//! Reads the store after a "documents were updated" notification. Absent
//! records are a normal empty state and simply produce no card.

use std::sync::Arc;

use crate::documents::ordering::OrderingService;
use crate::documents::types::{DocTypeCode, DocumentEntry};
use crate::persistence::{DocumentStore, DocumentStoreExt};

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCard {
    pub doc_type: DocTypeCode,
    pub title: String,
    pub doc_number: String,
    pub holder: String,
}

impl DocumentCard {
    fn from_entry(doc_type: DocTypeCode, entry: &DocumentEntry) -> Self {
        let field = |name: &str| {
            entry
                .doc_data
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let holder = [field("lName"), field("fName"), field("mName")]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            doc_type,
            title: doc_type.display_name().to_string(),
            doc_number: entry.doc_number.clone(),
            holder,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentStack {
    Single(DocumentCard),
    Multiple(Vec<DocumentCard>),
}

impl DocumentStack {
    fn from_cards(mut cards: Vec<DocumentCard>) -> Option<Self> {
        match cards.len() {
            0 => None,
            1 => cards.pop().map(DocumentStack::Single),
            _ => Some(DocumentStack::Multiple(cards)),
        }
    }

    pub fn cards(&self) -> Vec<&DocumentCard> {
        match self {
            DocumentStack::Single(card) => vec![card],
            DocumentStack::Multiple(cards) => cards.iter().collect(),
        }
    }
}

pub struct DocumentsProcessor {
    store: Arc<dyn DocumentStore>,
    ordering: Arc<dyn OrderingService>,
}

impl DocumentsProcessor {
    pub fn new(store: Arc<dyn DocumentStore>, ordering: Arc<dyn OrderingService>) -> Self {
        Self { store, ordering }
    }

    /// Builds stacks for `order`; unknown codes, taxpayer card and absent
    /// records are skipped.
    pub fn documents(&self, order: &[String]) -> Vec<DocumentStack> {
        order
            .iter()
            .filter_map(|code| DocTypeCode::parse(code))
            .filter(|t| t.is_supported())
            .filter_map(|doc_type| {
                let record = self.store.document(doc_type)?;
                let cards: Vec<DocumentCard> = record
                    .data
                    .iter()
                    .filter(|e| e.is_current())
                    .map(|e| DocumentCard::from_entry(doc_type, e))
                    .collect();
                let cards = reorder(cards, &self.ordering.order_for(doc_type));
                DocumentStack::from_cards(cards)
            })
            .collect()
    }

    /// Uses the ordering service's current order.
    pub fn current_documents(&self) -> Vec<DocumentStack> {
        self.documents(&self.ordering.doc_types_order())
    }
}

/// Moves cards named in `order_ids` to the front, in that order.
fn reorder(mut cards: Vec<DocumentCard>, order_ids: &[String]) -> Vec<DocumentCard> {
    for id in order_ids.iter().rev() {
        if let Some(index) = cards.iter().position(|c| &c.doc_number == id) {
            let card = cards.remove(index);
            cards.insert(0, card);
        }
    }
    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::ordering::StoredOrderingService;
    use crate::documents::types::{DocumentRecord, DocumentStatus, LocalizationOverride};
    use crate::persistence::MemoryStore;
    use chrono::{Duration, Utc};
    use serde_json::{json, Map, Value};

    fn entry(number: &str, valid_until: Value) -> DocumentEntry {
        let mut data = Map::new();
        data.insert("lName".into(), json!("Шевченко"));
        data.insert("fName".into(), json!("Олена"));
        data.insert("validUntil".into(), valid_until);
        DocumentEntry {
            doc_number: number.into(),
            doc_data: data,
        }
    }

    fn setup() -> (Arc<MemoryStore>, Arc<StoredOrderingService>, DocumentsProcessor) {
        let store = Arc::new(MemoryStore::new());
        let ordering = Arc::new(StoredOrderingService::new(store.clone()));
        let processor = DocumentsProcessor::new(store.clone(), ordering.clone());
        (store, ordering, processor)
    }

    #[test]
    fn multi_entry_record_is_reordered_and_filtered() {
        let (store, ordering, processor) = setup();
        store
            .save_document(&DocumentRecord {
                doc_type: DocTypeCode::DriverLicense,
                data: vec![
                    entry("A", Value::Null),
                    entry("B", Value::Null),
                    entry("OLD", json!("2020-01-01")),
                ],
                status: DocumentStatus::Ok,
                expiration_date: Utc::now() + Duration::hours(1),
                localization_override: LocalizationOverride::default(),
            })
            .unwrap();
        ordering.set_order_for(DocTypeCode::DriverLicense, vec!["B".into()], false);

        let stacks = processor.documents(&["driver-license".to_string()]);

        assert_eq!(stacks.len(), 1);
        let numbers: Vec<_> = stacks[0].cards().iter().map(|c| c.doc_number.clone()).collect();
        assert_eq!(numbers, vec!["B", "A"]);
        assert_eq!(stacks[0].cards()[0].holder, "Шевченко Олена");
    }

    #[test]
    fn absent_and_unsupported_types_are_empty_state() {
        let (_store, _ordering, processor) = setup();
        let stacks = processor.documents(&[
            "taxpayer-card".to_string(),
            "passport".to_string(),
            "unknown".to_string(),
        ]);
        assert!(stacks.is_empty());
    }
}
