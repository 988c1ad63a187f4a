//! Key-value persistence for cached documents and their metadata.
//!
//! The loader treats the store as opaque: synchronous `get`/`set` of JSON
//! values under a typed [`StoringKey`]. Typed helpers live on
//! [`DocumentStoreExt`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::documents::types::{DocTypeCode, DocumentRecord};

pub const STORE_PATH: &str = "documents_store.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key space of the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoringKey {
    /// One cached record per supported document type.
    Document(DocTypeCode),
    /// ISO-8601 timestamp of the last successful source call.
    LastDocumentUpdate,
    /// Display order of document types (owned by the ordering service).
    DocumentsOrder,
    /// Set when the display order was changed locally and awaits remote sync.
    DocumentsOrderSync,
    /// Order of entries inside one multi-entry document type.
    InstanceOrder(DocTypeCode),
}

impl StoringKey {
    pub fn as_key(&self) -> String {
        match self {
            StoringKey::Document(t) => t.bundle_field().to_string(),
            StoringKey::LastDocumentUpdate => "lastDocumentUpdate".to_string(),
            StoringKey::DocumentsOrder => "documentsTypeOrder".to_string(),
            StoringKey::DocumentsOrderSync => "documentsTypeOrderSync".to_string(),
            StoringKey::InstanceOrder(t) => format!("order.{}", t.code()),
        }
    }
}

impl fmt::Display for StoringKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl DocTypeCode {
    /// Taxpayer card is never persisted.
    pub fn storing_key(&self) -> Option<StoringKey> {
        self.is_supported().then_some(StoringKey::Document(*self))
    }
}

/// Individual `get`/`set` calls are atomic; nothing else is promised.
pub trait DocumentStore: Send + Sync {
    fn get(&self, key: StoringKey) -> Option<Value>;
    fn set(&self, key: StoringKey, value: Value) -> Result<(), StoreError>;
}

pub trait DocumentStoreExt {
    fn get_value<T: DeserializeOwned>(&self, key: StoringKey) -> Option<T>;
    fn save<T: Serialize>(&self, key: StoringKey, value: &T) -> Result<(), StoreError>;
    fn document(&self, doc_type: DocTypeCode) -> Option<DocumentRecord>;
    fn save_document(&self, record: &DocumentRecord) -> Result<(), StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {
    fn get_value<T: DeserializeOwned>(&self, key: StoringKey) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_value(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("[STORE] unreadable value under {}: {}", key, e);
                None
            }
        }
    }

    fn save<T: Serialize>(&self, key: StoringKey, value: &T) -> Result<(), StoreError> {
        self.set(key, serde_json::to_value(value)?)
    }

    fn document(&self, doc_type: DocTypeCode) -> Option<DocumentRecord> {
        let record: DocumentRecord = self.get_value(doc_type.storing_key()?)?;
        // An empty entry list is the same as no record.
        (!record.data.is_empty()).then_some(record)
    }

    fn save_document(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        match record.doc_type.storing_key() {
            Some(key) => self.save(key, record),
            None => {
                log::debug!("[STORE] {} has no storing key, not saved", record.doc_type);
                Ok(())
            }
        }
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: StoringKey) -> Option<Value> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(&key.as_key()).cloned()
    }

    fn set(&self, key: StoringKey, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.as_key(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Opens the store file, creating an empty one when it does not exist.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let values: BTreeMap<String, Value> = if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            };
            log::info!("[STORE] loaded {} keys from {}", values.len(), path.display());
            values
        } else {
            log::info!("[STORE] creating new store at {}", path.display());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, b"{}")?;
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStore for JsonFileStore {
    fn get(&self, key: StoringKey) -> Option<Value> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(&key.as_key()).cloned()
    }

    fn set(&self, key: StoringKey, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.as_key(), value);
        let raw = serde_json::to_vec_pretty(&*values)?;
        std::fs::write(&self.path, raw)?;
        log::trace!("[STORE] wrote {} to {}", key, self.path.display());
        Ok(())
    }
}
