pub mod documents;
pub mod persistence;

pub use documents::ordering::{OrderingService, StoredOrderingService};
pub use documents::processor::{DocumentCard, DocumentStack, DocumentsProcessor};
pub use documents::runtime::{DocumentsListener, DocumentsLoader, ListenerId};
pub use documents::source::{DocumentSource, SourceError};
pub use documents::types::{DocTypeCode, DocumentRecord, DocumentStatus, DocumentsBundle};
pub use persistence::{DocumentStore, JsonFileStore, MemoryStore, StoreError, StoringKey};
