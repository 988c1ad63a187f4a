use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::documents::types::{DocTypeCode, DocumentRecord, DocumentsBundle};

#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not produce a result at all.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response arrived but could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("document type {0} is not supported")]
    Unsupported(DocTypeCode),

    /// Every constituent fetch of a batch failed.
    #[error("all {attempted} document fetches failed")]
    AllFailed { attempted: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces documents for a set of requested types.
///
/// An empty request means "the full default set". A successful result may
/// omit requested types; omitted types are left untouched by the merge.
/// Completion may happen on any thread.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, requested: &BTreeSet<DocTypeCode>) -> Result<DocumentsBundle, SourceError>;
}

/// Per-type source, joined into a batch by [`crate::documents::source::FanOutSource`].
///
/// `Ok(None)` means the backend has nothing for this type.
#[async_trait]
pub trait SingleDocumentSource: Send + Sync {
    async fn fetch_one(&self, doc_type: DocTypeCode) -> Result<Option<DocumentRecord>, SourceError>;
}
