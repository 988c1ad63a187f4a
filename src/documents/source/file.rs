use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::documents::source::api::{DocumentSource, SourceError};
use crate::documents::types::{DocTypeCode, DocumentsBundle};

/// Offline backend: serves a documents response stored as JSON on disk.
///
/// The file is re-read on every fetch so it can be edited while running.
#[derive(Debug, Clone)]
pub struct FileDocumentSource {
    path: PathBuf,
}

impl FileDocumentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentSource for FileDocumentSource {
    async fn fetch(&self, requested: &BTreeSet<DocTypeCode>) -> Result<DocumentsBundle, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::Transport(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let mut bundle = DocumentsBundle::from_json(&raw)?;

        if !requested.is_empty() {
            bundle.records.retain(|doc_type, _| requested.contains(doc_type));
        }

        log::debug!(
            "[SOURCE] {} served {} records",
            self.path.display(),
            bundle.records.len()
        );

        Ok(bundle)
    }
}
