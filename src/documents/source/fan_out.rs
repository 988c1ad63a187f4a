//! Batch fetch built from independent per-type fetches.
//!
//! All constituent fetches run concurrently and are joined before the batch
//! resolves. Partial success yields a partial bundle; only a batch where
//! every fetch failed is reported as a failure.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::future::join_all;

use crate::documents::source::api::{DocumentSource, SingleDocumentSource, SourceError};
use crate::documents::types::{DocTypeCode, DocumentsBundle};

pub struct FanOutSource<S> {
    inner: S,
}

impl<S: SingleDocumentSource> FanOutSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: SingleDocumentSource> DocumentSource for FanOutSource<S> {
    async fn fetch(&self, requested: &BTreeSet<DocTypeCode>) -> Result<DocumentsBundle, SourceError> {
        let types: Vec<DocTypeCode> = if requested.is_empty() {
            DocTypeCode::DEFAULT_ORDER.to_vec()
        } else {
            requested.iter().copied().collect()
        };

        log::debug!("[SOURCE] fan-out fetch of {:?}", types);

        let results = join_all(types.iter().map(|&doc_type| {
            let inner = &self.inner;
            async move { (doc_type, inner.fetch_one(doc_type).await) }
        }))
        .await;

        let attempted = results.len();
        let mut failed = 0;
        let mut bundle = DocumentsBundle::default();

        for (doc_type, result) in results {
            match result {
                Ok(Some(record)) if record.doc_type == doc_type => {
                    bundle.insert(record);
                }
                Ok(Some(record)) => {
                    log::warn!(
                        "[SOURCE] asked for {} but got {}, ignoring",
                        doc_type,
                        record.doc_type
                    );
                }
                Ok(None) => {
                    log::debug!("[SOURCE] {} not returned", doc_type);
                }
                Err(e) => {
                    failed += 1;
                    log::warn!("[SOURCE] fetch of {} failed: {}", doc_type, e);
                }
            }
        }

        if attempted > 0 && failed == attempted {
            return Err(SourceError::AllFailed { attempted });
        }

        Ok(bundle)
    }
}
