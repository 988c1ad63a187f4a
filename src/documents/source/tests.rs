use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::documents::source::{
    DocumentSource, FanOutSource, FileDocumentSource, MockDocumentSource, MockProfile,
    SingleDocumentSource, SourceError,
};
use crate::documents::types::{DocTypeCode, DocumentRecord, DocumentStatus, Locale};

/// Per-type source that fails for the configured types.
struct FlakySingle {
    mock: MockDocumentSource,
    failing: BTreeSet<DocTypeCode>,
    calls: Mutex<HashMap<DocTypeCode, usize>>,
}

impl FlakySingle {
    fn new(failing: &[DocTypeCode]) -> Self {
        Self {
            mock: MockDocumentSource::default(),
            failing: failing.iter().copied().collect(),
            calls: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SingleDocumentSource for FlakySingle {
    async fn fetch_one(&self, doc_type: DocTypeCode) -> Result<Option<DocumentRecord>, SourceError> {
        *self.calls.lock().unwrap().entry(doc_type).or_default() += 1;
        if self.failing.contains(&doc_type) {
            return Err(SourceError::Transport("connection reset".into()));
        }
        self.mock.fetch_one(doc_type).await
    }
}

fn set(types: &[DocTypeCode]) -> BTreeSet<DocTypeCode> {
    types.iter().copied().collect()
}

static TEST_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_file(contents: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let count = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!("doc_wallet_response_{}_{}.json", std::process::id(), count));
    std::fs::write(&path, contents).expect("failed to write response file");
    path
}

#[tokio::test]
async fn fan_out_returns_partial_bundle_on_partial_failure() {
    let source = FanOutSource::new(FlakySingle::new(&[DocTypeCode::IdCard]));

    let bundle = source
        .fetch(&set(&[DocTypeCode::IdCard, DocTypeCode::Passport]))
        .await
        .expect("partial success is a success");

    assert!(bundle.get(DocTypeCode::IdCard).is_none());
    assert!(bundle.get(DocTypeCode::Passport).is_some());
}

#[tokio::test]
async fn fan_out_fails_only_when_everything_fails() {
    let source = FanOutSource::new(FlakySingle::new(&[DocTypeCode::IdCard, DocTypeCode::Passport]));

    let result = source
        .fetch(&set(&[DocTypeCode::IdCard, DocTypeCode::Passport]))
        .await;

    assert!(matches!(result, Err(SourceError::AllFailed { attempted: 2 })));
}

#[tokio::test]
async fn fan_out_empty_request_means_default_set() {
    let source = FanOutSource::new(FlakySingle::new(&[]));

    let bundle = source.fetch(&BTreeSet::new()).await.unwrap();

    let got: Vec<_> = bundle.records.keys().copied().collect();
    let mut expected = DocTypeCode::DEFAULT_ORDER.to_vec();
    expected.sort();
    assert_eq!(got, expected);

    let calls = source.inner().calls.lock().unwrap();
    assert!(calls.values().all(|n| *n == 1));
}

#[tokio::test]
async fn mock_rejects_taxpayer_card_and_fills_ua_localization() {
    let mock = MockDocumentSource::new(MockProfile::default().with_full_name("Коваль Іван Іванович"));

    assert!(matches!(
        mock.fetch_one(DocTypeCode::TaxpayerCard).await,
        Err(SourceError::Unsupported(DocTypeCode::TaxpayerCard))
    ));

    let record = mock.fetch_one(DocTypeCode::Passport).await.unwrap().unwrap();
    assert_eq!(record.status, DocumentStatus::Ok);
    assert!(record.data[0].is_current());
    let ua = record.localization_override.get(Locale::Ua).unwrap();
    assert_eq!(ua.get("lName").and_then(|v| v.as_str()), Some("Коваль"));
    assert_eq!(ua.get("birthday").and_then(|v| v.as_str()), Some("07.01.2008"));
}

#[tokio::test]
async fn file_source_keeps_only_requested_types() {
    let path = temp_file(
        r#"{
            "idCard": { "data": [{ "docNumber": "ID-1" }], "status": "ok", "expirationDate": "2031-05-01T00:00:00Z" },
            "passport": { "data": [{ "docNumber": "P-1" }], "status": "ok", "expirationDate": "2031-05-01T00:00:00Z" },
            "documentsTypeOrder": ["passport", "id-card"]
        }"#,
    );
    let source = FileDocumentSource::new(&path);

    let bundle = source.fetch(&set(&[DocTypeCode::Passport])).await.unwrap();

    assert_eq!(bundle.records.len(), 1);
    assert_eq!(bundle.get(DocTypeCode::Passport).unwrap().data[0].doc_number, "P-1");
    assert!(bundle.documents_type_order.is_some());
}

#[tokio::test]
async fn missing_file_is_a_transport_error() {
    let source = FileDocumentSource::new("/nonexistent/doc-wallet/response.json");
    let result = source.fetch(&BTreeSet::new()).await;
    assert!(matches!(result, Err(SourceError::Transport(_))));
}
