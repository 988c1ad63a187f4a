//! Fabricating source for the offline build.
//!
//! Produces one `ok` record per supported type from a holder profile.

use async_trait::async_trait;
use chrono::{Duration, Months, NaiveDate, Utc};
use serde_json::{json, Map, Value};

use crate::documents::source::api::{SingleDocumentSource, SourceError};
use crate::documents::types::{
    DocTypeCode, DocumentEntry, DocumentRecord, DocumentStatus, Locale, LocalizationOverride,
};

/// Holder data the fabricated documents are issued to.
#[derive(Debug, Clone)]
pub struct MockProfile {
    pub last_name: String,
    pub first_name: String,
    pub patronymic: String,
    /// `DD.MM.YYYY`
    pub birth_date: String,
    pub birth_place: String,
    pub tax_id: String,
    /// How long fabricated records stay fresh.
    pub ttl: Duration,
}

impl Default for MockProfile {
    fn default() -> Self {
        Self {
            last_name: "Шевченко".to_string(),
            first_name: "Олена".to_string(),
            patronymic: "Петрівна".to_string(),
            birth_date: "07.01.2008".to_string(),
            birth_place: "м. Київ".to_string(),
            tax_id: "3912345678".to_string(),
            ttl: Duration::hours(24),
        }
    }
}

impl MockProfile {
    /// Parses `"Last First Patronymic"`; missing parts keep their defaults.
    pub fn with_full_name(mut self, full_name: &str) -> Self {
        let mut parts = full_name.split_whitespace();
        if let Some(last) = parts.next() {
            self.last_name = last.to_string();
        }
        if let Some(first) = parts.next() {
            self.first_name = first.to_string();
        }
        if let Some(patronymic) = parts.next() {
            self.patronymic = patronymic.to_string();
        }
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {} {}", self.last_name, self.first_name, self.patronymic)
    }

    /// Birth date as `YYYY-MM-DD`, falling back to the default profile date.
    fn birthday_iso(&self) -> String {
        NaiveDate::parse_from_str(&self.birth_date, "%d.%m.%Y")
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| "2008-01-07".to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDocumentSource {
    profile: MockProfile,
}

impl MockDocumentSource {
    pub fn new(profile: MockProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &MockProfile {
        &self.profile
    }

    pub fn fabricate(&self, doc_type: DocTypeCode) -> Result<DocumentRecord, SourceError> {
        let p = &self.profile;
        let today = Utc::now().date_naive();
        let issued = today.checked_sub_months(Months::new(36)).unwrap_or(today);
        let expires = issued.checked_add_months(Months::new(120)).unwrap_or(today);

        let (doc_number, extra) = match doc_type {
            DocTypeCode::DriverLicense => (
                "ААА123456".to_string(),
                json!({ "categories": ["B", "C"], "department": "ТСЦ МВС 8041" }),
            ),
            DocTypeCode::IdCard => (
                format!("00{}", &p.tax_id.chars().take(7).collect::<String>()),
                json!({ "department": "8041", "recordNumber": format!("{}-00012", p.birthday_iso().replace('-', "")) }),
            ),
            DocTypeCode::BirthCertificate => (
                "I-БК 123456".to_string(),
                json!({ "actRecordNumber": "1234", "registryOffice": "Шевченківський ВДРАЦС" }),
            ),
            DocTypeCode::Passport => (
                "FX123456".to_string(),
                json!({ "department": "8041", "passportType": "foreign" }),
            ),
            DocTypeCode::TaxpayerCard => return Err(SourceError::Unsupported(doc_type)),
        };

        let mut fields = Map::new();
        fields.insert("lName".into(), json!(p.last_name));
        fields.insert("fName".into(), json!(p.first_name));
        fields.insert("mName".into(), json!(p.patronymic));
        fields.insert("birthday".into(), json!(p.birthday_iso()));
        fields.insert("birthPlace".into(), json!(p.birth_place));
        fields.insert("taxId".into(), json!(p.tax_id));
        fields.insert("docNumber".into(), json!(doc_number));
        fields.insert("dateIssue".into(), json!(issued.format("%Y-%m-%d").to_string()));
        fields.insert("dateExpiry".into(), json!(expires.format("%Y-%m-%d").to_string()));
        if let Value::Object(extra) = extra {
            fields.extend(extra);
        }

        let mut ua = fields.clone();
        ua.insert("birthday".into(), json!(p.birth_date));

        let mut localization = LocalizationOverride::default();
        localization.insert(Locale::Ua, ua);

        fields.insert("validUntil".into(), Value::Null);

        Ok(DocumentRecord {
            doc_type,
            data: vec![DocumentEntry { doc_number, doc_data: fields }],
            status: DocumentStatus::Ok,
            expiration_date: Utc::now() + p.ttl,
            localization_override: localization,
        })
    }
}

#[async_trait]
impl SingleDocumentSource for MockDocumentSource {
    async fn fetch_one(&self, doc_type: DocTypeCode) -> Result<Option<DocumentRecord>, SourceError> {
        let record = self.fabricate(doc_type)?;
        log::debug!(
            "[SOURCE] fabricated {} for {}",
            doc_type,
            self.profile.full_name()
        );
        Ok(Some(record))
    }
}
