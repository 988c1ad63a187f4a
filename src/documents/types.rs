use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::documents::source::SourceError;

/// Stable identifier of a document kind.
///
/// Used both as a storage key and as an API request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocTypeCode {
    #[serde(alias = "driverLicense")]
    DriverLicense,
    /// Inert in this deployment: never fetched, never stored.
    #[serde(alias = "taxpayerCard")]
    TaxpayerCard,
    #[serde(alias = "idCard")]
    IdCard,
    #[serde(alias = "birthCertificate")]
    BirthCertificate,
    Passport,
}

impl DocTypeCode {
    pub const ALL: [DocTypeCode; 5] = [
        DocTypeCode::DriverLicense,
        DocTypeCode::TaxpayerCard,
        DocTypeCode::IdCard,
        DocTypeCode::BirthCertificate,
        DocTypeCode::Passport,
    ];

    /// Order used when the stored ordering is empty or unusable.
    pub const DEFAULT_ORDER: [DocTypeCode; 3] = [
        DocTypeCode::IdCard,
        DocTypeCode::BirthCertificate,
        DocTypeCode::Passport,
    ];

    /// Types whose presence decides between "cache populated" and cold start.
    pub const TRACKED: [DocTypeCode; 3] = Self::DEFAULT_ORDER;

    pub fn code(&self) -> &'static str {
        match self {
            DocTypeCode::DriverLicense => "driver-license",
            DocTypeCode::TaxpayerCard => "taxpayer-card",
            DocTypeCode::IdCard => "id-card",
            DocTypeCode::BirthCertificate => "birth-certificate",
            DocTypeCode::Passport => "passport",
        }
    }

    /// Field name of this type inside a documents response.
    pub fn bundle_field(&self) -> &'static str {
        match self {
            DocTypeCode::DriverLicense => "driverLicense",
            DocTypeCode::TaxpayerCard => "taxpayerCard",
            DocTypeCode::IdCard => "idCard",
            DocTypeCode::BirthCertificate => "birthCertificate",
            DocTypeCode::Passport => "passport",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DocTypeCode::DriverLicense => "Посвідчення водія",
            DocTypeCode::TaxpayerCard => "",
            DocTypeCode::IdCard => "ID-документ",
            DocTypeCode::BirthCertificate => "Свідоцтво про народження",
            DocTypeCode::Passport => "Паспорт громадянина України",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DocTypeCode::TaxpayerCard)
    }

    /// Accepts both the kebab-case code and the camelCase alias.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "driver-license" | "driverLicense" => Some(DocTypeCode::DriverLicense),
            "taxpayer-card" | "taxpayerCard" => Some(DocTypeCode::TaxpayerCard),
            "id-card" | "idCard" => Some(DocTypeCode::IdCard),
            "birth-certificate" | "birthCertificate" => Some(DocTypeCode::BirthCertificate),
            "passport" => Some(DocTypeCode::Passport),
            _ => None,
        }
    }
}

impl fmt::Display for DocTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DocTypeCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown document type code: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStatus {
    #[serde(alias = "OK")]
    Ok,
    #[serde(alias = "notFound")]
    NotFound,
    #[serde(alias = "documentProcessing", alias = "pending")]
    Processing,
    #[serde(other)]
    Unknown,
}

impl DocumentStatus {
    /// Settled statuses carry authoritative content and replace what is stored.
    pub fn is_settled(&self) -> bool {
        matches!(self, DocumentStatus::Ok | DocumentStatus::NotFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ua,
    Eng,
}

/// Locale-keyed alternate field values. Defaults to an empty `ua` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizationOverride(pub BTreeMap<Locale, Map<String, Value>>);

impl Default for LocalizationOverride {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert(Locale::Ua, Map::new());
        Self(values)
    }
}

impl LocalizationOverride {
    pub fn get(&self, locale: Locale) -> Option<&Map<String, Value>> {
        self.0.get(&locale)
    }

    pub fn insert(&mut self, locale: Locale, fields: Map<String, Value>) {
        self.0.insert(locale, fields);
    }

    /// Adds an empty `ua` entry when missing; other locales are kept.
    pub fn with_default_locale(mut self) -> Self {
        self.0.entry(Locale::Ua).or_default();
        self
    }
}

/// One concrete document instance (a single card in the wallet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub doc_number: String,
    #[serde(default)]
    pub doc_data: Map<String, Value>,
}

impl DocumentEntry {
    /// Entries carrying a `validUntil` are superseded and not displayed.
    pub fn is_current(&self) -> bool {
        self.doc_data
            .get("validUntil")
            .map(Value::is_null)
            .unwrap_or(true)
    }
}

/// Persisted representation of one document kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub doc_type: DocTypeCode,
    pub data: Vec<DocumentEntry>,
    pub status: DocumentStatus,
    pub expiration_date: DateTime<Utc>,
    #[serde(default, rename = "shareLocalization")]
    pub localization_override: LocalizationOverride,
}

impl DocumentRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.is_expired(now) || self.status == DocumentStatus::Processing
    }

    pub fn with_localization(mut self, localization: LocalizationOverride) -> Self {
        self.localization_override = localization;
        self
    }
}

/// Result of one Document Source call: zero or more records keyed by type,
/// plus an optional display-order hint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentsBundle {
    pub records: BTreeMap<DocTypeCode, DocumentRecord>,
    pub documents_type_order: Option<Vec<String>>,
}

impl DocumentsBundle {
    /// Inserts a record unless it has no entries (empty means absent).
    pub fn insert(&mut self, record: DocumentRecord) -> bool {
        if record.data.is_empty() {
            log::debug!("[SOURCE] dropping {} with empty entries", record.doc_type);
            return false;
        }
        self.records.insert(record.doc_type, record);
        true
    }

    pub fn get(&self, doc_type: DocTypeCode) -> Option<&DocumentRecord> {
        self.records.get(&doc_type)
    }

    pub fn from_json(raw: &str) -> Result<Self, SourceError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| SourceError::Decode(e.to_string()))?;
        Self::from_value(value)
    }

    /// Decodes every type field independently.
    ///
    /// A field that fails to decode is logged and treated as not returned;
    /// only a response that is not an object at all is an error.
    pub fn from_value(value: Value) -> Result<Self, SourceError> {
        let Value::Object(mut fields) = value else {
            return Err(SourceError::Decode("documents response is not an object".into()));
        };

        let mut bundle = DocumentsBundle::default();

        for doc_type in DocTypeCode::ALL {
            let Some(mut raw) = fields.remove(doc_type.bundle_field()) else {
                continue;
            };
            if raw.is_null() {
                continue;
            }
            if let Value::Object(obj) = &mut raw {
                obj.entry("docType")
                    .or_insert_with(|| Value::String(doc_type.code().to_string()));
            }

            match serde_json::from_value::<DocumentRecord>(raw) {
                Ok(record) if record.doc_type == doc_type => {
                    bundle.insert(record);
                }
                Ok(record) => {
                    log::warn!(
                        "[SOURCE] field {} carries a {} record, ignoring",
                        doc_type.bundle_field(),
                        record.doc_type
                    );
                }
                Err(e) => {
                    log::warn!("[SOURCE] could not decode {}: {}", doc_type, e);
                }
            }
        }

        bundle.documents_type_order = match fields.remove("documentsTypeOrder") {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        };

        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json(number: &str) -> Value {
        json!({
            "data": [{ "docNumber": number, "docData": { "fName": "Олена" } }],
            "status": "ok",
            "expirationDate": "2030-01-01T00:00:00Z"
        })
    }

    #[test]
    fn parses_codes_and_aliases() {
        assert_eq!(DocTypeCode::parse("id-card"), Some(DocTypeCode::IdCard));
        assert_eq!(DocTypeCode::parse("birthCertificate"), Some(DocTypeCode::BirthCertificate));
        assert_eq!(DocTypeCode::parse("residence-permit"), None);
        assert_eq!("passport".parse::<DocTypeCode>(), Ok(DocTypeCode::Passport));
    }

    #[test]
    fn lenient_decode_skips_broken_fields() {
        let raw = json!({
            "idCard": record_json("ID-1"),
            "passport": { "data": "not-a-list" },
            "birthCertificate": { "data": [], "status": "ok", "expirationDate": "2030-01-01T00:00:00Z" },
            "documentsTypeOrder": ["passport", "id-card"]
        });

        let bundle = DocumentsBundle::from_value(raw).unwrap();

        assert_eq!(bundle.records.len(), 1);
        assert_eq!(bundle.get(DocTypeCode::IdCard).unwrap().data[0].doc_number, "ID-1");
        assert_eq!(
            bundle.documents_type_order,
            Some(vec!["passport".to_string(), "id-card".to_string()])
        );
    }

    #[test]
    fn missing_localization_defaults_to_ua() {
        let bundle = DocumentsBundle::from_value(json!({ "passport": record_json("P-1") })).unwrap();
        let record = bundle.get(DocTypeCode::Passport).unwrap();
        assert_eq!(record.localization_override, LocalizationOverride::default());
        assert!(record.localization_override.get(Locale::Ua).is_some());
    }

    #[test]
    fn unknown_status_is_kept_as_unknown() {
        let mut raw = record_json("P-1");
        raw["status"] = json!("archived");
        let bundle = DocumentsBundle::from_value(json!({ "passport": raw })).unwrap();
        assert_eq!(bundle.get(DocTypeCode::Passport).unwrap().status, DocumentStatus::Unknown);
    }

    #[test]
    fn non_object_response_is_a_decode_error() {
        assert!(matches!(
            DocumentsBundle::from_json("[1, 2]"),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn entry_with_valid_until_is_not_current() {
        let entry: DocumentEntry = serde_json::from_value(json!({
            "docNumber": "A",
            "docData": { "validUntil": "2020-01-01" }
        }))
        .unwrap();
        assert!(!entry.is_current());
    }
}
