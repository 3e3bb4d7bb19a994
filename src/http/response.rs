use crate::core::{ErrorCode, ScrapeError};
use crate::fetcher::FetchOutcome;
use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One extracted field. `Missing` serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Missing,
    Text(String),
    List(Vec<String>),
    Records(Vec<BTreeMap<String, String>>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(values) => values.is_empty(),
            FieldValue::Records(records) => records.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(values) => Some(values),
            _ => None,
        }
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub id: Uuid,
    pub status: ScrapeStatus,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_matches: Option<bool>,
    pub retries: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ScrapeResult {
    pub fn success(id: Uuid, outcome: &FetchOutcome, fields: Fields, retries: usize) -> Self {
        let no_matches = fields.values().all(FieldValue::is_empty);
        Self {
            id,
            status: ScrapeStatus::Success,
            url: outcome.url.to_string(),
            final_url: Some(outcome.final_url.to_string()),
            http_status: Some(outcome.status),
            fields: Some(fields),
            no_matches: Some(no_matches),
            retries,
            error: None,
            message: None,
            timestamp: outcome.timestamp,
        }
    }

    pub fn failure(id: Uuid, url: &str, error: &ScrapeError, retries: usize) -> Self {
        Self {
            id,
            status: ScrapeStatus::Failure,
            url: url.to_string(),
            final_url: None,
            http_status: error.upstream_status(),
            fields: None,
            no_matches: None,
            retries,
            error: Some(error.code()),
            message: Some(error.public_message()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ScrapeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use url::Url;

    #[test]
    fn test_field_value_serialization() {
        let mut fields = Fields::new();
        fields.insert("missing".to_string(), FieldValue::Missing);
        fields.insert("title".to_string(), FieldValue::Text("Hello".to_string()));
        fields.insert("links".to_string(), FieldValue::List(vec![]));

        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            json!({"links": [], "missing": null, "title": "Hello"})
        );
    }

    #[test]
    fn test_success_always_carries_fields() {
        let url = Url::parse("https://example.com/").unwrap();
        let outcome = FetchOutcome::new(url, 200, "");

        let result = ScrapeResult::success(Uuid::now_v7(), &outcome, Fields::new(), 0);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["fields"], json!({}));
        assert_eq!(value["no_matches"], true);
        assert_eq!(value["http_status"], 200);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failure_shape() {
        let error = ScrapeError::InvalidInput("'not-a-url' is not an absolute URL".into());
        let result = ScrapeResult::failure(Uuid::now_v7(), "not-a-url", &error, 0);
        let value: Value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["status"], "failure");
        assert_eq!(value["error"], "InvalidInput");
        assert_eq!(value["url"], "not-a-url");
        assert!(value.get("fields").is_none());
        assert!(value.get("http_status").is_none());
    }
}
