use crate::utils::error::LicenseError;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.thunderclient.com";

/// Upper bound on pages fetched by one full listing, guarding against a
/// backend that never stops reporting more pages.
pub const DEFAULT_MAX_PAGES: u32 = 100;

#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub api_key: String,
    pub account_number: String,
    pub base_url: String,
    pub max_pages: u32,
    pub request_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn new(api_key: impl Into<String>, account_number: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            account_number: account_number.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            request_timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("api_key", &"<redacted>")
            .field("account_number", &self.account_number)
            .field("base_url", &self.base_url)
            .field("max_pages", &self.max_pages)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl crate::utils::validation::Validate for ServerConfig {
    fn validate(&self) -> crate::utils::error::Result<()> {
        use crate::utils::validation::*;

        validate_non_empty_secret("api_key", &self.api_key)?;
        validate_non_empty_string("account_number", &self.account_number)?;
        validate_url("base_url", &self.base_url)?;
        validate_range("max_pages", self.max_pages, 1, 1000)?;
        if let Some(timeout) = self.request_timeout {
            validate_positive_number("timeout_seconds", timeout.as_secs(), 1)?;
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}

/// One seat as reported by the licensing backend, relayed exactly as
/// received. Accessors read the well-known fields leniently for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseRecord(serde_json::Value);

impl LicenseRecord {
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn email(&self) -> Option<&str> {
        self.text_field("email")
    }

    pub fn account_number(&self) -> Option<&str> {
        self.text_field("accountNumber")
    }

    pub fn status(&self) -> Option<&str> {
        self.text_field("status")
    }

    pub fn created_at(&self) -> Option<&serde_json::Value> {
        self.present_field("createdAt")
    }

    pub fn updated_at(&self) -> Option<&serde_json::Value> {
        self.present_field("updatedAt")
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created_at()?)
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.updated_at()?)
    }

    fn present_field(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn text_field(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }
}

impl From<serde_json::Value> for LicenseRecord {
    fn from(raw: serde_json::Value) -> Self {
        Self(raw)
    }
}

/// RFC 3339 strings, or integer epoch milliseconds.
fn parse_timestamp(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    match raw {
        serde_json::Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        serde_json::Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensePage {
    pub licenses: Vec<LicenseRecord>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub licenses: Vec<LicenseRecord>,
    pub total_pages: u32,
    pub total_count: u64,
    pub pages_fetched: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LicenseListing {
    Page(LicensePage),
    All(AggregateResult),
}

impl LicenseListing {
    pub fn licenses(&self) -> &[LicenseRecord] {
        match self {
            LicenseListing::Page(page) => &page.licenses,
            LicenseListing::All(all) => &all.licenses,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LicenseEmailsRequest {
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLicensesRequest {
    #[serde(default)]
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    Transport,
    HttpStatus,
    PageFetch,
    MalformedResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationFailure {
    pub kind: FailureKind,
    pub error: String,
    pub status: Option<u16>,
    pub body: Option<serde_json::Value>,
}

impl From<&LicenseError> for OperationFailure {
    fn from(err: &LicenseError) -> Self {
        let (kind, status, body) = match err {
            LicenseError::HttpStatus { status, body, .. } => {
                (FailureKind::HttpStatus, Some(*status), Some(body.clone()))
            }
            LicenseError::PageFetch { source, .. } => {
                let status = match source.as_ref() {
                    LicenseError::HttpStatus { status, .. } => Some(*status),
                    _ => None,
                };
                (FailureKind::PageFetch, status, None)
            }
            LicenseError::MalformedResponse(_) | LicenseError::SerializationError(_) => {
                (FailureKind::MalformedResponse, None, None)
            }
            _ => (FailureKind::Transport, None, None),
        };

        Self {
            kind,
            error: err.to_string(),
            status,
            body,
        }
    }
}

/// Uniform envelope returned by every license operation. Serializes as
/// `{"success", "data"?, "message"?, "error"?}`; an HTTP status failure
/// carries the parsed response body under `data`.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult<T> {
    Success { data: T, message: String },
    Failure(OperationFailure),
}

impl<T> OperationResult<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        OperationResult::Success {
            data,
            message: message.into(),
        }
    }

    pub fn failure(err: &LicenseError) -> Self {
        OperationResult::Failure(OperationFailure::from(err))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            OperationResult::Success { data, .. } => Some(data),
            OperationResult::Failure(_) => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            OperationResult::Success { data, .. } => Some(data),
            OperationResult::Failure(_) => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            OperationResult::Success { message, .. } => Some(message),
            OperationResult::Failure(_) => None,
        }
    }

    pub fn failure_info(&self) -> Option<&OperationFailure> {
        match self {
            OperationResult::Success { .. } => None,
            OperationResult::Failure(failure) => Some(failure),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.failure_info().map(|f| f.error.as_str())
    }
}

impl<T: Serialize> Serialize for OperationResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            OperationResult::Success { data, message } => {
                let mut state = serializer.serialize_struct("OperationResult", 3)?;
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
                state.serialize_field("message", message)?;
                state.end()
            }
            OperationResult::Failure(failure) => {
                let len = if failure.body.is_some() { 3 } else { 2 };
                let mut state = serializer.serialize_struct("OperationResult", len)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", &failure.error)?;
                if let Some(body) = &failure.body {
                    state.serialize_field("data", body)?;
                }
                state.end()
            }
        }
    }
}
