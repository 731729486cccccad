use crate::core::pagination::{aggregate_pages, StopReason};
use crate::domain::model::{
    LicenseListing, LicensePage, LicenseRecord, OperationResult, ServerConfig,
};
use crate::domain::ports::{LicenseApi, PageSource};
use crate::utils::error::{LicenseError, Result};
use reqwest::{Client, Response};
use std::sync::Arc;

const API_KEY_HEADER: &str = "api-key";
const ADD_PATH: &str = "/api/license/add";
const REMOVE_PATH: &str = "/api/license/remove";
const QUERY_PATH: &str = "/api/license/query";

/// HTTP client for the licensing backend.
///
/// Cheap to clone; the underlying connection pool and configuration are
/// shared between clones.
#[derive(Clone)]
pub struct LicenseClient {
    config: Arc<ServerConfig>,
    client: Client,
}

impl LicenseClient {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| LicenseError::ConfigError {
            message: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: ServerConfig, client: Client) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base(), path)
    }

    async fn post_emails(&self, path: &str, emails: &[String]) -> Result<serde_json::Value> {
        let url = self.endpoint(path);
        let body = serde_json::json!({
            "accountNumber": self.config.account_number,
            "emails": emails,
        });

        tracing::debug!("POST {} for {} email(s)", url, emails.len());
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("POST {} -> {}", url, status);

        let data = read_json_or_empty(response).await;
        if !status.is_success() {
            return Err(LicenseError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: data,
            });
        }

        Ok(data)
    }
}

/// Best-effort body parse: anything that is not valid JSON becomes `{}`.
async fn read_json_or_empty(response: Response) -> serde_json::Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({}))
}

/// Raw body of `GET /api/license/query`. Every field may be absent, null or
/// loosely typed; anything unusable falls back to the page defaults.
#[derive(Debug, Default)]
struct QueryResponse {
    team_members: Vec<LicenseRecord>,
    total_pages: Option<u32>,
    used_seats: Option<u64>,
    has_more: Option<bool>,
}

impl QueryResponse {
    fn parse(text: &str) -> Result<Self> {
        let body: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| LicenseError::MalformedResponse(e.to_string()))?;

        let team_members = match body.get("teamMembers") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(members)) => {
                members.iter().cloned().map(LicenseRecord::from).collect()
            }
            Some(other) => {
                return Err(LicenseError::MalformedResponse(format!(
                    "teamMembers is not a list: {}",
                    other
                )))
            }
        };

        Ok(Self {
            team_members,
            total_pages: body
                .get("totalPages")
                .and_then(count_value)
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
            used_seats: body.get("usedSeats").and_then(count_value),
            has_more: body.get("hasMore").and_then(serde_json::Value::as_bool),
        })
    }

    fn into_page(self, page_number: u32) -> LicensePage {
        let licenses = self.team_members;
        let total_pages = self.total_pages.filter(|n| *n > 0).unwrap_or(1);
        let total_count = self
            .used_seats
            .filter(|n| *n > 0)
            .unwrap_or(licenses.len() as u64);
        let has_more = self.has_more.unwrap_or(page_number < total_pages);

        LicensePage {
            licenses,
            current_page: page_number,
            total_pages,
            total_count,
            has_more,
        }
    }
}

/// Non-negative whole number from an integer, an integral float or a numeric string.
fn count_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait::async_trait]
impl PageSource for LicenseClient {
    async fn fetch_page(&self, page_number: u32) -> Result<LicensePage> {
        let url = self.endpoint(QUERY_PATH);
        let page_param = page_number.to_string();

        tracing::debug!("GET {} page {}", url, page_number);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .query(&[
                ("accountNumber", self.config.account_number.as_str()),
                ("pageNumber", page_param.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!("Page {} returned {}: {}", page_number, status, text);
            let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
            return Err(LicenseError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        Ok(QueryResponse::parse(&text)?.into_page(page_number))
    }
}

#[async_trait::async_trait]
impl LicenseApi for LicenseClient {
    async fn add_license(&self, emails: &[String]) -> OperationResult<serde_json::Value> {
        match self.post_emails(ADD_PATH, emails).await {
            Ok(data) => {
                tracing::info!("Added licenses for {} email(s)", emails.len());
                OperationResult::success(
                    data,
                    format!("Successfully added licenses for {} email(s)", emails.len()),
                )
            }
            Err(err) => {
                tracing::warn!("Add license failed: {}", err);
                OperationResult::failure(&err)
            }
        }
    }

    async fn remove_license(&self, emails: &[String]) -> OperationResult<serde_json::Value> {
        match self.post_emails(REMOVE_PATH, emails).await {
            Ok(data) => {
                tracing::info!("Removed licenses for {} email(s)", emails.len());
                OperationResult::success(
                    data,
                    format!("Successfully removed licenses for {} email(s)", emails.len()),
                )
            }
            Err(err) => {
                tracing::warn!("Remove license failed: {}", err);
                OperationResult::failure(&err)
            }
        }
    }

    async fn get_licenses(&self, page_number: Option<u32>) -> OperationResult<LicenseListing> {
        if let Some(page_number) = page_number {
            return match self.fetch_page(page_number).await {
                Ok(page) => OperationResult::success(
                    LicenseListing::Page(page),
                    format!("Retrieved page {} of licenses", page_number),
                ),
                Err(err) => {
                    let err = LicenseError::page_fetch(page_number, err);
                    tracing::warn!("{}", err);
                    OperationResult::failure(&err)
                }
            };
        }

        let aggregation = aggregate_pages(self, self.config.max_pages).await;
        if let StopReason::FetchFailed { page } = aggregation.stop {
            tracing::info!(
                "Listing kept {} page(s) after page {} failed",
                aggregation.result.pages_fetched,
                page
            );
        }

        let result = aggregation.result;
        let message = format!(
            "Retrieved {} licenses across {} page(s)",
            result.licenses.len(),
            result.pages_fetched
        );
        OperationResult::success(LicenseListing::All(result), message)
    }
}
