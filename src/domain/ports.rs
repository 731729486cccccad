use crate::domain::model::{LicenseListing, LicensePage, OperationResult};
use crate::utils::error::Result;
use async_trait::async_trait;

/// The three license operations. Implementations never fail past this
/// boundary: every outcome is folded into an `OperationResult`.
#[async_trait]
pub trait LicenseApi: Send + Sync {
    async fn add_license(&self, emails: &[String]) -> OperationResult<serde_json::Value>;
    async fn remove_license(&self, emails: &[String]) -> OperationResult<serde_json::Value>;
    async fn get_licenses(&self, page_number: Option<u32>) -> OperationResult<LicenseListing>;
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page_number: u32) -> Result<LicensePage>;
}
