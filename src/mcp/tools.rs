// MCP tools wrapping the license operations

use crate::domain::model::{GetLicensesRequest, LicenseEmailsRequest, OperationResult};
use crate::domain::ports::LicenseApi;
use crate::mcp::protocol::{CallToolResult, ToolSchema};
use crate::utils::error::{LicenseError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ADD_LICENSE_TOOL: &str = "thunderclient_add_license";
pub const GET_LICENSES_TOOL: &str = "thunderclient_get_licenses";
pub const REMOVE_LICENSE_TOOL: &str = "thunderclient_remove_license";

const EMAILS_REQUIRED: &str =
    "emails array is required and must contain at least one email address";
const PAGE_NUMBER_INVALID: &str = "pageNumber must be a positive integer";

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// `LicenseError::InvalidParams` is reported to the caller as a
    /// JSON-RPC invalid-params error; any other error as an internal error.
    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult>;
}

/// Tools keyed by name; listing order is alphabetical.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the add, list and remove tools backed by `api`.
    pub fn for_license_api(api: Arc<dyn LicenseApi>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AddLicenseTool::new(api.clone())));
        registry.register(Arc::new(GetLicensesTool::new(api.clone())));
        registry.register(Arc::new(RemoveLicenseTool::new(api)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn emails_schema(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "emails": {
                "type": "array",
                "items": { "type": "string", "format": "email" },
                "description": description,
                "minItems": 1
            }
        },
        "required": ["emails"]
    })
}

fn parse_emails(arguments: serde_json::Value) -> Result<Vec<String>> {
    let request: LicenseEmailsRequest = serde_json::from_value(arguments)
        .map_err(|_| LicenseError::InvalidParams(EMAILS_REQUIRED.to_string()))?;
    if request.emails.is_empty() {
        return Err(LicenseError::InvalidParams(EMAILS_REQUIRED.to_string()));
    }
    Ok(request.emails)
}

fn parse_page_number(arguments: serde_json::Value) -> Result<Option<u32>> {
    let request: GetLicensesRequest = serde_json::from_value(arguments)
        .map_err(|_| LicenseError::InvalidParams(PAGE_NUMBER_INVALID.to_string()))?;
    match request.page_number {
        Some(0) => Err(LicenseError::InvalidParams(PAGE_NUMBER_INVALID.to_string())),
        page => Ok(page),
    }
}

fn render<T: Serialize>(result: &OperationResult<T>) -> Result<CallToolResult> {
    let text = serde_json::to_string_pretty(result)?;
    Ok(CallToolResult::text(text, !result.is_success()))
}

pub struct AddLicenseTool {
    api: Arc<dyn LicenseApi>,
}

impl AddLicenseTool {
    pub fn new(api: Arc<dyn LicenseApi>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Tool for AddLicenseTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ADD_LICENSE_TOOL.to_string(),
            description: "Add Thunder Client licenses for specified email addresses".to_string(),
            input_schema: emails_schema("Array of email addresses to add licenses for"),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let emails = parse_emails(arguments)?;
        render(&self.api.add_license(&emails).await)
    }
}

pub struct RemoveLicenseTool {
    api: Arc<dyn LicenseApi>,
}

impl RemoveLicenseTool {
    pub fn new(api: Arc<dyn LicenseApi>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Tool for RemoveLicenseTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: REMOVE_LICENSE_TOOL.to_string(),
            description: "Remove Thunder Client licenses for specified email addresses"
                .to_string(),
            input_schema: emails_schema("Array of email addresses to remove licenses for"),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let emails = parse_emails(arguments)?;
        render(&self.api.remove_license(&emails).await)
    }
}

pub struct GetLicensesTool {
    api: Arc<dyn LicenseApi>,
}

impl GetLicensesTool {
    pub fn new(api: Arc<dyn LicenseApi>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Tool for GetLicensesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: GET_LICENSES_TOOL.to_string(),
            description: "Get Thunder Client licenses. If pageNumber is not provided, fetches all pages automatically.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pageNumber": {
                        "type": "number",
                        "description": "Specific page number to fetch (optional, fetches all pages if omitted)",
                        "minimum": 1
                    }
                },
                "required": []
            }),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let page_number = parse_page_number(arguments)?;
        render(&self.api.get_licenses(page_number).await)
    }
}
