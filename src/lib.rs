pub mod config;
pub mod core;
pub mod domain;
pub mod mcp;
pub mod utils;

pub use config::ConnectionArgs;
pub use crate::core::{client::LicenseClient, LicenseApi};
pub use domain::model::{
    AggregateResult, LicenseListing, LicensePage, LicenseRecord, OperationResult, ServerConfig,
};
pub use mcp::{McpServer, ToolRegistry};
pub use utils::error::{LicenseError, Result};
