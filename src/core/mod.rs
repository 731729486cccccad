pub mod client;
pub mod pagination;

pub use crate::domain::model::{
    AggregateResult, LicenseListing, LicensePage, LicenseRecord, OperationResult, ServerConfig,
};
pub use crate::domain::ports::{LicenseApi, PageSource};
pub use crate::utils::error::Result;
pub use client::LicenseClient;
