use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional TOML configuration file.
///
/// ```toml
/// [api]
/// base_url = "https://www.thunderclient.com"
/// api_key = "..."
/// account_number = "..."
/// max_pages = 100
/// timeout_seconds = 30
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api: ApiSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub account_number: Option<String>,
    pub max_pages: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let config = FileConfig::from_str(
            r#"
[api]
base_url = "http://localhost:9000"
api_key = "file-key"
account_number = "ACC-FILE"
max_pages = 20
timeout_seconds = 15
"#,
        )
        .unwrap();

        assert_eq!(config.api.base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.api.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.api.max_pages, Some(20));
        assert_eq!(config.api.timeout_seconds, Some(15));
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = FileConfig::from_str("").unwrap();
        assert!(config.api.api_key.is_none());
        assert!(config.api.max_pages.is_none());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let err = FileConfig::from_str("[api\nbase_url = 1").unwrap_err();
        assert!(err.is_config_error());
    }
}
