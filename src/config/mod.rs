pub mod file;

use crate::domain::model::{ServerConfig, DEFAULT_BASE_URL, DEFAULT_MAX_PAGES};
use crate::utils::error::{LicenseError, Result};
use crate::utils::validation::Validate;
use std::time::Duration;

pub use file::{ApiSection, FileConfig};

/// Connection settings as supplied by flags / environment, before the
/// optional config file and defaults are applied.
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    #[cfg_attr(feature = "cli", arg(long, env = "TC_API_KEY", hide_env_values = true))]
    pub api_key: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, env = "TC_ACCOUNT_NUMBER"))]
    pub account_number: Option<String>,

    #[cfg_attr(
        feature = "cli",
        arg(long, env = "TC_BASE_URL", help = "Licensing API base URL [default: https://www.thunderclient.com]")
    )]
    pub base_url: Option<String>,

    #[cfg_attr(
        feature = "cli",
        arg(long, env = "TC_MAX_PAGES", help = "Most pages fetched by a full listing [default: 100]")
    )]
    pub max_pages: Option<u32>,

    #[cfg_attr(feature = "cli", arg(long, env = "TC_TIMEOUT_SECONDS"))]
    pub timeout_seconds: Option<u64>,

    #[cfg_attr(feature = "cli", arg(long = "config", env = "TC_CONFIG", help = "Path to a TOML config file"))]
    pub config_file: Option<std::path::PathBuf>,
}

impl ConnectionArgs {
    /// Builds the validated `ServerConfig`. Flags and environment win over
    /// the config file, which wins over defaults.
    pub fn resolve(&self) -> Result<ServerConfig> {
        let file = match &self.config_file {
            Some(path) => {
                tracing::debug!("Loading config file {}", path.display());
                FileConfig::from_file(path).map_err(|e| LicenseError::ConfigError {
                    message: format!("{}: {}", path.display(), e),
                })?
            }
            None => FileConfig::default(),
        };

        self.merge(file.api)
    }

    pub fn merge(&self, file: ApiSection) -> Result<ServerConfig> {
        let api_key = pick(&self.api_key, file.api_key).ok_or_else(|| {
            LicenseError::MissingConfigError {
                field: "TC_API_KEY".to_string(),
            }
        })?;
        let account_number = pick(&self.account_number, file.account_number).ok_or_else(|| {
            LicenseError::MissingConfigError {
                field: "TC_ACCOUNT_NUMBER".to_string(),
            }
        })?;
        let base_url =
            pick(&self.base_url, file.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let max_pages = self
            .max_pages
            .or(file.max_pages)
            .unwrap_or(DEFAULT_MAX_PAGES);

        let mut config = ServerConfig::new(api_key, account_number)
            .with_base_url(base_url)
            .with_max_pages(max_pages);
        if let Some(seconds) = self.timeout_seconds.or(file.timeout_seconds) {
            config = config.with_request_timeout(Duration::from_secs(seconds));
        }

        config.validate()?;
        Ok(config)
    }
}

/// First non-blank value; blank strings count as unset.
fn pick(primary: &Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or(fallback.filter(|v| !v.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(api_key: &str, account: &str) -> ConnectionArgs {
        ConnectionArgs {
            api_key: Some(api_key.to_string()),
            account_number: Some(account.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let config = args("key", "ACC-1").merge(ApiSection::default()).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_pages, DEFAULT_MAX_PAGES);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_args_override_file() {
        let file = ApiSection {
            base_url: Some("http://file.example".to_string()),
            api_key: Some("file-key".to_string()),
            account_number: Some("ACC-FILE".to_string()),
            max_pages: Some(5),
            timeout_seconds: Some(9),
        };
        let mut cli = args("cli-key", "ACC-CLI");
        cli.max_pages = Some(50);

        let config = cli.merge(file).unwrap();
        assert_eq!(config.api_key, "cli-key");
        assert_eq!(config.account_number, "ACC-CLI");
        assert_eq!(config.base_url, "http://file.example");
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(9)));
    }

    #[test]
    fn test_missing_credential_is_reported_by_variable_name() {
        let cli = ConnectionArgs {
            account_number: Some("ACC-1".to_string()),
            ..Default::default()
        };
        match cli.merge(ApiSection::default()) {
            Err(LicenseError::MissingConfigError { field }) => assert_eq!(field, "TC_API_KEY"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let cli = args("key", "  ");
        match cli.merge(ApiSection::default()) {
            Err(LicenseError::MissingConfigError { field }) => {
                assert_eq!(field, "TC_ACCOUNT_NUMBER")
            }
            other => panic!("unexpected: {:?}", other),
        }

        let mut cli = args("key", "ACC-1");
        cli.base_url = Some(String::new());
        assert_eq!(
            cli.merge(ApiSection::default()).unwrap().base_url,
            DEFAULT_BASE_URL
        );
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut cli = args("key", "ACC-1");
        cli.base_url = Some("not a url".to_string());
        assert!(cli.merge(ApiSection::default()).is_err());

        let mut cli = args("key", "ACC-1");
        cli.max_pages = Some(0);
        assert!(cli.merge(ApiSection::default()).is_err());

        let mut cli = args("key", "ACC-1");
        cli.timeout_seconds = Some(0);
        assert!(cli.merge(ApiSection::default()).is_err());
    }
}
