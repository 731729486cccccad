use thiserror::Error;

#[derive(Error, Debug)]
pub enum LicenseError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {reason}")]
    HttpStatus {
        status: u16,
        reason: String,
        body: serde_json::Value,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Failed to fetch page {page}: {source}")]
    PageFetch {
        page: u32,
        #[source]
        source: Box<LicenseError>,
    },

    #[error("{0}")]
    InvalidParams(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl From<reqwest::Error> for LicenseError {
    fn from(err: reqwest::Error) -> Self {
        LicenseError::Transport(err.to_string())
    }
}

impl LicenseError {
    pub fn page_fetch(page: u32, source: LicenseError) -> Self {
        LicenseError::PageFetch {
            page,
            source: Box::new(source),
        }
    }

    /// True for problems that can only be fixed by changing the configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LicenseError::ConfigError { .. }
                | LicenseError::MissingConfigError { .. }
                | LicenseError::InvalidConfigValueError { .. }
                | LicenseError::TomlError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LicenseError>;
