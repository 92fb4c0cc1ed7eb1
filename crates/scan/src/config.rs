use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BudgetError, CompressionBudget};

/// Environment variable holding the OCR endpoint URL.
pub const ENDPOINT_VAR: &str = "HF_API_URL";
/// Environment variable holding the bearer token for the OCR endpoint.
pub const TOKEN_VAR: &str = "HF_API_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid compression budget: {0}")]
    Budget(#[from] BudgetError),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Settings for scanning receipts.
///
/// ```toml
/// endpoint = "https://ocr.example.com/scan"
/// token = "hf_..."
/// timeout_secs = 60
/// max_bytes = 1048576
/// max_dimension = 2048
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    /// Request timeout; the HTTP client's default when unset.
    pub timeout_secs: Option<u64>,
    pub max_bytes: u64,
    pub max_dimension: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            timeout_secs: None,
            max_bytes: CompressionBudget::DEFAULT_MAX_BYTES,
            max_dimension: CompressionBudget::DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ScanConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Defaults overridden by `HF_API_URL` / `HF_API_TOKEN`.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies endpoint/token overrides from `lookup`; blank values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(endpoint) = present(ENDPOINT_VAR) {
            self.endpoint = Some(endpoint);
        }
        if let Some(token) = present(TOKEN_VAR) {
            self.token = Some(token);
        }
        self
    }

    pub fn budget(&self) -> Result<CompressionBudget, BudgetError> {
        CompressionBudget::new(self.max_bytes, self.max_dimension)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Both endpoint and token are set and non-blank.
    pub fn is_complete(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.endpoint) && set(&self.token)
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_bytes", &self.max_bytes)
            .field("max_dimension", &self.max_dimension)
            .finish()
    }
}
