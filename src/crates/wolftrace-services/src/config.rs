//! Common configuration for remote service clients.

use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_max_retries() -> u32 {
    2
}

/// Configuration for a remote HTTP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteServiceConfig {
    /// API key for authentication, when the service needs one.
    pub api_key: Option<String>,

    /// Base URL of the service.
    pub base_url: String,

    /// Model or endpoint variant, for services that route by model.
    pub model: Option<String>,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl RemoteServiceConfig {
    /// Create a keyless configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            model: None,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    /// Create a configuration reading the API key from `env_var`.
    pub fn from_env(env_var: &str, base_url: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| ServiceError::ApiKeyNotFound(env_var.to_string()))?;
        Ok(Self {
            api_key: Some(api_key),
            base_url: base_url.into(),
            model: None,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        })
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Build an HTTP client honouring the configured timeout.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ServiceError::Http)
    }
}
