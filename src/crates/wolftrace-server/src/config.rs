//! Server configuration: bind address, engine knobs and service
//! endpoints, loaded from YAML with environment overrides.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use wolftrace_core::{EngineConfig, ServiceBundle};
use wolftrace_services::{
    ChatCompletionsClient, GoogleFactCheckClient, MediaServiceClient, RemoteServiceConfig,
    TtsClient,
};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// One remote service endpoint in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Base URL of the service.
    pub base_url: String,
    /// Environment variable holding the API key, when one is needed.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Model or voice variant.
    #[serde(default)]
    pub model: Option<String>,
}

impl ServiceEndpoint {
    fn remote_config(&self) -> RemoteServiceConfig {
        let mut config = RemoteServiceConfig::new(self.base_url.clone());
        if let Some(env_var) = &self.api_key_env {
            match std::env::var(env_var) {
                Ok(key) => config = config.with_api_key(key),
                Err(_) => {
                    tracing::warn!(env_var, "API key variable not set, endpoint may reject calls")
                }
            }
        }
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        config
    }
}

/// Configured external services. Any endpoint left out falls back to the
/// no-op provider and the engine degrades to pure graph math.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// AI completion endpoint (OpenAI-compatible).
    #[serde(default)]
    pub completion: Option<ServiceEndpoint>,
    /// Fact-check lookup endpoint.
    #[serde(default)]
    pub fact_check: Option<ServiceEndpoint>,
    /// Media analysis endpoint.
    #[serde(default)]
    pub media: Option<ServiceEndpoint>,
    /// Text-to-speech endpoint.
    #[serde(default)]
    pub tts: Option<ServiceEndpoint>,
}

impl ServicesConfig {
    /// Build the engine's service bundle from the configured endpoints.
    pub fn build_bundle(&self) -> ServiceBundle {
        let mut bundle = ServiceBundle::noop();
        if let Some(endpoint) = &self.completion {
            match ChatCompletionsClient::new(endpoint.remote_config()) {
                Ok(client) => bundle.completion = Arc::new(client),
                Err(error) => tracing::warn!(%error, "completion client unavailable"),
            }
        }
        if let Some(endpoint) = &self.fact_check {
            match GoogleFactCheckClient::new(endpoint.remote_config()) {
                Ok(client) => bundle.fact_check = Arc::new(client),
                Err(error) => tracing::warn!(%error, "fact-check client unavailable"),
            }
        }
        if let Some(endpoint) = &self.media {
            match MediaServiceClient::new(endpoint.remote_config()) {
                Ok(client) => bundle.media = Arc::new(client),
                Err(error) => tracing::warn!(%error, "media client unavailable"),
            }
        }
        if let Some(endpoint) = &self.tts {
            match TtsClient::new(endpoint.remote_config()) {
                Ok(client) => bundle.speech = Arc::new(client),
                Err(error) => tracing::warn!(%error, "tts client unavailable"),
            }
        }
        bundle
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Engine configuration section.
    #[serde(default)]
    pub engine: EngineConfig,
    /// External service endpoints.
    #[serde(default)]
    pub services: ServicesConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            engine: EngineConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// `HOST`/`PORT` environment variables override the file values.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(port, "PORT is not a valid u16, ignored"),
            }
        }
        self
    }

    /// Bind address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
