//! Text-to-speech client implementing the engine's `SpeechSynthesis`
//! contract. Only alert publication uses it.

use async_trait::async_trait;
use serde_json::json;

use crate::config::RemoteServiceConfig;
use crate::error::{Result, ServiceError};
use crate::retry::with_retries;
use wolftrace_core::SpeechSynthesis;

/// Client for the speech-synthesis service.
pub struct TtsClient {
    config: RemoteServiceConfig,
    client: reqwest::Client,
}

impl TtsClient {
    /// Create a client over `config`.
    pub fn new(config: RemoteServiceConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }

    async fn request(&self, text: &str) -> Result<Vec<u8>> {
        let url = format!("{}/synthesize", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "text": text,
            "voice": self.config.model.as_deref().unwrap_or("default"),
        });
        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesis for TtsClient {
    async fn synthesize(&self, text: &str) -> wolftrace_core::Result<Option<Vec<u8>>> {
        let audio = with_retries("tts_synthesize", self.config.max_retries, || {
            self.request(text)
        })
        .await
        .map_err(wolftrace_core::CoreError::from)?;
        Ok(if audio.is_empty() { None } else { Some(audio) })
    }
}
