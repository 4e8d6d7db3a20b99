//! Media-analysis service client: perceptual hashing and reverse video
//! search, implementing the engine's `MediaAnalysis` contract.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::RemoteServiceConfig;
use crate::error::{Result, ServiceError};
use crate::retry::with_retries;
use wolftrace_core::{MediaAnalysis, VideoMatch};

/// Parse a `{"phash": "16-hex-digits"}` body; `None` when the service
/// could not hash the media.
pub fn parse_phash(value: &Value) -> Result<Option<u64>> {
    match value.get("phash") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(hex)) => u64::from_str_radix(hex, 16)
            .map(Some)
            .map_err(|_| ServiceError::InvalidResponse(format!("bad phash {hex:?}"))),
        Some(other) => Err(ServiceError::InvalidResponse(format!(
            "unexpected phash value {other}"
        ))),
    }
}

/// Parse a `{"matches": [{"source": ..., "score": ...}]}` body.
pub fn parse_matches(value: &Value) -> Vec<VideoMatch> {
    value
        .get("matches")
        .and_then(Value::as_array)
        .map(|matches| {
            matches
                .iter()
                .filter_map(|m| {
                    Some(VideoMatch {
                        source: m.get("source")?.as_str()?.to_string(),
                        score: m.get("score")?.as_f64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Client for the media-analysis service.
pub struct MediaServiceClient {
    config: RemoteServiceConfig,
    client: reqwest::Client,
}

impl MediaServiceClient {
    /// Create a client over `config`.
    pub fn new(config: RemoteServiceConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
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
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MediaAnalysis for MediaServiceClient {
    async fn phash(&self, url: &str) -> wolftrace_core::Result<Option<u64>> {
        with_retries("media_phash", self.config.max_retries, || {
            self.post("/phash", json!({"url": url}))
        })
        .await
        .and_then(|value| parse_phash(&value))
        .map_err(Into::into)
    }

    async fn video_search(&self, query: &str) -> wolftrace_core::Result<Vec<VideoMatch>> {
        with_retries("media_video_search", self.config.max_retries, || {
            self.post("/search/videos", json!({"query": query}))
        })
        .await
        .map(|value| parse_matches(&value))
        .map_err(Into::into)
    }
}
