//! OpenAI-compatible chat-completions client implementing the engine's
//! `TextCompletion` contract.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::RemoteServiceConfig;
use crate::error::{Result, ServiceError};
use crate::retry::with_retries;
use wolftrace_core::TextCompletion;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Pull structured content out of a completion: the whole string as JSON
/// when possible, else the first embedded JSON object, else the raw text.
pub fn parse_content(content: &str) -> Value {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return value;
            }
        }
    }
    Value::String(trimmed.to_string())
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct ChatCompletionsClient {
    config: RemoteServiceConfig,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    /// Create a client over `config`.
    pub fn new(config: RemoteServiceConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }

    async fn request(&self, prompt: &str, purpose: &str) -> Result<Value> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model.as_deref().unwrap_or(DEFAULT_MODEL),
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.2,
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

        let value: Value = response.json().await?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ServiceError::InvalidResponse("no completion content".into()))?;
        tracing::debug!(purpose, chars = content.len(), "completion received");
        Ok(parse_content(content))
    }
}

#[async_trait]
impl TextCompletion for ChatCompletionsClient {
    async fn complete(&self, prompt: &str, purpose: &str) -> wolftrace_core::Result<Value> {
        with_retries(purpose, self.config.max_retries, || {
            self.request(prompt, purpose)
        })
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pure_json() {
        let value = parse_content(r#"{"claims": ["a"], "urgency": "low"}"#);
        assert_eq!(value["urgency"], "low");
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let value = parse_content(
            "Here is the analysis:\n{\"claims\": [\"fire\"], \"urgency\": \"high\"}\nDone.",
        );
        assert_eq!(value["claims"][0], "fire");
    }

    #[test]
    fn test_parse_plain_text_falls_back_to_string() {
        let value = parse_content("no structure here");
        assert_eq!(value, Value::String("no structure here".into()));
    }

    #[test]
    fn test_parse_unbalanced_braces_falls_back() {
        let value = parse_content("} backwards {");
        assert!(value.is_string());
    }
}
