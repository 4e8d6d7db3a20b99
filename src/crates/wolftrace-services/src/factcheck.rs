//! Google Fact Check Tools `claims:search` client implementing the
//! engine's `FactCheckLookup` contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::RemoteServiceConfig;
use crate::error::{Result, ServiceError};
use crate::retry::with_retries;
use wolftrace_core::{FactCheckLookup, FactCheckReview};

/// Map a `claims:search` response body to reviews.
pub fn parse_reviews(value: &Value) -> Vec<FactCheckReview> {
    let Some(claims) = value.get("claims").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut reviews = Vec::new();
    for claim in claims {
        let claimant = claim
            .get("claimant")
            .and_then(Value::as_str)
            .map(str::to_string);
        let Some(claim_reviews) = claim.get("claimReview").and_then(Value::as_array) else {
            continue;
        };
        for review in claim_reviews {
            reviews.push(FactCheckReview {
                claimant: claimant.clone(),
                rating: review
                    .get("textualRating")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                url: review.get("url").and_then(Value::as_str).map(str::to_string),
                reviewer: review
                    .pointer("/publisher/name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
    }
    reviews
}

/// Fact-check lookup over the Google Fact Check Tools API.
#[derive(Debug)]
pub struct GoogleFactCheckClient {
    config: RemoteServiceConfig,
    client: reqwest::Client,
}

impl GoogleFactCheckClient {
    /// Create a client over `config`; the API key is required.
    pub fn new(config: RemoteServiceConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(ServiceError::Config(
                "fact-check client requires an API key".into(),
            ));
        }
        let client = config.http_client()?;
        Ok(Self { config, client })
    }

    async fn request(&self, claim: &str) -> Result<Vec<FactCheckReview>> {
        let url = format!("{}/claims:search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", claim),
                ("key", self.config.api_key.as_deref().unwrap_or_default()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }
        let value: Value = response.json().await?;
        Ok(parse_reviews(&value))
    }
}

#[async_trait]
impl FactCheckLookup for GoogleFactCheckClient {
    async fn lookup(&self, claim: &str) -> wolftrace_core::Result<Vec<FactCheckReview>> {
        with_retries("fact_check_lookup", self.config.max_retries, || {
            self.request(claim)
        })
        .await
        .map_err(Into::into)
    }
}
