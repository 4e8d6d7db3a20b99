//! External-interface traits consumed by the knowledge sources.
//!
//! The engine is an orchestration core, not a client library: it owns the
//! traits, and provider crates implement them. Every method is best-effort;
//! callers absorb failures with documented fallbacks (empty claims, empty
//! review list, no hash) so controller bookkeeping is never corrupted by a
//! flaky upstream. The `Noop*` implementations are the offline and test
//! default.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;

/// One published fact-check review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheckReview {
    /// Who made the original claim, when known.
    pub claimant: Option<String>,
    /// Textual rating, e.g. "False" or "Missing context".
    pub rating: Option<String>,
    /// URL of the published review.
    pub url: Option<String>,
    /// Organisation that published the review.
    pub reviewer: Option<String>,
}

/// One result of a reverse video/image search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMatch {
    /// Where the matching media was found.
    pub source: String,
    /// Match confidence, 0.0..=1.0.
    pub score: f64,
}

/// AI text completion used for claim extraction and case synthesis.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete `prompt`. `purpose` names the calling analysis so a provider
    /// can route to different models. Returns structured JSON when the
    /// provider manages it, otherwise a JSON string of raw text.
    async fn complete(&self, prompt: &str, purpose: &str) -> Result<Value>;
}

/// Fact-check claim lookup.
#[async_trait]
pub trait FactCheckLookup: Send + Sync {
    /// Look up published reviews of a claim. Empty on no match.
    async fn lookup(&self, claim: &str) -> Result<Vec<FactCheckReview>>;
}

/// Perceptual hashing and reverse search of media.
#[async_trait]
pub trait MediaAnalysis: Send + Sync {
    /// 64-bit perceptual hash of the media behind `url`, when computable.
    async fn phash(&self, url: &str) -> Result<Option<u64>>;

    /// Reverse-search for media matching `query`. Empty on no match.
    async fn video_search(&self, query: &str) -> Result<Vec<VideoMatch>>;
}

/// Text-to-speech, used only by alert publication.
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    /// Synthesise `text` into audio bytes, when the provider can.
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>>;
}

/// Completion provider that always returns null.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCompletion;

#[async_trait]
impl TextCompletion for NoopCompletion {
    async fn complete(&self, _prompt: &str, _purpose: &str) -> Result<Value> {
        Ok(Value::Null)
    }
}

/// Fact-check provider that never finds a review.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFactCheck;

#[async_trait]
impl FactCheckLookup for NoopFactCheck {
    async fn lookup(&self, _claim: &str) -> Result<Vec<FactCheckReview>> {
        Ok(Vec::new())
    }
}

/// Media provider that cannot hash or search.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMedia;

#[async_trait]
impl MediaAnalysis for NoopMedia {
    async fn phash(&self, _url: &str) -> Result<Option<u64>> {
        Ok(None)
    }

    async fn video_search(&self, _query: &str) -> Result<Vec<VideoMatch>> {
        Ok(Vec::new())
    }
}

/// Speech provider that produces no audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSpeech;

#[async_trait]
impl SpeechSynthesis for NoopSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// The external collaborators handed to the engine at construction.
#[derive(Clone)]
pub struct ServiceBundle {
    /// AI text completion.
    pub completion: Arc<dyn TextCompletion>,
    /// Fact-check lookup.
    pub fact_check: Arc<dyn FactCheckLookup>,
    /// Media hashing and reverse search.
    pub media: Arc<dyn MediaAnalysis>,
    /// Text-to-speech.
    pub speech: Arc<dyn SpeechSynthesis>,
}

impl ServiceBundle {
    /// A bundle of no-op providers; analysis degrades to pure graph math.
    pub fn noop() -> Self {
        Self {
            completion: Arc::new(NoopCompletion),
            fact_check: Arc::new(NoopFactCheck),
            media: Arc::new(NoopMedia),
            speech: Arc::new(NoopSpeech),
        }
    }
}

impl Default for ServiceBundle {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_providers_return_empty() {
        let bundle = ServiceBundle::noop();
        assert_eq!(
            bundle.completion.complete("p", "test").await.unwrap(),
            Value::Null
        );
        assert!(bundle.fact_check.lookup("claim").await.unwrap().is_empty());
        assert!(bundle.media.phash("http://x/y.jpg").await.unwrap().is_none());
        assert!(bundle.media.video_search("q").await.unwrap().is_empty());
        assert!(bundle.speech.synthesize("hi").await.unwrap().is_none());
    }
}
