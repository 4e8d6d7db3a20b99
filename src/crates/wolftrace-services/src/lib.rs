//! HTTP implementations of the external-interface traits consumed by the
//! wolftrace engine.
//!
//! `wolftrace-core` owns the traits ([`wolftrace_core::TextCompletion`],
//! [`wolftrace_core::FactCheckLookup`], [`wolftrace_core::MediaAnalysis`],
//! [`wolftrace_core::SpeechSynthesis`]); this crate provides clients for
//! concrete providers:
//!
//! - [`ChatCompletionsClient`] - any OpenAI-compatible chat endpoint
//! - [`GoogleFactCheckClient`] - Google Fact Check Tools `claims:search`
//! - [`MediaServiceClient`] - perceptual hashing and reverse video search
//! - [`TtsClient`] - speech synthesis for alert publication
//!
//! All clients share [`RemoteServiceConfig`] (`from_env` constructors,
//! builder setters) and a bounded jittered-backoff retry. Every failure is
//! mapped into the engine's `Service` error class; the knowledge sources
//! absorb those with documented fallbacks.
//!
//! ```rust,ignore
//! use wolftrace_services::{ChatCompletionsClient, RemoteServiceConfig};
//!
//! let config = RemoteServiceConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1")?
//!     .with_model("gpt-4o-mini");
//! let completion = ChatCompletionsClient::new(config)?;
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod factcheck;
pub mod media;
pub mod retry;
pub mod tts;

pub use completion::ChatCompletionsClient;
pub use config::RemoteServiceConfig;
pub use error::{Result, ServiceError};
pub use factcheck::GoogleFactCheckClient;
pub use media::MediaServiceClient;
pub use tts::TtsClient;
