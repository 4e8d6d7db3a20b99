//! # wolftrace-core - Blackboard Orchestration Engine
//!
//! The reactive core of wolftrace: anonymous campus-safety tips feed a
//! per-incident knowledge graph of reports, media variants, fact-checks
//! and external sources, and every mutation is broadcast to live
//! observers. A fixed set of analysis tasks ("knowledge sources") runs
//! against the shared graph under a priority-driven, event-triggered
//! controller that deduplicates, throttles and bounds the reactive
//! cascade.
//!
//! ## Components
//!
//! - [`GraphStore`] - the authoritative in-process graph. Every mutation
//!   atomically produces one [`Mutation`] record, delivered first to
//!   caseboard subscribers, then to the controller.
//! - [`BlackboardController`] - derives trigger event types from mutation
//!   records, applies dedup, cooldowns and the per-case anti-loop cap, and
//!   schedules [`KnowledgeSource`]s by `(priority, seq)`.
//! - [`sources`] - the seven standard knowledge sources (clustering,
//!   forensics, debunk propagation, network analysis, cross-reference,
//!   role classification, case synthesis).
//! - [`StreamFanout`] - best-effort, in-order, non-blocking delivery to
//!   caseboard and alert observers; slow subscribers are dropped.
//! - [`EventBus`] - fire-and-forget dispatch of non-graph domain events.
//! - [`Engine`] - wires all of the above behind one lifecycle.
//!
//! ## Reactive loop
//!
//! ```text
//! mutation -> GraphStore -> fan-out -> subscribers
//!                        -> Controller.notify -> priority queue
//!                                                    |
//!               further mutations <- KnowledgeSource.run <- worker
//! ```
//!
//! Each handler's mutations re-enter `notify`, so cascades are bounded by
//! per-source cooldowns and a per-case trigger cap; every case reaches a
//! fixed point in finite time.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wolftrace_core::{Engine, EngineConfig, ServiceBundle};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wolftrace_core::CoreError> {
//!     let engine = Engine::new(EngineConfig::default(), ServiceBundle::noop())?;
//!     engine.start();
//!
//!     engine.ingest_report("C1", json!({
//!         "text": "fire alarm at hunt library",
//!         "timestamp": "2025-03-01T12:00:00Z",
//!         "location": {"lat": 35.7847, "lng": -78.6821}
//!     }))?;
//!
//!     engine.quiesced(std::time::Duration::from_secs(5)).await;
//!     let snapshot = engine.store().case_snapshot("C1");
//!     println!("case has {} nodes", snapshot.nodes.len());
//!
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod graph;
pub mod services;
pub mod sources;

pub use bus::{EventBus, EventHandler, FnHandler};
pub use config::EngineConfig;
pub use controller::{BlackboardController, ControllerStats, KnowledgeSource, Priority};
pub use engine::{Engine, TOPIC_EDGE_CREATED, TOPIC_REPORT_RECEIVED};
pub use error::{CoreError, Result};
pub use fanout::{ChannelSink, StreamFanout, StreamMessage, StreamSink};
pub use graph::{
    CaseSnapshot, CaseSummary, Edge, EdgeKind, GeoPoint, GraphStore, Mutation, MutationSink, Node,
    NodeData, NodeKind,
};
pub use services::{
    FactCheckLookup, FactCheckReview, MediaAnalysis, NoopCompletion, NoopFactCheck, NoopMedia,
    NoopSpeech, ServiceBundle, SpeechSynthesis, TextCompletion, VideoMatch,
};
