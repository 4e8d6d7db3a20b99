//! Shared application state for the API handlers.

use std::sync::Arc;

use wolftrace_core::{Engine, SpeechSynthesis};

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The blackboard engine.
    pub engine: Arc<Engine>,
    /// Speech synthesis for alert publication.
    pub speech: Arc<dyn SpeechSynthesis>,
}

impl AppState {
    /// Create the state.
    pub fn new(engine: Arc<Engine>, speech: Arc<dyn SpeechSynthesis>) -> Self {
        Self { engine, speech }
    }
}
