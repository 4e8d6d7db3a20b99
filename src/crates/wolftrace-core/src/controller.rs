//! The blackboard controller: priority scheduling of knowledge sources.
//!
//! The graph store hands every mutation record to [`BlackboardController::notify`],
//! which derives the trigger event type, applies the per-case anti-loop cap,
//! each source's trigger set, condition gate, dedup and cooldown, and
//! enqueues eligible work on a binary heap ordered by `(priority, seq)` with
//! strict FIFO tie-break. Worker tasks drain the heap, run each source under
//! a timeout, and update the bookkeeping no matter how the handler exits, so
//! a failing or hanging source never poisons its case.
//!
//! `notify` is synchronous and enqueue-only; handlers are never run inline.
//! Together with the store calling it under the aggregate lock, this makes
//! the dedup/cooldown accounting race-free without re-entrant locks.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::{Mutation, MutationSink};

/// Scheduling priority of a knowledge source. Lower value runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Must run before anything else reacts (clustering).
    Critical = 0,
    /// Evidence-bearing analysis (forensics, debunk propagation).
    High = 1,
    /// Enrichment (network analysis, cross-reference).
    Medium = 2,
    /// Derived labelling (semantic roles).
    Low = 3,
    /// Summarisation that can always wait (case synthesis).
    Background = 4,
}

/// A trigger-driven analysis module scheduled by the controller.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Unique registration name.
    fn name(&self) -> &str;

    /// Scheduling priority.
    fn priority(&self) -> Priority;

    /// Event types this source reacts to, e.g. `node:report`.
    fn trigger_event_types(&self) -> Vec<String>;

    /// Extra gate evaluated against the triggering mutation.
    fn condition(&self, _mutation: &Mutation) -> bool {
        true
    }

    /// Per-(source, case) cooldown; `None` uses the engine default.
    fn cooldown(&self) -> Option<Duration> {
        None
    }

    /// Run the analysis. Reads the graph and produces further mutations
    /// through the graph store. External failures should be absorbed here;
    /// a returned error is logged and the task is not retried.
    async fn run(&self, mutation: Mutation) -> Result<()>;
}

struct QueuedTask {
    priority: Priority,
    seq: u64,
    source: Arc<dyn KnowledgeSource>,
    case_id: String,
    event_type: String,
    mutation: Mutation,
}

impl QueuedTask {
    fn key(&self) -> (u8, u64) {
        (self.priority as u8, self.seq)
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

#[derive(Default)]
struct SchedulerState {
    queue: BinaryHeap<Reverse<QueuedTask>>,
    /// (source, case) pairs queued or running right now.
    active: HashSet<(String, String)>,
    last_run: HashMap<(String, String), Instant>,
    trigger_count: HashMap<String, u32>,
    last_mutation_at: HashMap<String, Instant>,
    seq: u64,
}

/// Point-in-time scheduler counters, for diagnostics and tests.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStats {
    /// Tasks waiting in the priority queue.
    pub queued: usize,
    /// (source, case) pairs queued or running.
    pub active: usize,
    /// Total tasks ever enqueued.
    pub total_enqueued: u64,
}

/// Priority-driven, event-triggered scheduler over a fixed set of
/// knowledge sources.
pub struct BlackboardController {
    config: EngineConfig,
    sources: RwLock<Vec<Arc<dyn KnowledgeSource>>>,
    state: Mutex<SchedulerState>,
    wakeup: Notify,
    shutdown: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BlackboardController {
    /// Create a controller with no workers running yet.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            sources: RwLock::new(Vec::new()),
            state: Mutex::new(SchedulerState::default()),
            wakeup: Notify::new(),
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Register a knowledge source. A duplicate name is ignored with a
    /// warning.
    pub fn register(&self, source: Arc<dyn KnowledgeSource>) {
        let mut sources = self.sources.write();
        if sources.iter().any(|s| s.name() == source.name()) {
            tracing::warn!(source = source.name(), "knowledge source already registered");
            return;
        }
        tracing::info!(
            source = source.name(),
            priority = ?source.priority(),
            triggers = ?source.trigger_event_types(),
            "knowledge source registered"
        );
        sources.push(source);
    }

    /// Names of the registered sources, in registration order.
    pub fn registered_sources(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name().to_string()).collect()
    }

    /// Classify one mutation record and enqueue eligible sources.
    ///
    /// Called synchronously by the graph store for every mutation, in
    /// mutation order. Returns as soon as eligible sources are enqueued.
    pub fn notify(&self, mutation: &Mutation) {
        let case_id = mutation.case_id().to_string();
        if case_id.is_empty() {
            tracing::debug!("mutation without case id dropped");
            return;
        }
        let event_type = mutation.event_type();
        let now = Instant::now();
        let sources = self.sources.read();
        let mut state = self.state.lock();

        if let Some(idle) = self.config.trigger_reset_idle() {
            if let Some(last) = state.last_mutation_at.get(&case_id) {
                if now.saturating_duration_since(*last) >= idle {
                    tracing::info!(case_id, "case idle past reset interval, trigger count reset");
                    state.trigger_count.insert(case_id.clone(), 0);
                }
            }
        }
        state.last_mutation_at.insert(case_id.clone(), now);

        let cap = self.config.max_triggers_per_case;
        if state.trigger_count.get(&case_id).copied().unwrap_or(0) >= cap {
            tracing::warn!(case_id, event_type, cap, "trigger cap reached, case quiesced");
            return;
        }

        for source in sources.iter() {
            if !source.trigger_event_types().iter().any(|t| t == &event_type) {
                continue;
            }
            if !source.condition(mutation) {
                continue;
            }
            let key = (source.name().to_string(), case_id.clone());
            if state.active.contains(&key) {
                tracing::debug!(source = source.name(), case_id, "already active, skipped");
                continue;
            }
            let cooldown = source.cooldown().unwrap_or_else(|| self.config.default_cooldown());
            if let Some(last) = state.last_run.get(&key) {
                if now.saturating_duration_since(*last) < cooldown {
                    tracing::debug!(source = source.name(), case_id, "cooling down, skipped");
                    continue;
                }
            }
            let count = state.trigger_count.entry(case_id.clone()).or_insert(0);
            if *count >= cap {
                tracing::warn!(case_id, cap, "trigger cap reached mid-classification");
                break;
            }
            *count += 1;

            state.seq += 1;
            let seq = state.seq;
            tracing::debug!(
                source = source.name(),
                case_id,
                event_type,
                seq,
                "task enqueued"
            );
            state.queue.push(Reverse(QueuedTask {
                priority: source.priority(),
                seq,
                source: source.clone(),
                case_id: case_id.clone(),
                event_type: event_type.clone(),
                mutation: mutation.clone(),
            }));
            state.active.insert(key);
            self.wakeup.notify_one();
        }
    }

    /// Launch the worker tasks. Idempotent while running.
    pub fn start(self: &Arc<Self>) {
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return;
        }
        self.shutdown.store(false, Ordering::SeqCst);
        for worker_id in 0..self.config.worker_concurrency {
            let controller = self.clone();
            workers.push(tokio::spawn(async move {
                controller.worker_loop(worker_id).await;
            }));
        }
    }

    /// Stop dequeueing, let running handlers finish, then clear the queue
    /// and the active set.
    pub async fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wakeup.notify_waiters();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
        let mut state = self.state.lock();
        state.queue.clear();
        state.active.clear();
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        tracing::debug!(worker_id, "controller worker started");
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            let task = self.state.lock().queue.pop();
            let Some(Reverse(task)) = task else {
                // A stored notify permit makes enqueue wakeups immediate;
                // the tick bounds the shutdown wakeup race.
                tokio::select! {
                    _ = self.wakeup.notified() => {}
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                }
                continue;
            };

            let source_name = task.source.name().to_string();
            tracing::debug!(
                worker_id,
                source = %source_name,
                case_id = %task.case_id,
                event_type = %task.event_type,
                "running knowledge source"
            );

            let budget = self.config.handler_timeout();
            let outcome = if budget.is_zero() {
                Ok(task.source.run(task.mutation.clone()).await)
            } else {
                tokio::time::timeout(budget, task.source.run(task.mutation.clone())).await
            };

            // Bookkeeping happens regardless of how the handler exited.
            {
                let mut state = self.state.lock();
                let key = (source_name.clone(), task.case_id.clone());
                state.last_run.insert(key.clone(), Instant::now());
                state.active.remove(&key);
            }

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(
                        source = %source_name,
                        case_id = %task.case_id,
                        %error,
                        "knowledge source failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        source = %source_name,
                        case_id = %task.case_id,
                        timeout_seconds = self.config.handler_timeout_seconds,
                        "knowledge source timed out, cancelled"
                    );
                }
            }
        }
        tracing::debug!(worker_id, "controller worker stopped");
    }

    /// True when nothing is queued or running.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.queue.is_empty() && state.active.is_empty()
    }

    /// Tasks ever enqueued for a case.
    pub fn trigger_count(&self, case_id: &str) -> u32 {
        self.state
            .lock()
            .trigger_count
            .get(case_id)
            .copied()
            .unwrap_or(0)
    }

    /// Current scheduler counters.
    pub fn stats(&self) -> ControllerStats {
        let state = self.state.lock();
        ControllerStats {
            queued: state.queue.len(),
            active: state.active.len(),
            total_enqueued: state.seq,
        }
    }
}

impl MutationSink for BlackboardController {
    fn deliver(&self, mutation: &Mutation) {
        self.notify(mutation);
    }
}
