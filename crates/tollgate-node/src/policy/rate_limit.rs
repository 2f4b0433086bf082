use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use tollgate_core::error::{Result, ThrottleError};
use tollgate_core::protocol::RequestEvent;

use super::bucket::TokenBucket;
use super::definition::{compile_definition, CompiledRule};
use super::evaluator::{Evaluator, EvaluatorFactory, VerdictSink};

/// Above this many tracked keys, idle (full) buckets are pruned.
const MAX_TRACKED_KEYS: usize = 65_536;

/// Builds [`RateLimitEvaluator`]s from YAML definitions.
pub struct RateLimitFactory {
    queue_depth: usize,
}

impl RateLimitFactory {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            queue_depth: queue_depth.max(1),
        }
    }
}

impl EvaluatorFactory for RateLimitFactory {
    fn create(&self, name: &str, definition: &str, sink: VerdictSink) -> Result<Arc<dyn Evaluator>> {
        let rule = compile_definition(definition)?;
        Ok(Arc::new(RateLimitEvaluator::new(name, rule, sink, self.queue_depth)))
    }
}

/// One policy running on its own task behind a bounded input queue.
pub struct RateLimitEvaluator {
    name: Arc<str>,
    queue_depth: usize,
    // taken by `start`
    idle: Mutex<Option<(CompiledRule, VerdictSink)>>,
    input: RwLock<Option<mpsc::Sender<RequestEvent>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimitEvaluator {
    pub fn new(name: &str, rule: CompiledRule, sink: VerdictSink, queue_depth: usize) -> Self {
        Self {
            name: Arc::from(name),
            queue_depth: queue_depth.max(1),
            idle: Mutex::new(Some((rule, sink))),
            input: RwLock::new(None),
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Evaluator for RateLimitEvaluator {
    fn start(&self) -> Result<()> {
        let (rule, sink) = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ThrottleError::Internal(format!("evaluator {} already started", self.name)))?;

        let (tx, rx) = mpsc::channel(self.queue_depth);
        let handle = tokio::spawn(run_evaluator(rule, sink, rx));

        *self.input.write().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    fn submit(&self, event: RequestEvent) -> Result<()> {
        let input = self.input.read().unwrap_or_else(PoisonError::into_inner);
        let tx = input
            .as_ref()
            .ok_or_else(|| ThrottleError::dispatch(&*self.name, "evaluator not running"))?;

        tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => ThrottleError::dispatch(&*self.name, "input queue full"),
            TrySendError::Closed(_) => ThrottleError::dispatch(&*self.name, "evaluator stopped"),
        })
    }

    async fn stop(&self) {
        // Dropping the sender lets the task drain what is queued and exit.
        let tx = self.input.write().unwrap_or_else(PoisonError::into_inner).take();
        drop(tx);

        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(policy = %self.name, error = %e, "evaluator task failed");
            }
        }
    }
}

async fn run_evaluator(rule: CompiledRule, sink: VerdictSink, mut rx: mpsc::Receiver<RequestEvent>) {
    let mut buckets: HashMap<String, TokenBucket> = HashMap::new();

    while let Some(ev) = rx.recv().await {
        let throttled = match rule.throttle_key(&ev.request) {
            None => false,
            Some(key) => {
                if buckets.len() >= MAX_TRACKED_KEYS && !buckets.contains_key(&key) {
                    buckets.retain(|_, b| !b.is_full());
                }
                let bucket = buckets
                    .entry(key)
                    .or_insert_with(|| TokenBucket::new(rule.rps, rule.burst));
                !bucket.allow()
            }
        };
        sink.emit(&ev.key, throttled);
    }

    tracing::debug!(policy = %sink.policy(), "evaluator drained");
}
