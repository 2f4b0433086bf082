//! Scripted evaluator test double shared by node tests.
//!
//! A definition is `"<mode> [delay_ms]"` where mode is one of
//! `allow`, `throttle`, `silent` (accepts, never replies) or
//! `refuse` (rejects every submit) or `nostart` (fails to start).
//! Anything else is a configuration error.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tollgate_core::error::{Result, ThrottleError};
use tollgate_core::protocol::{DownstreamEvent, RequestEvent, ThrottleRequest};
use tollgate_node::app_state::AppState;
use tollgate_node::config::{self, NodeConfig};
use tollgate_node::downstream::ChannelSink;
use tollgate_node::policy::{Evaluator, EvaluatorFactory, VerdictSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Allow,
    Throttle,
    Silent,
    Refuse,
    NoStart,
}

/// Per-instance counters, keyed by policy name in the factory.
#[derive(Default)]
pub struct Tracker {
    pub submitted: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
}

#[derive(Default)]
pub struct ScriptedFactory {
    trackers: Mutex<HashMap<String, Vec<Arc<Tracker>>>>,
}

impl ScriptedFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Trackers for every instance created under `name`, oldest first.
    pub fn trackers(&self, name: &str) -> Vec<Arc<Tracker>> {
        self.trackers.lock().unwrap().get(name).cloned().unwrap_or_default()
    }

    pub fn submitted(&self, name: &str) -> usize {
        self.trackers(name)
            .iter()
            .map(|p| p.submitted.load(Ordering::SeqCst))
            .sum()
    }
}

pub fn parse_script(definition: &str) -> Result<(Mode, Duration)> {
    let mut parts = definition.split_whitespace();
    let mode = match parts.next() {
        Some("allow") => Mode::Allow,
        Some("throttle") => Mode::Throttle,
        Some("silent") => Mode::Silent,
        Some("refuse") => Mode::Refuse,
        Some("nostart") => Mode::NoStart,
        other => {
            return Err(ThrottleError::Configuration(format!("unknown script mode: {other:?}")))
        }
    };
    let delay = match parts.next() {
        Some(ms) => Duration::from_millis(
            ms.parse()
                .map_err(|_| ThrottleError::Configuration(format!("bad delay: {ms}")))?,
        ),
        None => Duration::ZERO,
    };
    Ok((mode, delay))
}

impl EvaluatorFactory for ScriptedFactory {
    fn create(&self, name: &str, definition: &str, sink: VerdictSink) -> Result<Arc<dyn Evaluator>> {
        let (mode, delay) = parse_script(definition)?;
        let tracker = Arc::new(Tracker::default());
        self.trackers
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push(Arc::clone(&tracker));
        Ok(Arc::new(ScriptedEvaluator {
            mode,
            delay,
            sink,
            tracker,
            running: AtomicBool::new(false),
        }))
    }
}

pub struct ScriptedEvaluator {
    mode: Mode,
    delay: Duration,
    sink: VerdictSink,
    tracker: Arc<Tracker>,
    running: AtomicBool,
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    fn start(&self) -> Result<()> {
        if self.mode == Mode::NoStart {
            return Err(ThrottleError::Internal("scripted start failure".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        self.tracker.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn submit(&self, event: RequestEvent) -> Result<()> {
        if self.mode == Mode::Refuse || !self.running.load(Ordering::SeqCst) {
            return Err(ThrottleError::dispatch(self.sink.policy(), "not accepting"));
        }
        self.tracker.submitted.fetch_add(1, Ordering::SeqCst);

        let verdict = match self.mode {
            Mode::Throttle => true,
            Mode::Allow => false,
            Mode::Silent | Mode::Refuse | Mode::NoStart => return Ok(()),
        };
        let sink = self.sink.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            sink.emit(&event.key, verdict);
        });
        Ok(())
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.tracker.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config(timeout_ms: u64, extra: &str) -> NodeConfig {
    let yaml = format!(
        "version: 1\nthrottler:\n  decision_timeout_ms: {timeout_ms}\n  stop_timeout_ms: 1000\n{extra}"
    );
    config::load_from_str(&yaml).expect("test config must parse")
}

/// Node backed by the scripted factory and a channel sink.
pub fn scripted_node(
    timeout_ms: u64,
) -> (AppState, Arc<ScriptedFactory>, tokio::sync::mpsc::Receiver<DownstreamEvent>) {
    scripted_node_with(test_config(timeout_ms, ""))
}

pub fn scripted_node_with(
    cfg: NodeConfig,
) -> (AppState, Arc<ScriptedFactory>, tokio::sync::mpsc::Receiver<DownstreamEvent>) {
    let factory = ScriptedFactory::new();
    let (sink, rx) = ChannelSink::new(64);
    let state = AppState::with_parts(cfg, factory.clone(), Arc::new(sink));
    (state, factory, rx)
}

pub fn request(key: &str) -> ThrottleRequest {
    let mut props = BTreeMap::new();
    props.insert("ip".to_string(), "10.0.0.1".to_string());
    ThrottleRequest {
        unique_key: key.to_string(),
        consumer_key: "consumer-a".to_string(),
        api_context: "/pizzashack".to_string(),
        api_version: "1.0.0".to_string(),
        resource_key: "/menu".to_string(),
        http_verb: "GET".to_string(),
        properties: Some(props),
        trailing: Vec::new(),
    }
}

/// Drain whatever the sink has buffered right now.
pub fn forwarded(rx: &mut tokio::sync::mpsc::Receiver<DownstreamEvent>) -> Vec<DownstreamEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}
