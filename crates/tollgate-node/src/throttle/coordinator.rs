use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use tollgate_core::error::ThrottleError;
use tollgate_core::protocol::{CorrelationKey, DownstreamEvent, RequestEvent, ThrottleRequest};

use crate::config::{NodeConfig, TimeoutPolicy};
use crate::downstream::DownstreamSink;
use crate::obs::metrics::{GaugeVec, ThrottleMetrics};
use crate::throttle::{PolicyRegistry, ResultCorrelator};

/// Per-decision knobs.
#[derive(Debug, Clone)]
pub struct DecisionSettings {
    pub timeout: Duration,
    pub on_timeout: TimeoutPolicy,
    pub stream_id: String,
}

impl DecisionSettings {
    pub fn from_config(cfg: &NodeConfig) -> Self {
        Self {
            timeout: cfg.throttler.decision_timeout(),
            on_timeout: cfg.throttler.on_timeout,
            stream_id: cfg.downstream.request_stream_id.clone(),
        }
    }
}

/// End-to-end throttle decision: snapshot, fan out, wait, aggregate, forward.
pub struct ThrottleCoordinator {
    registry: Arc<PolicyRegistry>,
    correlator: Arc<ResultCorrelator>,
    sink: Arc<dyn DownstreamSink>,
    metrics: Arc<ThrottleMetrics>,
    settings: DecisionSettings,
    seq: AtomicU64,
}

impl ThrottleCoordinator {
    pub fn new(
        registry: Arc<PolicyRegistry>,
        correlator: Arc<ResultCorrelator>,
        sink: Arc<dyn DownstreamSink>,
        metrics: Arc<ThrottleMetrics>,
        settings: DecisionSettings,
    ) -> Self {
        Self {
            registry,
            correlator,
            sink,
            metrics,
            settings,
            seq: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &DecisionSettings {
        &self.settings
    }

    /// `true` = throttled. Never fails: faults resolve to "not throttled"
    /// (or to the configured timeout policy) and are logged.
    pub async fn decide(&self, request: ThrottleRequest) -> bool {
        let started = Instant::now();

        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            self.metrics.decisions.inc(&[("outcome", "no_policies")]);
            return false;
        }

        let _in_flight = InFlight::enter(&self.metrics.decisions_in_flight);

        let key = CorrelationKey::new(
            request.unique_key.as_str(),
            self.seq.fetch_add(1, Ordering::Relaxed),
        );
        let ticket = match self.correlator.register(key.clone(), snapshot.len()) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to register correlator");
                self.metrics.decisions.inc(&[("outcome", "error")]);
                return false;
            }
        };
        let _cleanup = self.correlator.guard(key.clone());

        let request = Arc::new(request);
        for policy in snapshot.iter() {
            let event = RequestEvent {
                key: key.clone(),
                request: Arc::clone(&request),
            };
            if let Err(e) = policy.submit(event) {
                tracing::warn!(key = %key, policy = %policy.name(), error = %e, "dispatch failed; counting as not throttled");
                self.metrics.dispatch_failures.inc(&[("policy", policy.name())]);
                self.correlator.forfeit(&key, policy.name_arc());
            }
        }

        let throttled = match self.correlator.await_verdicts(ticket, self.settings.timeout).await {
            Ok(throttled) => throttled,
            Err(e @ ThrottleError::Timeout { .. }) => {
                let outcome = self.settings.on_timeout.outcome();
                tracing::warn!(
                    key = %key,
                    api = %request.api_context,
                    error = %e,
                    throttled = outcome,
                    "throttle decision timed out"
                );
                self.metrics.timeouts.inc(&[]);
                outcome
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "throttle decision failed; failing open");
                false
            }
        };
        drop(_cleanup);

        tracing::debug!(key = %key, api = %request.api_context, throttled, "throttle decision");

        let outcome = if throttled { "throttled" } else { "allowed" };
        self.metrics.decisions.inc(&[("outcome", outcome)]);
        self.metrics
            .decide_duration
            .observe(&[("outcome", outcome)], started.elapsed());

        if !throttled {
            self.forward(&request);
        }
        throttled
    }

    /// Same as [`decide`](Self::decide) for the legacy positional tuple.
    /// A malformed tuple is logged and allowed.
    pub async fn decide_fields(&self, fields: &[Value]) -> bool {
        match ThrottleRequest::from_fields(fields) {
            Ok(request) => self.decide(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "malformed throttle request; failing open");
                self.metrics.decisions.inc(&[("outcome", "malformed")]);
                false
            }
        }
    }

    fn forward(&self, request: &ThrottleRequest) {
        let event = DownstreamEvent::from_request(&self.settings.stream_id, request);
        if let Err(e) = self.sink.publish(event) {
            tracing::warn!(key = %request.unique_key, error = %e, "downstream publish failed");
            self.metrics.downstream_failures.inc(&[]);
        }
    }
}

struct InFlight<'a>(&'a GaugeVec);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a GaugeVec) -> Self {
        gauge.inc(&[]);
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.dec(&[]);
    }
}
