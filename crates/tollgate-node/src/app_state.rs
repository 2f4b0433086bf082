//! Shared application state for the tollgate node.
//!
//! Wires correlator, policy registry, downstream sink and coordinator from
//! config. Startup errors are explicit (Result instead of panic).

use std::sync::Arc;

use tollgate_core::error::{Result, ThrottleError};
use tollgate_core::protocol::ThrottleRequest;

use crate::config::NodeConfig;
use crate::downstream::{sink_from_config, DownstreamSink};
use crate::obs::metrics::ThrottleMetrics;
use crate::policy::{EvaluatorFactory, RateLimitFactory};
use crate::throttle::{DecisionSettings, PolicyRegistry, ResultCorrelator, ThrottleCoordinator};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: NodeConfig,
    correlator: Arc<ResultCorrelator>,
    registry: Arc<PolicyRegistry>,
    coordinator: Arc<ThrottleCoordinator>,
    metrics: Arc<ThrottleMetrics>,
}

impl AppState {
    /// State with the built-in rate-limit evaluator and a config-selected sink.
    /// No policies are deployed yet; see [`boot`](Self::boot).
    /// Must be called from within a tokio runtime (spawns the downstream forwarder).
    pub fn new(cfg: NodeConfig) -> Result<Self> {
        let factory = Arc::new(RateLimitFactory::new(cfg.throttler.evaluator_queue_depth));
        let sink = sink_from_config(&cfg.downstream)?;
        Ok(Self::with_parts(cfg, factory, sink))
    }

    /// State with caller-supplied evaluator factory and downstream sink.
    pub fn with_parts(
        cfg: NodeConfig,
        factory: Arc<dyn EvaluatorFactory>,
        sink: Arc<dyn DownstreamSink>,
    ) -> Self {
        let correlator = Arc::new(ResultCorrelator::new());
        let registry = Arc::new(PolicyRegistry::new(
            factory,
            Arc::clone(&correlator),
            cfg.throttler.stop_timeout(),
        ));
        let metrics = Arc::new(ThrottleMetrics::default());
        let coordinator = Arc::new(ThrottleCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&correlator),
            sink,
            Arc::clone(&metrics),
            DecisionSettings::from_config(&cfg),
        ));

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                correlator,
                registry,
                coordinator,
                metrics,
            }),
        }
    }

    /// [`new`](Self::new) plus deployment of the configured boot policies.
    pub async fn boot(cfg: NodeConfig) -> Result<Self> {
        let state = Self::new(cfg)?;
        state.deploy_boot_policies().await?;
        Ok(state)
    }

    pub async fn deploy_boot_policies(&self) -> Result<()> {
        for p in &self.inner.cfg.policies {
            self.inner
                .registry
                .deploy(&p.name, &p.definition)
                .await
                .map_err(|e| {
                    ThrottleError::Configuration(format!("boot policy {} rejected: {e}", p.name))
                })?;
        }
        tracing::info!(count = self.inner.cfg.policies.len(), "boot policies deployed");
        Ok(())
    }

    pub fn cfg(&self) -> &NodeConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<PolicyRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn correlator(&self) -> Arc<ResultCorrelator> {
        Arc::clone(&self.inner.correlator)
    }

    pub fn coordinator(&self) -> Arc<ThrottleCoordinator> {
        Arc::clone(&self.inner.coordinator)
    }

    pub fn metrics(&self) -> Arc<ThrottleMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub async fn decide(&self, request: ThrottleRequest) -> bool {
        self.inner.coordinator.decide(request).await
    }

    pub async fn deploy_policy(&self, name: &str, definition: &str) -> Result<()> {
        self.inner.registry.deploy(name, definition).await
    }

    pub async fn undeploy_policy(&self, name: &str) -> bool {
        self.inner.registry.undeploy(name).await
    }

    pub fn render_metrics(&self) -> String {
        self.inner.metrics.render(&[
            ("tollgate_active_policies", self.inner.registry.len() as u64),
            ("tollgate_correlators_in_flight", self.inner.correlator.in_flight() as u64),
            ("tollgate_dropped_verdicts_total", self.inner.correlator.dropped_verdicts()),
        ])
    }

    /// Drain and undeploy every policy.
    pub async fn shutdown(&self) {
        self.inner.registry.shutdown().await;
    }
}
