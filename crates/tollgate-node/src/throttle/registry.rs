use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Mutex;

use tollgate_core::error::{Result, ThrottleError};
use tollgate_core::protocol::RequestEvent;

use crate::policy::{Evaluator, EvaluatorFactory, VerdictSink};
use crate::throttle::ResultCorrelator;

/// A named policy backed by one running evaluator.
pub struct Policy {
    name: Arc<str>,
    evaluator: Arc<dyn Evaluator>,
}

impl Policy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn submit(&self, event: RequestEvent) -> Result<()> {
        self.evaluator.submit(event)
    }
}

/// Active set as seen by one dispatch. Count is the length; they cannot disagree.
pub struct PolicySnapshot {
    policies: Vec<Arc<Policy>>,
}

impl PolicySnapshot {
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Policy>> {
        self.policies.iter()
    }
}

/// Dynamic set of active policies.
///
/// Deploy/undeploy are serialized by `lifecycle`; the active map lives behind a
/// single lock so a snapshot's set and count come from one read. A policy
/// leaves the map before its evaluator starts shutting down.
pub struct PolicyRegistry {
    factory: Arc<dyn EvaluatorFactory>,
    correlator: Arc<ResultCorrelator>,
    active: RwLock<HashMap<Arc<str>, Arc<Policy>>>,
    lifecycle: Mutex<()>,
    stop_timeout: Duration,
}

impl PolicyRegistry {
    pub fn new(
        factory: Arc<dyn EvaluatorFactory>,
        correlator: Arc<ResultCorrelator>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            factory,
            correlator,
            active: RwLock::new(HashMap::new()),
            lifecycle: Mutex::new(()),
            stop_timeout,
        }
    }

    /// Build, start and activate a policy, replacing any policy with the same name.
    ///
    /// The replacement is compiled and started before the old policy is touched,
    /// so a replacement that fails either step leaves the running one in place.
    /// Names are trimmed here and in [`undeploy`](Self::undeploy).
    pub async fn deploy(&self, name: &str, definition: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ThrottleError::Configuration("policy name must not be empty".into()));
        }

        let _lifecycle = self.lifecycle.lock().await;

        let name: Arc<str> = Arc::from(name);
        let sink = VerdictSink::new(Arc::clone(&name), Arc::clone(&self.correlator));
        let evaluator = self
            .factory
            .create(&name, definition, sink)
            .map_err(|e| match e {
                ThrottleError::Configuration(_) => e,
                other => ThrottleError::Configuration(other.to_string()),
            })?;

        evaluator.start().map_err(|e| {
            tracing::error!(policy = %name, error = %e, "evaluator failed to start");
            ThrottleError::Configuration(format!("policy {name} failed to start: {e}"))
        })?;

        let policy = Arc::new(Policy {
            name: Arc::clone(&name),
            evaluator,
        });
        // Swap in one write so dispatch never sees the name unbound.
        let replaced = self.write().insert(Arc::clone(&name), policy);
        if let Some(old) = replaced {
            tracing::info!(policy = %name, "replaced deployed policy");
            self.stop_policy(&old).await;
        }

        tracing::info!(policy = %name, "policy deployed");
        Ok(())
    }

    /// Remove and drain a policy. Returns `false` when nothing was deployed under `name`.
    pub async fn undeploy(&self, name: &str) -> bool {
        let name = name.trim();
        let _lifecycle = self.lifecycle.lock().await;

        let Some(policy) = self.take(name) else {
            tracing::debug!(policy = %name, "undeploy: not deployed");
            return false;
        };
        self.stop_policy(&policy).await;

        tracing::info!(policy = %name, "policy undeployed");
        true
    }

    pub fn snapshot(&self) -> PolicySnapshot {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        PolicySnapshot {
            policies: active.values().cloned().collect(),
        }
    }

    /// Sorted policy names.
    pub fn names(&self) -> Vec<String> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = active.keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.active.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Undeploy everything, draining evaluators concurrently.
    pub async fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let drained: Vec<Arc<Policy>> = self.write().drain().map(|(_, p)| p).collect();
        let count = drained.len();
        join_all(drained.iter().map(|p| self.stop_policy(p))).await;

        tracing::info!(count, "policy registry shut down");
    }

    fn take(&self, name: &str) -> Option<Arc<Policy>> {
        self.write().remove(name)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Arc<str>, Arc<Policy>>> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn stop_policy(&self, policy: &Policy) {
        if tokio::time::timeout(self.stop_timeout, policy.evaluator.stop())
            .await
            .is_err()
        {
            tracing::warn!(
                policy = %policy.name,
                timeout_ms = self.stop_timeout.as_millis() as u64,
                "evaluator did not drain before stop timeout"
            );
        }
    }
}
