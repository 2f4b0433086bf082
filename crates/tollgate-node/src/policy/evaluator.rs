use std::sync::Arc;

use async_trait::async_trait;

use tollgate_core::error::Result;
use tollgate_core::protocol::{CorrelationKey, RequestEvent};

use crate::throttle::ResultCorrelator;

/// One running policy instance.
///
/// `submit` must not block: a full or closed input is reported as
/// `ThrottleError::Dispatch` and counted by the caller as a "not throttled"
/// vote. Every accepted event gets exactly one verdict, including events
/// still queued when `stop` is called.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn start(&self) -> Result<()>;
    fn submit(&self, event: RequestEvent) -> Result<()>;
    /// Close the input, answer everything already queued, release resources.
    async fn stop(&self);
}

/// Builds evaluators from policy definitions.
pub trait EvaluatorFactory: Send + Sync {
    /// A malformed definition is a `ThrottleError::Configuration`.
    fn create(&self, name: &str, definition: &str, sink: VerdictSink) -> Result<Arc<dyn Evaluator>>;
}

/// Verdict callback handed to an evaluator at construction.
/// Bound to one policy name; records into the correlator table.
#[derive(Clone)]
pub struct VerdictSink {
    policy: Arc<str>,
    correlator: Arc<ResultCorrelator>,
}

impl VerdictSink {
    pub fn new(policy: Arc<str>, correlator: Arc<ResultCorrelator>) -> Self {
        Self { policy, correlator }
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub fn emit(&self, key: &CorrelationKey, throttled: bool) {
        self.correlator.record(key, &self.policy, throttled);
    }
}
