use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tollgate_core::error::{Result, ThrottleError};
use tollgate_core::protocol::parse_stream_id;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub version: u32,

    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub throttler: ThrottlerSection,

    #[serde(default)]
    pub downstream: DownstreamSection,

    #[serde(default)]
    pub policies: Vec<BootPolicy>,
}

impl NodeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ThrottleError::UnsupportedVersion);
        }

        self.throttler.validate()?;
        self.downstream.validate()?;

        let mut seen = HashSet::new();
        for p in &self.policies {
            if p.name.trim().is_empty() {
                return Err(ThrottleError::BadRequest("policies[].name must not be empty".into()));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(ThrottleError::BadRequest(format!(
                    "duplicate policy name: {}",
                    p.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

/// What a decision resolves to when not every verdict arrived in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Not throttled: never block traffic on engine failure.
    #[default]
    FailOpen,
    /// Throttled.
    FailClosed,
}

impl TimeoutPolicy {
    pub fn outcome(self) -> bool {
        matches!(self, TimeoutPolicy::FailClosed)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottlerSection {
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,

    #[serde(default)]
    pub on_timeout: TimeoutPolicy,

    #[serde(default = "default_evaluator_queue_depth")]
    pub evaluator_queue_depth: usize,

    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for ThrottlerSection {
    fn default() -> Self {
        Self {
            decision_timeout_ms: default_decision_timeout_ms(),
            on_timeout: TimeoutPolicy::default(),
            evaluator_queue_depth: default_evaluator_queue_depth(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl ThrottlerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=60000).contains(&self.decision_timeout_ms) {
            return Err(ThrottleError::BadRequest(
                "throttler.decision_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        if !(1..=65536).contains(&self.evaluator_queue_depth) {
            return Err(ThrottleError::BadRequest(
                "throttler.evaluator_queue_depth must be between 1 and 65536".into(),
            ));
        }
        if !(1..=60000).contains(&self.stop_timeout_ms) {
            return Err(ThrottleError::BadRequest(
                "throttler.stop_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownstreamSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_request_stream_id")]
    pub request_stream_id: String,

    #[serde(default = "default_downstream_buffer")]
    pub buffer: usize,
}

impl Default for DownstreamSection {
    fn default() -> Self {
        Self {
            enabled: true,
            request_stream_id: default_request_stream_id(),
            buffer: default_downstream_buffer(),
        }
    }
}

impl DownstreamSection {
    pub fn validate(&self) -> Result<()> {
        parse_stream_id(&self.request_stream_id)?;
        if !(1..=1_048_576).contains(&self.buffer) {
            return Err(ThrottleError::BadRequest(
                "downstream.buffer must be between 1 and 1048576".into(),
            ));
        }
        Ok(())
    }
}

/// Policy deployed when the node boots.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootPolicy {
    pub name: String,
    pub definition: String,
}

fn default_listen() -> String {
    "0.0.0.0:9763".into()
}
fn default_decision_timeout_ms() -> u64 {
    1000
}
fn default_evaluator_queue_depth() -> usize {
    1024
}
fn default_stop_timeout_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}
fn default_request_stream_id() -> String {
    "throttle.request.stream:1.0.0".into()
}
fn default_downstream_buffer() -> usize {
    4096
}
