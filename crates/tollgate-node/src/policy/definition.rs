//! Rate-limit policy definitions.
//!
//! A definition is a strict YAML document:
//!
//! ```yaml
//! match:
//!   api_context: "/pizzashack/*"
//!   http_verb: "GET"
//!   properties: { ip: "10.0.0.1" }
//! key: consumer_api
//! limit: { rps: 10, burst: 10 }
//! ```
//!
//! Match values support `*` (any) and a trailing `*` (prefix).

use std::collections::BTreeMap;

use serde::Deserialize;

use tollgate_core::error::{Result, ThrottleError};
use tollgate_core::protocol::ThrottleRequest;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitDefinition {
    #[serde(default, rename = "match")]
    pub matcher: MatchSection,
    #[serde(default)]
    pub key: ThrottleKey,
    pub limit: LimitSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchSection {
    #[serde(default)]
    pub api_context: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub http_verb: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitSection {
    pub rps: u32,
    pub burst: u32,
}

/// Which requests share one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleKey {
    Global,
    Consumer,
    Api,
    #[default]
    ConsumerApi,
    Resource,
}

impl RateLimitDefinition {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| ThrottleError::Configuration(format!("invalid policy definition: {e}")))
    }

    pub fn compile(&self) -> Result<CompiledRule> {
        if self.limit.rps == 0 {
            return Err(ThrottleError::Configuration("limit.rps must be at least 1".into()));
        }
        if self.limit.burst == 0 {
            return Err(ThrottleError::Configuration("limit.burst must be at least 1".into()));
        }

        let m = &self.matcher;
        let mut properties = Vec::with_capacity(m.properties.len());
        for (name, raw) in &m.properties {
            properties.push((name.clone(), Pattern::compile(raw, "match.properties")?));
        }

        Ok(CompiledRule {
            api_context: compile_opt(&m.api_context, "match.api_context")?,
            api_version: compile_opt(&m.api_version, "match.api_version")?,
            resource: compile_opt(&m.resource, "match.resource")?,
            http_verb: compile_opt(&m.http_verb, "match.http_verb")?,
            properties,
            key: self.key,
            rps: self.limit.rps,
            burst: self.limit.burst,
        })
    }
}

/// Parse and compile in one step.
pub fn compile_definition(raw: &str) -> Result<CompiledRule> {
    RateLimitDefinition::parse(raw)?.compile()
}

#[derive(Debug, Clone)]
enum Pattern {
    Any,
    Exact(String),
    Prefix(String),
}

impl Pattern {
    fn compile(raw: &str, field: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(ThrottleError::Configuration(format!("{field} must not be empty")));
        }
        if raw == "*" {
            return Ok(Pattern::Any);
        }
        match raw.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => Err(ThrottleError::Configuration(format!(
                "{field}: '*' is only allowed at the end ({raw})"
            ))),
            Some(prefix) => Ok(Pattern::Prefix(prefix.to_string())),
            None if raw.contains('*') => Err(ThrottleError::Configuration(format!(
                "{field}: '*' is only allowed at the end ({raw})"
            ))),
            None => Ok(Pattern::Exact(raw.to_string())),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Exact(s) => s == value,
            Pattern::Prefix(p) => value.starts_with(p.as_str()),
        }
    }
}

fn compile_opt(raw: &Option<String>, field: &str) -> Result<Option<Pattern>> {
    raw.as_deref().map(|r| Pattern::compile(r, field)).transpose()
}

/// Definition compiled for the evaluator loop.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    api_context: Option<Pattern>,
    api_version: Option<Pattern>,
    resource: Option<Pattern>,
    http_verb: Option<Pattern>,
    properties: Vec<(String, Pattern)>,
    key: ThrottleKey,
    pub rps: u32,
    pub burst: u32,
}

impl CompiledRule {
    pub fn matches(&self, req: &ThrottleRequest) -> bool {
        let field = |p: &Option<Pattern>, v: &str| p.as_ref().map_or(true, |p| p.matches(v));

        field(&self.api_context, req.api_context.as_str())
            && field(&self.api_version, req.api_version.as_str())
            && field(&self.resource, req.resource_key.as_str())
            && field(&self.http_verb, req.http_verb.as_str())
            && self
                .properties
                .iter()
                .all(|(name, p)| req.property(name).is_some_and(|v| p.matches(v)))
    }

    /// Bucket key for a matching request; `None` when the rule does not apply.
    pub fn throttle_key(&self, req: &ThrottleRequest) -> Option<String> {
        if !self.matches(req) {
            return None;
        }
        let api = || format!("{}:{}", req.api_context, req.api_version);
        Some(match self.key {
            ThrottleKey::Global => String::new(),
            ThrottleKey::Consumer => req.consumer_key.clone(),
            ThrottleKey::Api => api(),
            ThrottleKey::ConsumerApi => format!("{}|{}", req.consumer_key, api()),
            ThrottleKey::Resource => format!("{}{}:{}", api(), req.resource_key, req.http_verb),
        })
    }
}
