//! Throttle request model.
//!
//! Upstream gateways send a fixed-shape tuple. Positional layout:
//!
//! | idx | field          |
//! |-----|----------------|
//! | 0   | unique key     |
//! | 1   | consumer key   |
//! | 2   | API context    |
//! | 3   | API version    |
//! | 4   | resource key   |
//! | 5   | HTTP verb      |
//! | 6   | properties map (object or null, optional) |
//! | 7.. | trailing fields, carried through untouched |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ThrottleError};

/// Minimum tuple arity (properties may be omitted).
pub const MIN_FIELDS: usize = 6;

/// One request to be checked against every active policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleRequest {
    /// Caller-supplied key, unique for the lifetime of one decision.
    pub unique_key: String,
    pub consumer_key: String,
    pub api_context: String,
    pub api_version: String,
    pub resource_key: String,
    pub http_verb: String,
    #[serde(default)]
    pub properties: Option<BTreeMap<String, String>>,
    /// Positions past the properties slot, passed on to evaluators and downstream as-is.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trailing: Vec<Value>,
}

impl ThrottleRequest {
    /// Decode the legacy positional tuple.
    pub fn from_fields(fields: &[Value]) -> Result<Self> {
        if fields.len() < MIN_FIELDS {
            return Err(ThrottleError::BadRequest(format!(
                "request tuple has {} fields, expected at least {MIN_FIELDS}",
                fields.len()
            )));
        }

        let text = |idx: usize, name: &str| -> Result<String> {
            match fields.get(idx) {
                Some(Value::String(s)) => Ok(s.clone()),
                _ => Err(ThrottleError::BadRequest(format!(
                    "field {idx} ({name}) must be a string"
                ))),
            }
        };

        let properties = match fields.get(6) {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    out.insert(k.clone(), v);
                }
                Some(out)
            }
            Some(_) => {
                return Err(ThrottleError::BadRequest(
                    "field 6 (properties) must be an object or null".into(),
                ))
            }
        };

        let unique_key = text(0, "unique key")?;
        if unique_key.is_empty() {
            return Err(ThrottleError::BadRequest("unique key must not be empty".into()));
        }

        Ok(Self {
            unique_key,
            consumer_key: text(1, "consumer key")?,
            api_context: text(2, "api context")?,
            api_version: text(3, "api version")?,
            resource_key: text(4, "resource key")?,
            http_verb: text(5, "http verb")?,
            properties,
            trailing: fields.get(7..).map(<[Value]>::to_vec).unwrap_or_default(),
        })
    }

    /// Encode back into the positional tuple (properties as an object,
    /// trailing fields re-appended).
    pub fn to_fields(&self) -> Vec<Value> {
        let props = match &self.properties {
            Some(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
            None => Value::Null,
        };
        let mut fields = Vec::with_capacity(7 + self.trailing.len());
        fields.extend([
            Value::String(self.unique_key.clone()),
            Value::String(self.consumer_key.clone()),
            Value::String(self.api_context.clone()),
            Value::String(self.api_version.clone()),
            Value::String(self.resource_key.clone()),
            Value::String(self.http_verb.clone()),
            props,
        ]);
        fields.extend(self.trailing.iter().cloned());
        fields
    }

    /// Properties map serialized as a JSON string, the form forwarded downstream.
    pub fn properties_string(&self) -> Option<String> {
        self.properties
            .as_ref()
            .and_then(|p| serde_json::to_string(p).ok())
    }

    /// Look up a single property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.as_ref()?.get(name).map(String::as_str)
    }
}
