//! Policy layer: the evaluator contract and the built-in rate-limit evaluator.
//!
//! An evaluator is the rule-execution unit behind one named policy. It is
//! constructed from a definition string, fed requests through `submit`, and
//! reports exactly one verdict per accepted request through its
//! [`VerdictSink`]. The built-in [`RateLimitEvaluator`] runs each policy as
//! its own tokio task with token buckets compiled from a YAML definition.

pub mod bucket;
pub mod definition;
pub mod evaluator;
pub mod rate_limit;

pub use definition::{CompiledRule, RateLimitDefinition, ThrottleKey};
pub use evaluator::{Evaluator, EvaluatorFactory, VerdictSink};
pub use rate_limit::{RateLimitEvaluator, RateLimitFactory};
