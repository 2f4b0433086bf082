//! Transport layer (HTTP).
//!
//! Decision and policy-management handlers consumed by upstream gateways.

pub mod http;
