//! tollgate node library entry.
//!
//! Wires the policy registry, verdict correlator, decision coordinator,
//! downstream sinks and HTTP surface into one throttling node. Consumed by
//! the binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app_state;
pub mod config;
pub mod downstream;
pub mod obs;
pub mod policy;
pub mod router;
pub mod throttle;
pub mod transport;
