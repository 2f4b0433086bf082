//! tollgate core: transport-agnostic request model, correlation keys and the
//! shared error surface.
//!
//! This crate defines the types exchanged between the throttling node, its
//! evaluators and the downstream sink. It carries no runtime dependencies so
//! embedders can build requests and inspect events without pulling in tokio.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input surfaces as `ThrottleError`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, Result, ThrottleError};
