//! Decision aggregation: fan a request out to every active policy, collect
//! the verdicts, and release the waiting caller with their logical OR.
//!
//! - [`ResultCorrelator`]: per-request verdict tally keyed by correlation key.
//! - [`PolicyRegistry`]: the active policy set, snapshotted once per decision.
//! - [`ThrottleCoordinator`]: the end-to-end `decide` path.

mod coordinator;
mod correlator;
mod registry;

pub use coordinator::{DecisionSettings, ThrottleCoordinator};
pub use correlator::{CorrelationGuard, Recorded, ResultCorrelator, Ticket};
pub use registry::{Policy, PolicyRegistry, PolicySnapshot};
