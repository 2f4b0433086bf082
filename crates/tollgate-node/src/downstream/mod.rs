//! Downstream forwarding of allowed requests to the second-tier throttler.
//!
//! Publishing is fire-and-forget: sinks must not block, and their errors are
//! only logged by the caller.

mod sink;

pub use sink::{sink_from_config, ChannelSink, DownstreamSink, NoopSink};
