use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};

use tollgate_core::error::{Result, ThrottleError};
use tollgate_core::protocol::DownstreamEvent;

use crate::config::DownstreamSection;

/// Receives allowed requests. Must return without waiting.
pub trait DownstreamSink: Send + Sync {
    fn publish(&self, event: DownstreamEvent) -> Result<()>;
}

/// Bounded queue in front of whatever talks to the second tier.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<DownstreamEvent>,
}

impl ChannelSink {
    /// Returns the sink and the receiving end for the forwarder.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<DownstreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl DownstreamSink for ChannelSink {
    fn publish(&self, event: DownstreamEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => ThrottleError::Downstream("queue full, event dropped".into()),
            TrySendError::Closed(_) => ThrottleError::Downstream("forwarder gone, event dropped".into()),
        })
    }
}

/// Sink selected by the `downstream` config section.
///
/// When enabled, events go through a [`ChannelSink`] of `buffer` slots drained
/// by a background task that logs each one (no second tier is attached to the
/// binary). A full queue surfaces as `ThrottleError::Downstream`.
/// Must be called from within a tokio runtime.
pub fn sink_from_config(section: &DownstreamSection) -> Result<Arc<dyn DownstreamSink>> {
    if !section.enabled {
        return Ok(Arc::new(NoopSink));
    }

    let runtime = Handle::try_current()
        .map_err(|e| ThrottleError::Internal(format!("downstream forwarder needs a runtime: {e}")))?;
    let (sink, rx) = ChannelSink::new(section.buffer);
    runtime.spawn(run_log_forwarder(rx));
    Ok(Arc::new(sink))
}

async fn run_log_forwarder(mut rx: mpsc::Receiver<DownstreamEvent>) {
    while let Some(event) = rx.recv().await {
        tracing::debug!(
            stream = %event.stream_id,
            key = event.unique_key().unwrap_or_default(),
            timestamp_ms = event.timestamp_ms,
            "forwarding allowed request"
        );
    }
    tracing::debug!("downstream forwarder closed");
}

#[derive(Debug, Default)]
pub struct NoopSink;

impl DownstreamSink for NoopSink {
    fn publish(&self, _event: DownstreamEvent) -> Result<()> {
        Ok(())
    }
}
