use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;

use tollgate_core::error::{Result, ThrottleError};
use tollgate_core::protocol::CorrelationKey;

/// Outcome of one `record` call (informational; producers never fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Counted; more verdicts still expected.
    Pending,
    /// Counted; this was the last expected verdict.
    Resolved,
    /// Same policy already reported for this key; ignored.
    Duplicate,
    /// No correlator for this key (late, unknown, or surplus); ignored.
    Dropped,
}

/// In-flight verdict table, one entry per outstanding decision.
#[derive(Default)]
pub struct ResultCorrelator {
    pending: DashMap<CorrelationKey, Arc<Pending>>,
    dropped: AtomicU64,
}

struct Pending {
    tally: Mutex<Tally>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Tally {
    expected: usize,
    received: Vec<(Arc<str>, bool)>,
    outcome: bool,
    done: Option<oneshot::Sender<()>>,
}

impl Tally {
    fn add(&mut self, policy: &Arc<str>, verdict: bool) -> Recorded {
        if self.received.iter().any(|(p, _)| p == policy) {
            return Recorded::Duplicate;
        }
        if self.received.len() >= self.expected {
            return Recorded::Dropped;
        }

        self.received.push((Arc::clone(policy), verdict));
        self.outcome |= verdict;

        if self.received.len() == self.expected {
            self.signal();
            Recorded::Resolved
        } else {
            Recorded::Pending
        }
    }

    fn signal(&mut self) {
        if let Some(done) = self.done.take() {
            // Waiter may already have timed out.
            let _ = done.send(());
        }
    }
}

/// Handle returned by [`ResultCorrelator::register`]; consumed by `await_verdicts`.
pub struct Ticket {
    key: CorrelationKey,
    rx: oneshot::Receiver<()>,
}

impl ResultCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a correlator expecting `expected` verdicts.
    /// `expected == 0` resolves immediately to `false`.
    pub fn register(&self, key: CorrelationKey, expected: usize) -> Result<Ticket> {
        let (tx, rx) = oneshot::channel();
        let mut tally = Tally {
            expected,
            received: Vec::with_capacity(expected),
            outcome: false,
            done: Some(tx),
        };
        if expected == 0 {
            tally.signal();
        }

        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => Err(ThrottleError::DuplicateKey(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Pending {
                    tally: Mutex::new(tally),
                }));
                Ok(Ticket { key, rx })
            }
        }
    }

    /// Record one policy's verdict. Safe from any number of producers.
    pub fn record(&self, key: &CorrelationKey, policy: &Arc<str>, throttled: bool) -> Recorded {
        // Clone out of the shard before taking the tally lock.
        let pending = self.pending.get(key).map(|e| Arc::clone(e.value()));
        let Some(pending) = pending else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, policy = %policy, throttled, "dropping verdict: no correlator");
            return Recorded::Dropped;
        };

        let recorded = pending.lock().add(policy, throttled);
        match recorded {
            Recorded::Duplicate => {
                tracing::debug!(key = %key, policy = %policy, "ignoring duplicate verdict");
            }
            Recorded::Dropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, policy = %policy, "dropping surplus verdict");
            }
            Recorded::Pending | Recorded::Resolved => {}
        }
        recorded
    }

    /// Count `policy` as a "not throttled" vote because it never got the request.
    pub fn forfeit(&self, key: &CorrelationKey, policy: &Arc<str>) -> Recorded {
        self.record(key, policy, false)
    }

    /// Wait until every expected verdict is in, or `timeout` elapses.
    /// On timeout the entry is discarded so late verdicts are dropped.
    pub async fn await_verdicts(&self, ticket: Ticket, timeout: Duration) -> Result<bool> {
        let Ticket { key, rx } = ticket;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => self
                .resolve(&key)
                .ok_or_else(|| ThrottleError::Internal(format!("correlator for {key} vanished"))),
            Ok(Err(_)) => {
                self.remove(&key);
                Err(ThrottleError::Internal(format!("correlator for {key} closed unresolved")))
            }
            Err(_) => {
                self.remove(&key);
                Err(ThrottleError::Timeout {
                    key: key.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Logical OR of the verdicts recorded so far.
    pub fn resolve(&self, key: &CorrelationKey) -> Option<bool> {
        let pending = self.pending.get(key).map(|e| Arc::clone(e.value()))?;
        let outcome = pending.lock().outcome;
        Some(outcome)
    }

    /// Verdicts in arrival order.
    pub fn verdicts(&self, key: &CorrelationKey) -> Option<Vec<(String, bool)>> {
        let pending = self.pending.get(key).map(|e| Arc::clone(e.value()))?;
        let tally = pending.lock();
        Some(tally.received.iter().map(|(p, v)| (p.to_string(), *v)).collect())
    }

    pub fn remove(&self, key: &CorrelationKey) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Remove `key` when the guard goes out of scope, whatever the exit path.
    pub fn guard(&self, key: CorrelationKey) -> CorrelationGuard<'_> {
        CorrelationGuard { correlator: self, key }
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Verdicts that arrived with no correlator to take them.
    pub fn dropped_verdicts(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct CorrelationGuard<'a> {
    correlator: &'a ResultCorrelator,
    key: CorrelationKey,
}

impl Drop for CorrelationGuard<'_> {
    fn drop(&mut self) {
        self.correlator.remove(&self.key);
    }
}
