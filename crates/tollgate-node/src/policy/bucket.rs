use std::time::{Duration, Instant};

/// Token bucket for one throttle key. Owned by a single evaluator task, so no lock.
#[derive(Debug)]
pub struct TokenBucket {
    rps: u32,
    capacity: u32,
    tokens: u32,
    last: Instant,
}

impl TokenBucket {
    pub fn new(rps: u32, burst: u32) -> Self {
        let rps = rps.max(1);
        let capacity = burst.max(1);
        Self {
            rps,
            capacity,
            tokens: capacity,
            last: Instant::now(),
        }
    }

    /// Take one token. `false` means the key is over its limit.
    pub fn allow(&mut self) -> bool {
        self.refill(Instant::now());

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    pub fn is_full(&mut self) -> bool {
        self.refill(Instant::now());
        self.tokens == self.capacity
    }

    fn refill(&mut self, now: Instant) {
        if self.tokens == self.capacity {
            self.last = now;
            return;
        }

        let elapsed_ms = now.duration_since(self.last).as_millis() as u64;
        let add = elapsed_ms * self.rps as u64 / 1000;
        if add == 0 {
            return;
        }

        // Advance only by the time the added tokens account for; keeps the remainder.
        let consumed_ms = add * 1000 / self.rps as u64;
        self.last += Duration::from_millis(consumed_ms);
        self.tokens = (self.tokens as u64 + add).min(self.capacity as u64) as u32;
    }
}
