//! A small token bucket sitting between the engine and the connection's
//! outbound queue. Server-side flood control is out of scope for this crate;
//! client-side pacing is just a courtesy for a client pointed at a real
//! network.
//!
//! Non-default-on: the engine can be built without one (`Engine::new`
//! doesn't require a throttle) — callers opt in with `with_throttle`.

#[derive(Debug, Clone, Copy)]
pub struct OutboundThrottle {
    capacity: f64,
    tokens: f64,
    refill_per_milli: f64,
    last_refill_millis: i64,
}

impl OutboundThrottle {
    /// `capacity` tokens, refilling at `refill_per_sec` tokens/second.
    pub fn new(capacity: u32, refill_per_sec: f64, now_millis: i64) -> Self {
        OutboundThrottle {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_milli: refill_per_sec / 1000.0,
            last_refill_millis: now_millis,
        }
    }

    fn refill(&mut self, now_millis: i64) {
        let elapsed = (now_millis - self.last_refill_millis).max(0) as f64;
        self.tokens = (self.tokens + elapsed * self.refill_per_milli).min(self.capacity);
        self.last_refill_millis = now_millis;
    }

    /// Consume one token if available, returning whether the line may be
    /// sent now. Callers that get `false` should queue and retry later
    /// rather than drop the line.
    pub fn try_consume(&mut self, now_millis: i64) -> bool {
        self.refill(now_millis);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumes_up_to_capacity_then_blocks() {
        let mut t = OutboundThrottle::new(2, 1.0, 0);
        assert!(t.try_consume(0));
        assert!(t.try_consume(0));
        assert!(!t.try_consume(0));
    }

    #[test]
    fn refills_over_time() {
        let mut t = OutboundThrottle::new(1, 1.0, 0);
        assert!(t.try_consume(0));
        assert!(!t.try_consume(100));
        assert!(t.try_consume(1_000));
    }
}
