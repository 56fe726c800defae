use std::time::{Duration, Instant};

/// Lets one event through per interval and counts what it held back
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_event: Option<Instant>,
    suppressed: u64,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_event: None,
            suppressed: 0,
        }
    }

    /// `Some(n)` when the event may be processed, where `n` is the number of
    /// events suppressed since the last one that went through.
    pub fn check(&mut self) -> Option<u64> {
        self.check_at(Instant::now())
    }

    fn check_at(&mut self, now: Instant) -> Option<u64> {
        let due = self
            .last_event
            .map_or(true, |last| now.duration_since(last) >= self.min_interval);
        if due {
            self.last_event = Some(now);
            Some(std::mem::take(&mut self.suppressed))
        } else {
            self.suppressed += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_passes_then_throttles() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        let t0 = Instant::now();
        assert_eq!(limiter.check_at(t0), Some(0));
        assert_eq!(limiter.check_at(t0 + Duration::from_millis(10)), None);
        assert_eq!(limiter.check_at(t0 + Duration::from_millis(900)), None);
        assert_eq!(limiter.check_at(t0 + Duration::from_secs(1)), Some(2));
        assert_eq!(limiter.check_at(t0 + Duration::from_millis(1500)), None);
    }
}
