//! Exponential-backoff polling parameters.

use std::time::Duration;

/// Tunable parameters for result polling.
///
/// The delay between store lookups starts at `initial_delay` and grows by
/// `multiplier` after every miss, clamped to `max_delay`. The backoff
/// bounds the load a blocked submitter puts on the shared store.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the second lookup (the first happens immediately).
    pub initial_delay: Duration,
    /// Upper bound on the delay between lookups.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each miss.
    pub multiplier: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            multiplier: 1.5,
        }
    }
}

impl PollConfig {
    /// Fixed-interval polling (multiplier 1).
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1.0,
        }
    }

    /// Next delay after a miss, clamped to `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_clamps() {
        let poll = PollConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            multiplier: 2.0,
        };
        let d1 = poll.next_delay(poll.initial_delay);
        assert_eq!(d1, Duration::from_millis(200));
        let d2 = poll.next_delay(d1);
        assert_eq!(d2, Duration::from_millis(350));
        let d3 = poll.next_delay(d2);
        assert_eq!(d3, Duration::from_millis(350));
    }

    #[test]
    fn fixed_interval_never_grows() {
        let poll = PollConfig::fixed(Duration::from_millis(250));
        assert_eq!(poll.next_delay(Duration::from_millis(250)), Duration::from_millis(250));
    }
}
