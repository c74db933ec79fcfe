//! # Fibonacci Backoff
//!
//! Progressive delay between retries of a request the controller refused for a
//! transient reason (409 on a moving blueprint revision, 429 rate limiting).
//! Grows more slowly than exponential backoff so a handful of retries stays
//! within a few seconds.
//!
//! Sequence with the default 500ms/10s bounds: 500ms, 500ms, 1s, 1.5s, 2.5s, 4s, 6.5s, 10s (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, starting from `min` twice and
/// capped at `max`. Values are tracked in milliseconds.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum delay in milliseconds (for reset)
    min_ms: u64,
    /// Previous delay in milliseconds
    prev_ms: u64,
    /// Current delay in milliseconds
    current_ms: u64,
    /// Maximum delay in milliseconds
    max_ms: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff bounded by `min` and `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_ms = duration_ms(min);
        Self {
            min_ms,
            prev_ms: 0,
            current_ms: min_ms,
            max_ms: duration_ms(max).max(min_ms),
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_ms;

        let next_ms = self.prev_ms.saturating_add(self.current_ms);
        self.prev_ms = self.current_ms;
        self.current_ms = std::cmp::min(next_ms, self.max_ms);

        Duration::from_millis(result)
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_ms = 0;
        self.current_ms = self.min_ms;
    }

    /// Calculate the delay for a given attempt number (stateless)
    ///
    /// Attempts 0 and 1 both yield `min`; later attempts follow the Fibonacci
    /// sequence min, min, 2*min, 3*min, 5*min, ... capped at `max`.
    #[must_use]
    pub fn for_attempt(attempt: u32, min: Duration, max: Duration) -> Duration {
        let min_ms = duration_ms(min);
        let max_ms = duration_ms(max).max(min_ms);

        if attempt <= 1 {
            return Duration::from_millis(min_ms);
        }

        let mut prev_ms = min_ms;
        let mut current_ms = min_ms;
        for _ in 2..=attempt {
            let next_ms = prev_ms.saturating_add(current_ms);
            prev_ms = current_ms;
            current_ms = next_ms;
            if current_ms >= max_ms {
                return Duration::from_millis(max_ms);
            }
        }

        Duration::from_millis(current_ms)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
