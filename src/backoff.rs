//! Exponential backoff policy for poll retries
//!
//! Pure delay state: a floor, a ceiling, and a growth factor. The scheduler
//! resets it on a successful cycle and increments it on failure to obtain
//! the next retry delay.

use std::time::Duration;

/// Growth factor applied on every failed attempt
const DEFAULT_FACTOR: f64 = 2.0;

/// Exponential backoff state
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    factor: f64,
    delay: Duration,
    tries: u32,
}

impl ExponentialBackoff {
    /// Create a new backoff starting at the floor delay
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            factor: DEFAULT_FACTOR,
            delay: min_delay,
            tries: 0,
        }
    }

    /// Reset delay to the floor and clear the try counter
    pub fn reset(&mut self) {
        self.delay = self.min_delay;
        self.tries = 0;
    }

    /// Grow the delay by the factor, clamp to the ceiling, and return it
    pub fn increment(&mut self) -> Duration {
        self.tries += 1;
        let grown = self.delay.as_secs_f64() * self.factor;
        self.delay = self.max_delay.min(Duration::from_secs_f64(grown));
        self.delay
    }

    /// Current delay without mutating state
    pub fn current_delay(&self) -> Duration {
        self.delay
    }

    /// Number of failed attempts since the last reset
    pub fn tries(&self) -> u32 {
        self.tries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_grows_and_clamps() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(300), Duration::from_secs(3600));

        let mut previous = backoff.current_delay();
        for _ in 0..10 {
            let next = backoff.increment();
            assert!(next >= previous);
            assert!(next <= Duration::from_secs(3600));
            previous = next;
        }
        assert_eq!(backoff.current_delay(), Duration::from_secs(3600));
        assert_eq!(backoff.tries(), 10);
    }

    #[test]
    fn first_increment_doubles_the_floor() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(300), Duration::from_secs(3600));
        assert_eq!(backoff.increment(), Duration::from_secs(600));
        assert_eq!(backoff.increment(), Duration::from_secs(1200));
    }

    #[test]
    fn reset_restores_the_floor() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(300), Duration::from_secs(3600));
        backoff.increment();
        backoff.increment();
        backoff.reset();
        assert_eq!(backoff.current_delay(), Duration::from_secs(300));
        assert_eq!(backoff.tries(), 0);
    }
}
