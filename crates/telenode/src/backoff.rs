use std::time::Duration;

/// A capped exponential backoff.
///
/// The `n`-th consecutive delay is `base * 2^n`, never exceeding `max`.
/// A successful operation calls [`Backoff::reset`] to start over from
/// `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    attempts: u32,
}

impl Backoff {
    /// Creates a [`Backoff`] from its initial delay and its ceiling.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base_ms: duration_ms(base),
            max_ms: duration_ms(max),
            attempts: 0,
        }
    }

    /// Returns the delay to wait before the next attempt and advances the
    /// backoff.
    pub fn next_delay(&mut self) -> u64 {
        // Past 2^63 every multiplication saturates anyway.
        let exponent = self.attempts.min(63);
        let delay = self
            .base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_ms);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Returns the number of delays handed out since the last reset.
    #[must_use]
    #[inline]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Restarts the sequence from the initial delay.
    #[inline]
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[inline]
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Backoff;

    #[test]
    fn doubles_until_capped() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));

        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays, [1000, 2000, 4000, 8000, 10_000, 10_000]);
        assert_eq!(backoff.attempts(), 6);
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(60));

        let _ = backoff.next_delay();
        let _ = backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.next_delay(), 500);
    }

    #[test]
    fn many_attempts_saturate_at_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));

        for _ in 0..200 {
            assert!(backoff.next_delay() <= 60_000);
        }
        assert_eq!(backoff.next_delay(), 60_000);
    }
}
