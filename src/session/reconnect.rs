// src/session/reconnect.rs
use std::time::Duration;

pub trait ReconnectPolicy: Send + Sync {
    /// Jeda sebelum percobaan ke-`attempt` (mulai 1), `None` berarti menyerah.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base,
            max,
            max_attempts,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(limit) = self.max_attempts {
            if attempt > limit {
                return None;
            }
        }

        let shift = attempt.saturating_sub(1).min(31);
        let delay = self
            .base
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max)
            .min(self.max);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_ceiling() {
        let policy = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30), None);
        let delays: Vec<u64> = (1..=7)
            .map(|n| policy.next_delay(n).unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn unlimited_never_gives_up() {
        let policy = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1), None);
        assert_eq!(policy.next_delay(10_000), Some(Duration::from_secs(1)));
    }

    #[test]
    fn stops_after_max_attempts() {
        let policy = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, Some(2));
        assert_eq!(policy.next_delay(1), Some(Duration::ZERO));
        assert_eq!(policy.next_delay(2), Some(Duration::ZERO));
        assert_eq!(policy.next_delay(3), None);
    }
}
