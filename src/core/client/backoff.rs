use std::time::Duration;

/// Poll-delay schedule for the job polling loop.
///
/// The delay for attempt `n` is `initial * factor^n`, capped at `cap`. The
/// schedule is a pure function of the attempt index, so tests can assert it
/// without sleeping, and a near-zero policy can be injected to run the full
/// loop fast.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    initial: Duration,
    factor: f64,
    cap: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, factor: f64, cap: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            factor,
            cap,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait before poll attempt `attempt` (zero-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let millis = self.initial.as_millis() as f64 * self.factor.powi(attempt as i32);
        let capped = millis.min(self.cap.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// 500ms growing by 1.5x per attempt, capped at 3s, for 30 attempts.
/// Bounds a single execute call to under two minutes of polling.
impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            factor: 1.5,
            cap: Duration::from_millis(3000),
            max_attempts: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_starts_at_500ms() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_millis(750));
        assert_eq!(policy.delay(2), Duration::from_millis(1125));
    }

    #[test]
    fn default_schedule_caps_at_3s() {
        let policy = BackoffPolicy::default();
        // 500 * 1.5^4 = 2531.25, still under the cap
        assert_eq!(policy.delay(4), Duration::from_millis(2531));
        // 500 * 1.5^5 = 3796.875, capped
        assert_eq!(policy.delay(5), Duration::from_millis(3000));
        assert_eq!(policy.delay(29), Duration::from_millis(3000));
    }

    #[test]
    fn schedule_is_deterministic() {
        let policy = BackoffPolicy::default();
        for attempt in 0..30 {
            assert_eq!(policy.delay(attempt), policy.delay(attempt));
        }
    }

    #[test]
    fn schedule_never_decreases() {
        let policy = BackoffPolicy::default();
        for attempt in 1..30 {
            assert!(policy.delay(attempt) >= policy.delay(attempt - 1));
        }
    }

    #[test]
    fn default_ceiling_is_30_attempts() {
        assert_eq!(BackoffPolicy::default().max_attempts(), 30);
    }

    #[test]
    fn custom_policy_honors_its_parameters() {
        let policy = BackoffPolicy::new(Duration::from_millis(10), 2.0, Duration::from_millis(40), 5);
        assert_eq!(policy.delay(0), Duration::from_millis(10));
        assert_eq!(policy.delay(1), Duration::from_millis(20));
        assert_eq!(policy.delay(2), Duration::from_millis(40));
        assert_eq!(policy.delay(3), Duration::from_millis(40));
        assert_eq!(policy.max_attempts(), 5);
    }
}
