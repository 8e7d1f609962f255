//! Bounds applied to a retry loop.

use std::time::Duration;

/// Ceilings for the retry executor.
///
/// The default policy is unbounded: a throttled request is retried until the
/// store admits it. Setting either bound turns an endless loop into
/// [`RetryError::Exhausted`](super::RetryError::Exhausted).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of invocations of the operation, including the first.
    pub max_attempts: Option<u32>,
    /// Maximum accumulated wait across all throttling pauses.
    pub max_total_wait: Option<Duration>,
}

impl RetryPolicy {
    /// Policy that retries throttled requests forever.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Caps the number of invocations.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Caps the accumulated wait.
    pub fn with_max_total_wait(mut self, max_total_wait: Duration) -> Self {
        self.max_total_wait = Some(max_total_wait);
        self
    }

    /// Returns true if another attempt is allowed after `attempts` invocations
    /// that already waited `waited`, given the next pause `next_wait`.
    pub(crate) fn allows(&self, attempts: u32, waited: Duration, next_wait: Duration) -> bool {
        if let Some(max) = self.max_attempts {
            if attempts >= max {
                return false;
            }
        }
        if let Some(max) = self.max_total_wait {
            if waited.saturating_add(next_wait) > max {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_always_allows() {
        let policy = RetryPolicy::unbounded();
        assert!(policy.allows(u32::MAX, Duration::MAX, Duration::from_secs(1)));
    }

    #[test]
    fn attempt_ceiling() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        assert!(policy.allows(2, Duration::ZERO, Duration::ZERO));
        assert!(!policy.allows(3, Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn wait_ceiling_counts_next_pause() {
        let policy = RetryPolicy::default().with_max_total_wait(Duration::from_millis(100));
        assert!(policy.allows(1, Duration::from_millis(50), Duration::from_millis(50)));
        assert!(!policy.allows(1, Duration::from_millis(60), Duration::from_millis(50)));
    }
}
