//! Sliding-window limiter for failed authentication proofs.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Tracks failed proofs per account and refuses further attempts once the
/// window fills up. Successful authentication clears the account's history.
pub struct FailedProofLimiter {
    window: Duration,
    max_failures: u32,
    failures: HashMap<String, Vec<DateTime<Utc>>>,
}

impl FailedProofLimiter {
    pub fn new(window_secs: i64, max_failures: u32) -> Self {
        Self {
            window: Duration::seconds(window_secs),
            max_failures,
            failures: HashMap::new(),
        }
    }

    /// Whether the account has exhausted its attempts within the window.
    /// Prunes expired entries as a side effect.
    pub fn is_limited(&mut self, account: &str) -> bool {
        let cutoff = Utc::now() - self.window;
        match self.failures.get_mut(account) {
            Some(attempts) => {
                attempts.retain(|t| *t > cutoff);
                attempts.len() >= self.max_failures as usize
            }
            None => false,
        }
    }

    pub fn record_failure(&mut self, account: &str) {
        self.failures
            .entry(account.to_string())
            .or_default()
            .push(Utc::now());
    }

    pub fn reset(&mut self, account: &str) {
        self.failures.remove(account);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_after_max_failures() {
        let mut limiter = FailedProofLimiter::new(60, 3);
        assert!(!limiter.is_limited("a@x"));

        for _ in 0..3 {
            limiter.record_failure("a@x");
        }
        assert!(limiter.is_limited("a@x"));

        // Other accounts are unaffected
        assert!(!limiter.is_limited("b@x"));
    }

    #[test]
    fn reset_clears_history() {
        let mut limiter = FailedProofLimiter::new(60, 1);
        limiter.record_failure("a@x");
        assert!(limiter.is_limited("a@x"));

        limiter.reset("a@x");
        assert!(!limiter.is_limited("a@x"));
    }

    #[test]
    fn old_failures_expire() {
        let mut limiter = FailedProofLimiter::new(0, 1);
        limiter.record_failure("a@x");
        // Zero-second window: the failure is already outside it
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(!limiter.is_limited("a@x"));
    }
}
