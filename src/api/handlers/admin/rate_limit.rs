//! Per-email resend limiting for magic-link requests.
//!
//! The limiter is a process-local map from normalized email to the last
//! accepted request time. It mitigates abuse; it is not a security boundary,
//! so non-durability across restarts is acceptable. The check and the update
//! happen under one lock so concurrent requests for the same address cannot
//! both slip through.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Time source seam so tests can drive the limiter deterministically.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResendDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

pub struct ResendLimiter {
    interval_seconds: i64,
    clock: Arc<dyn Clock>,
    last_accepted: Mutex<HashMap<String, i64>>,
}

impl ResendLimiter {
    #[must_use]
    pub fn new(interval_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            interval_seconds,
            clock,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically check the interval for `email` and record acceptance.
    pub fn check_and_update(&self, email: &str) -> ResendDecision {
        let now = self.clock.now_unix();
        let mut map = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = map.get(email) {
            let elapsed = now.saturating_sub(*last);
            if elapsed < self.interval_seconds {
                let remaining = self.interval_seconds - elapsed;
                return ResendDecision::Limited {
                    retry_after_seconds: u64::try_from(remaining).unwrap_or(0),
                };
            }
        }
        map.insert(email.to_string(), now);
        ResendDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ResendDecision, ResendLimiter};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct ManualClock {
        now: AtomicI64,
    }

    impl ManualClock {
        fn advance(&self, seconds: i64) {
            self.now.fetch_add(seconds, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_unix(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn second_request_within_interval_is_limited() {
        let clock = Arc::new(ManualClock::default());
        let limiter = ResendLimiter::new(60, clock.clone());

        assert_eq!(
            limiter.check_and_update("staff@org.example"),
            ResendDecision::Allowed
        );
        clock.advance(30);
        assert_eq!(
            limiter.check_and_update("staff@org.example"),
            ResendDecision::Limited {
                retry_after_seconds: 30
            }
        );
    }

    #[test]
    fn request_after_interval_is_allowed_again() {
        let clock = Arc::new(ManualClock::default());
        let limiter = ResendLimiter::new(60, clock.clone());

        assert_eq!(
            limiter.check_and_update("staff@org.example"),
            ResendDecision::Allowed
        );
        clock.advance(60);
        assert_eq!(
            limiter.check_and_update("staff@org.example"),
            ResendDecision::Allowed
        );
    }

    #[test]
    fn addresses_are_limited_independently() {
        let clock = Arc::new(ManualClock::default());
        let limiter = ResendLimiter::new(60, clock);

        assert_eq!(
            limiter.check_and_update("a@org.example"),
            ResendDecision::Allowed
        );
        assert_eq!(
            limiter.check_and_update("b@org.example"),
            ResendDecision::Allowed
        );
    }

    #[test]
    fn rejected_requests_do_not_extend_the_window() {
        let clock = Arc::new(ManualClock::default());
        let limiter = ResendLimiter::new(60, clock.clone());

        limiter.check_and_update("staff@org.example");
        clock.advance(50);
        assert!(matches!(
            limiter.check_and_update("staff@org.example"),
            ResendDecision::Limited { .. }
        ));
        clock.advance(10);
        // 60s since the last *accepted* request, not since the rejection.
        assert_eq!(
            limiter.check_and_update("staff@org.example"),
            ResendDecision::Allowed
        );
    }
}
