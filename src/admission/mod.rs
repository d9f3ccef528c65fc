//! Per-identity admission control for generation requests
//!
//! One generation is admitted per caller identity per fixed window. The
//! decision is pure over process-local state: a denial leaves the limiter
//! untouched, so the caller may simply retry once the window elapses.
//! Requests without an identity all share the `"unknown"` bucket, which is
//! intentionally conservative.

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::time::Duration;

const UNKNOWN_IDENTITY: &str = "unknown";

type KeyedLimiter<C> =
    RateLimiter<String, DashMapStateStore<String>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Admission gate keyed by caller identity (e.g. forwarded client address)
pub struct AdmissionControl<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
    enabled: bool,
}

impl AdmissionControl<DefaultClock> {
    /// Create a gate admitting one request per identity per `window`
    pub fn new(window: Duration, enabled: bool) -> Self {
        Self::with_clock(window, enabled, &DefaultClock::default())
    }
}

impl<C: Clock> AdmissionControl<C> {
    /// Create a gate with an explicit clock (tests use a fake clock)
    pub fn with_clock(window: Duration, enabled: bool, clock: &C) -> Self {
        let window = if window.is_zero() {
            Duration::from_secs(10)
        } else {
            window
        };
        // Quota::with_period only fails on a zero duration, guarded above
        let quota = Quota::with_period(window).expect("non-zero admission window");

        Self {
            limiter: RateLimiter::dashmap_with_clock(quota, clock),
            enabled,
        }
    }

    /// Decide whether a request from `identity` is admitted right now.
    ///
    /// Never blocks and never errors; a `false` is immediate and final for
    /// this attempt.
    pub fn allow(&self, identity: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }

        let key = identity
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_IDENTITY)
            .to_string();

        self.limiter.check_key(&key).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    fn gate(clock: &FakeRelativeClock) -> AdmissionControl<FakeRelativeClock> {
        AdmissionControl::with_clock(Duration::from_secs(10), true, clock)
    }

    #[test]
    fn test_second_request_within_window_denied() {
        let clock = FakeRelativeClock::default();
        let gate = gate(&clock);

        assert!(gate.allow(Some("1.2.3.4")));
        clock.advance(Duration::from_millis(9_999));
        assert!(!gate.allow(Some("1.2.3.4")));
    }

    #[test]
    fn test_request_after_window_allowed() {
        let clock = FakeRelativeClock::default();
        let gate = gate(&clock);

        assert!(gate.allow(Some("1.2.3.4")));
        clock.advance(Duration::from_millis(10_001));
        assert!(gate.allow(Some("1.2.3.4")));
    }

    #[test]
    fn test_denial_does_not_extend_window() {
        let clock = FakeRelativeClock::default();
        let gate = gate(&clock);

        assert!(gate.allow(Some("1.2.3.4")));
        clock.advance(Duration::from_secs(5));
        assert!(!gate.allow(Some("1.2.3.4")));
        // Denial at t=5s must not push the next allowance past t=10s
        clock.advance(Duration::from_millis(5_001));
        assert!(gate.allow(Some("1.2.3.4")));
    }

    #[test]
    fn test_identities_are_independent() {
        let clock = FakeRelativeClock::default();
        let gate = gate(&clock);

        assert!(gate.allow(Some("1.2.3.4")));
        assert!(gate.allow(Some("5.6.7.8")));
        assert!(!gate.allow(Some("1.2.3.4")));
    }

    #[test]
    fn test_missing_identity_shares_one_bucket() {
        let clock = FakeRelativeClock::default();
        let gate = gate(&clock);

        assert!(gate.allow(None));
        assert!(!gate.allow(Some("")));
        assert!(!gate.allow(Some("  ")));
        assert!(!gate.allow(None));
    }

    #[test]
    fn test_disabled_gate_admits_everything() {
        let clock = FakeRelativeClock::default();
        let gate = AdmissionControl::with_clock(Duration::from_secs(10), false, &clock);

        assert!(gate.allow(Some("1.2.3.4")));
        assert!(gate.allow(Some("1.2.3.4")));
    }
}
