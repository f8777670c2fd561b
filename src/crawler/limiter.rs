//! Global request gate shared by all workers
//!
//! Two limits are enforced together: a requests-per-second ceiling
//! (token bucket via governor) and a minimum spacing between any two
//! requests process-wide. No page fetch may bypass this gate; adding
//! workers raises in-flight work but never the effective request rate.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Shared rate-limiting gate.
///
/// `acquire()` blocks the calling worker until it may issue its next
/// request. First-ready-first-served; fairness across workers is not
/// guaranteed.
pub struct RequestGate {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Minimum spacing between requests, shared across all callers
    min_delay: Duration,

    /// Timestamp of the most recent grant. Held across the spacing sleep
    /// so concurrent callers serialize on the gap.
    last_grant: Mutex<Option<Instant>>,
}

impl RequestGate {
    /// Create a gate for the given ceiling and minimum spacing.
    ///
    /// The ceiling holds for fractional rates too: 0.5 req/s replenishes
    /// one token every two seconds rather than rounding up to 1 req/s.
    pub fn new(requests_per_second: f64, min_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            limiter: RateLimiter::direct(Self::quota_for(requests_per_second)),
            min_delay,
            last_grant: Mutex::new(None),
        })
    }

    /// Token quota for the given ceiling, replenishing one token per
    /// `1 / rate` seconds. Non-positive rates fall back to 1 req/s;
    /// configuration validation rejects them before a gate is built.
    fn quota_for(requests_per_second: f64) -> Quota {
        let fallback = Quota::per_second(NonZeroU32::new(1).unwrap());
        if requests_per_second <= 0.0 {
            return fallback;
        }
        Duration::try_from_secs_f64(1.0 / requests_per_second)
            .ok()
            .and_then(Quota::with_period)
            .unwrap_or(fallback)
    }

    /// Block until the caller is permitted to issue its next request
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;

        let mut last = self.last_grant.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_acquire_enforces_min_spacing() {
        let gate = RequestGate::new(100.0, Duration::from_millis(50));

        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        gate.acquire().await;

        // Two gaps of at least 50ms each after the first grant
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_gate_is_global_across_tasks() {
        let gate = RequestGate::new(100.0, Duration::from_millis(30));
        let grants = Arc::new(AtomicU32::new(0));

        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            let grants = Arc::clone(&grants);
            handles.push(tokio::spawn(async move {
                gate.acquire().await;
                grants.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(grants.load(Ordering::SeqCst), 4);
        // Four grants spaced 30ms apart need at least three gaps
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_quota_period_matches_fractional_rate() {
        assert_eq!(
            RequestGate::quota_for(0.5).replenish_interval(),
            Duration::from_secs(2)
        );
        assert_eq!(
            RequestGate::quota_for(4.0).replenish_interval(),
            Duration::from_millis(250)
        );
        assert_eq!(
            RequestGate::quota_for(1.0).replenish_interval(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_quota_degenerate_rates_fall_back() {
        let one_per_second = Duration::from_secs(1);
        assert_eq!(RequestGate::quota_for(0.0).replenish_interval(), one_per_second);
        assert_eq!(RequestGate::quota_for(-3.0).replenish_interval(), one_per_second);
    }

    #[tokio::test]
    async fn test_fractional_ceiling_spaces_grants() {
        // 2.5 req/s means 400ms between grants even with no min delay
        let gate = RequestGate::new(2.5, Duration::ZERO);

        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        gate.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let gate = RequestGate::new(1.0, Duration::from_secs(5));

        let start = Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
