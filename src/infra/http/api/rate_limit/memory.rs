use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{RateLimitError, RateLimitOutcome, RateLimitPolicy, RateLimitStore};

/// Every this many hits, buckets whose newest call has left its window are dropped.
const SWEEP_EVERY: u64 = 1024;

#[derive(Debug)]
struct Bucket {
    calls: VecDeque<Instant>,
    window: Duration,
}

impl Bucket {
    fn is_stale_at(&self, now: Instant) -> bool {
        self.calls
            .back()
            .is_none_or(|newest| now.saturating_duration_since(*newest) >= self.window)
    }
}

/// In-process timestamp logs, one per bucket key.
#[derive(Debug, Clone, Default)]
pub struct MemoryRateLimitStore {
    buckets: Arc<DashMap<String, Bucket>>,
    hits: Arc<AtomicU64>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bucket keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub(crate) fn hit_at(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> RateLimitOutcome {
        let outcome = self.record(key, policy, now);
        if self.hits.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_at(now);
        }
        outcome
    }

    /// Drop buckets with no call inside their window.
    pub(crate) fn sweep_at(&self, now: Instant) {
        self.buckets.retain(|_, bucket| !bucket.is_stale_at(now));
    }

    fn record(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> RateLimitOutcome {
        let window = policy.window;
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            calls: VecDeque::new(),
            window,
        });
        bucket.window = window;
        while bucket
            .calls
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
        {
            bucket.calls.pop_front();
        }

        let used = u32::try_from(bucket.calls.len()).unwrap_or(u32::MAX);
        if used >= policy.limit {
            let retry_after = bucket
                .calls
                .front()
                .map(|oldest| (*oldest + window).saturating_duration_since(now))
                .unwrap_or(window);
            return RateLimitOutcome::Rejected { retry_after };
        }

        bucket.calls.push_back(now);
        RateLimitOutcome::Allowed {
            remaining: policy.limit - used - 1,
        }
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitOutcome, RateLimitError> {
        Ok(self.hit_at(key, policy, Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: RateLimitPolicy = RateLimitPolicy::new(3, Duration::from_secs(10));

    #[test]
    fn call_after_limit_is_rejected_with_retry_hint() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();

        for offset in 0..3 {
            assert!(matches!(
                store.hit_at("k", POLICY, start + Duration::from_secs(offset)),
                RateLimitOutcome::Allowed { .. }
            ));
        }

        let outcome = store.hit_at("k", POLICY, start + Duration::from_secs(4));
        assert_eq!(
            outcome,
            RateLimitOutcome::Rejected {
                retry_after: Duration::from_secs(6)
            }
        );
    }

    #[test]
    fn window_slides_past_oldest_call() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();
        for _ in 0..3 {
            store.hit_at("k", POLICY, start);
        }

        let later = start + Duration::from_secs(10);
        assert_eq!(
            store.hit_at("k", POLICY, later),
            RateLimitOutcome::Allowed { remaining: 2 }
        );
    }

    #[test]
    fn rejected_calls_are_not_recorded() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();
        store.hit_at("k", POLICY, start);
        store.hit_at("k", POLICY, start + Duration::from_secs(5));
        store.hit_at("k", POLICY, start + Duration::from_secs(5));
        for _ in 0..10 {
            store.hit_at("k", POLICY, start + Duration::from_secs(6));
        }

        // Only the first call has expired; the rejected ones left no trace.
        assert_eq!(
            store.hit_at("k", POLICY, start + Duration::from_secs(10)),
            RateLimitOutcome::Allowed { remaining: 0 }
        );
    }

    #[test]
    fn buckets_are_independent() {
        let store = MemoryRateLimitStore::new();
        let now = Instant::now();
        for _ in 0..3 {
            store.hit_at("a", POLICY, now);
        }
        assert!(matches!(
            store.hit_at("b", POLICY, now),
            RateLimitOutcome::Allowed { remaining: 2 }
        ));
    }

    #[test]
    fn expired_buckets_are_swept() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();
        store.hit_at("old", POLICY, start);
        store.hit_at("fresh", POLICY, start + Duration::from_secs(9));
        assert_eq!(store.len(), 2);

        store.sweep_at(start + Duration::from_secs(10));
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.hit_at("fresh", POLICY, start + Duration::from_secs(10)),
            RateLimitOutcome::Allowed { remaining: 1 }
        ));
    }

    #[test]
    fn distinct_identifiers_do_not_accumulate() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();
        for n in 0..SWEEP_EVERY - 1 {
            store.hit_at(&format!("ip-{n}"), POLICY, start);
        }
        assert_eq!(store.len(), (SWEEP_EVERY - 1) as usize);

        store.hit_at("late", POLICY, start + Duration::from_secs(3600));
        assert_eq!(store.len(), 1);
    }
}
