//! Sliding-window rate limiting for the JSON API.
//!
//! Each caller gets one timestamp log per [`RateLimitClass`]. A call is
//! admitted while the live window holds fewer than `limit` entries; rejected
//! calls are not recorded.

mod memory;
mod redis_store;

pub use memory::MemoryRateLimitStore;
pub use redis_store::RedisRateLimitStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use redis::aio::ConnectionManager;
use thiserror::Error;
use tracing::warn;

use crate::config::{BackendKind, ClassLimitSettings, RateLimitSettings};
use crate::infra::error::InfraError;

pub const METRIC_RATE_LIMIT_REJECTED: &str = "bloghub_rate_limit_rejected_total";

/// Shared bucket for callers without forwarding headers.
pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

const KEY_PREFIX: &str = "bloghub:ratelimit";
const CACHE_PURGE_PATH: &str = "/api/cache/purge";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitClass {
    Query,
    Mutation,
    Strict,
}

impl RateLimitClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Strict => "strict",
        }
    }

    /// Reads are `Query`, writes are `Mutation`, cache purges are `Strict`.
    pub fn for_request(method: &Method, path: &str) -> Self {
        if path == CACHE_PURGE_PATH {
            return Self::Strict;
        }
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Self::Query,
            _ => Self::Mutation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

impl From<ClassLimitSettings> for RateLimitPolicy {
    fn from(settings: ClassLimitSettings) -> Self {
        Self::new(settings.max_requests.get(), settings.window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicies {
    pub query: RateLimitPolicy,
    pub mutation: RateLimitPolicy,
    pub strict: RateLimitPolicy,
}

impl RateLimitPolicies {
    pub fn get(&self, class: RateLimitClass) -> RateLimitPolicy {
        match class {
            RateLimitClass::Query => self.query,
            RateLimitClass::Mutation => self.mutation,
            RateLimitClass::Strict => self.strict,
        }
    }
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            query: RateLimitPolicy::new(30, Duration::from_secs(10)),
            mutation: RateLimitPolicy::new(10, Duration::from_secs(10)),
            strict: RateLimitPolicy::new(5, Duration::from_secs(60)),
        }
    }
}

impl From<&RateLimitSettings> for RateLimitPolicies {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            query: settings.query.into(),
            mutation: settings.mutation.into(),
            strict: settings.strict.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Allowed { remaining: u32 },
    /// `retry_after` is the time until the oldest logged call leaves the window.
    Rejected { retry_after: Duration },
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate-limit backend error: {0}")]
    Backend(String),
}

/// Storage for per-bucket call logs.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record one call under `key` if the policy admits it.
    async fn hit(
        &self,
        key: &str,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitOutcome, RateLimitError>;
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Option<Arc<dyn RateLimitStore>>,
    policies: RateLimitPolicies,
}

impl RateLimiter {
    pub fn new(store: Option<Arc<dyn RateLimitStore>>, policies: RateLimitPolicies) -> Self {
        Self { store, policies }
    }

    /// Admits every call.
    pub fn disabled() -> Self {
        Self::new(None, RateLimitPolicies::default())
    }

    pub fn policy(&self, class: RateLimitClass) -> RateLimitPolicy {
        self.policies.get(class)
    }

    /// Store failures are logged and the call is admitted.
    pub async fn check(&self, class: RateLimitClass, identifier: &str) -> RateLimitOutcome {
        let policy = self.policy(class);
        let Some(store) = self.store.as_ref() else {
            return RateLimitOutcome::Allowed {
                remaining: policy.limit,
            };
        };

        let key = bucket_key(class, identifier);
        match store.hit(&key, policy).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    target: "bloghub::ratelimit",
                    key = %key,
                    error = %err,
                    "Rate-limit store unavailable; admitting request"
                );
                RateLimitOutcome::Allowed {
                    remaining: policy.limit,
                }
            }
        }
    }
}

pub fn bucket_key(class: RateLimitClass, identifier: &str) -> String {
    format!("{KEY_PREFIX}:{}:{identifier}", class.as_str())
}

/// First `x-forwarded-for` hop, then `x-real-ip`, then [`ANONYMOUS_IDENTIFIER`].
pub fn resolve_identifier(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS_IDENTIFIER)
        .to_string()
}

/// Whole seconds until retry, rounded up and never below one.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

/// Build the configured store. `Ok(None)` when rate limiting is disabled.
pub fn build_store(
    backend: BackendKind,
    redis: Option<&ConnectionManager>,
) -> Result<Option<Arc<dyn RateLimitStore>>, InfraError> {
    match backend {
        BackendKind::Disabled => Ok(None),
        BackendKind::Memory => Ok(Some(Arc::new(MemoryRateLimitStore::new()))),
        BackendKind::Redis => {
            let conn = redis.ok_or_else(|| {
                InfraError::configuration("rate-limit backend `redis` requires `redis.url`")
            })?;
            Ok(Some(Arc::new(RedisRateLimitStore::new(conn.clone()))))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl RateLimitStore for BrokenStore {
        async fn hit(
            &self,
            _key: &str,
            _policy: RateLimitPolicy,
        ) -> Result<RateLimitOutcome, RateLimitError> {
            Err(RateLimitError::Backend("connection refused".to_string()))
        }
    }

    #[test]
    fn class_follows_method_and_purge_path() {
        assert_eq!(
            RateLimitClass::for_request(&Method::GET, "/api/posts"),
            RateLimitClass::Query
        );
        assert_eq!(
            RateLimitClass::for_request(&Method::PATCH, "/api/posts/1"),
            RateLimitClass::Mutation
        );
        assert_eq!(
            RateLimitClass::for_request(&Method::POST, "/api/cache/purge"),
            RateLimitClass::Strict
        );
    }

    #[test]
    fn identifier_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(resolve_identifier(&headers), ANONYMOUS_IDENTIFIER);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(resolve_identifier(&headers), "10.0.0.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        assert_eq!(resolve_identifier(&headers), "203.0.113.7");
    }

    #[test]
    fn bucket_key_is_namespaced_by_class() {
        assert_eq!(
            bucket_key(RateLimitClass::Strict, "1.2.3.4"),
            "bloghub:ratelimit:strict:1.2.3.4"
        );
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(2500)), 3);
        assert_eq!(retry_after_secs(Duration::from_secs(10)), 10);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn store_failure_admits_request() {
        let limiter = RateLimiter::new(Some(Arc::new(BrokenStore)), RateLimitPolicies::default());
        assert_eq!(
            limiter.check(RateLimitClass::Query, "1.2.3.4").await,
            RateLimitOutcome::Allowed { remaining: 30 }
        );
    }

    #[tokio::test]
    async fn limiter_rejects_once_class_limit_is_reached() {
        let store: Arc<dyn RateLimitStore> = Arc::new(MemoryRateLimitStore::new());
        let limiter = RateLimiter::new(Some(store), RateLimitPolicies::default());

        for expected in (0..5).rev() {
            assert_eq!(
                limiter.check(RateLimitClass::Strict, "ip").await,
                RateLimitOutcome::Allowed {
                    remaining: expected
                }
            );
        }
        assert!(matches!(
            limiter.check(RateLimitClass::Strict, "ip").await,
            RateLimitOutcome::Rejected { .. }
        ));
        assert!(matches!(
            limiter.check(RateLimitClass::Query, "ip").await,
            RateLimitOutcome::Allowed { .. }
        ));
    }
}
