//! Cache-aside reads.
//!
//! [`CacheAside::get_or_fetch`] consults the backend first and only calls the
//! fetch on a miss, storing the result afterwards. Backend failures never
//! reach the caller: the value is fetched from the source instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::store::{Cache, CacheError};

pub const METRIC_CACHE_HIT: &str = "bloghub_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "bloghub_cache_miss_total";
pub const METRIC_CACHE_ERROR: &str = "bloghub_cache_error_total";

#[derive(Clone, Default)]
pub struct CacheAside {
    backend: Option<Arc<dyn Cache>>,
}

impl CacheAside {
    pub fn new(backend: Option<Arc<dyn Cache>>) -> Self {
        Self { backend }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Return the cached value for `key`, or fetch, store with `ttl`, and return it.
    ///
    /// Fetch errors are returned unchanged and nothing is stored.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(backend) = self.backend.as_ref() else {
            return fetch().await;
        };

        match backend.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!(target: "bloghub::cache", key, result = "hit", "Cache lookup");
                    counter!(METRIC_CACHE_HIT).increment(1);
                    return Ok(value);
                }
                Err(err) => {
                    // The fresh value overwrites the undecodable entry below.
                    report_backend_error(
                        key,
                        "decode",
                        &CacheError::Serialization(err.to_string()),
                    );
                }
            },
            Ok(None) => {
                debug!(target: "bloghub::cache", key, result = "miss", "Cache lookup");
                counter!(METRIC_CACHE_MISS).increment(1);
            }
            Err(err) => {
                report_backend_error(key, "get", &err);
                return fetch().await;
            }
        }

        let value = fetch().await?;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(err) = backend.set(key, &bytes, ttl).await {
                    report_backend_error(key, "set", &err);
                }
            }
            Err(err) => {
                report_backend_error(
                    key,
                    "encode",
                    &CacheError::Serialization(err.to_string()),
                );
            }
        }

        Ok(value)
    }
}

fn report_backend_error(key: &str, op: &'static str, err: &CacheError) {
    warn!(
        target: "bloghub::cache",
        key,
        op,
        error = %err,
        "Cache backend failed; serving from source"
    );
    counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::store::MemoryCache;

    struct FailingCache;

    #[async_trait]
    impl Cache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::ConnectionFailed("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::ConnectionFailed("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::ConnectionFailed("connection refused".into()))
        }

        async fn delete_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
            Err(CacheError::ConnectionFailed("connection refused".into()))
        }
    }

    fn memory_backend() -> Arc<MemoryCache> {
        Arc::new(MemoryCache::new(NonZeroUsize::new(16).expect("non-zero")))
    }

    fn accessor(backend: Arc<dyn Cache>) -> CacheAside {
        CacheAside::new(Some(backend))
    }

    async fn counted_fetch(calls: &AtomicUsize, value: u32) -> Result<u32, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test]
    async fn second_read_within_ttl_is_served_from_cache() {
        let backend = memory_backend();
        let aside = accessor(backend.clone());
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        let first = aside
            .get_or_fetch("k", ttl, || counted_fetch(&calls, 7))
            .await
            .expect("first");
        let second = aside
            .get_or_fetch("k", ttl, || counted_fetch(&calls, 8))
            .await
            .expect("second");

        assert_eq!((first, second), (7, 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(backend.get("k").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn backend_failure_falls_through_to_fetch() {
        let aside = accessor(Arc::new(FailingCache));
        let calls = AtomicUsize::new(0);

        let value = aside
            .get_or_fetch("k", Duration::from_secs(60), || counted_fetch(&calls, 42))
            .await
            .expect("value despite backend failure");

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_errors_propagate_and_are_not_cached() {
        let backend = memory_backend();
        let aside = accessor(backend.clone());

        let result: Result<u32, String> = aside
            .get_or_fetch("k", Duration::from_secs(60), || async {
                Err("store offline".to_string())
            })
            .await;

        assert_eq!(result, Err("store offline".to_string()));
        assert!(backend.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn undecodable_entry_is_replaced() {
        let backend = memory_backend();
        backend
            .set("k", b"not json", Duration::from_secs(60))
            .await
            .expect("seed");
        let aside = accessor(backend.clone());
        let calls = AtomicUsize::new(0);

        let value = aside
            .get_or_fetch("k", Duration::from_secs(60), || counted_fetch(&calls, 5))
            .await
            .expect("value");

        assert_eq!(value, 5);
        assert_eq!(backend.get("k").await.expect("get"), Some(b"5".to_vec()));
    }

    #[tokio::test]
    async fn disabled_accessor_always_fetches() {
        let aside = CacheAside::disabled();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            aside
                .get_or_fetch("k", Duration::from_secs(60), || counted_fetch(&calls, 1))
                .await
                .expect("value");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
