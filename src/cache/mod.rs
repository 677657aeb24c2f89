//! BlogHub cache layer.
//!
//! - [`keys`] derives deterministic keys for listings, single posts and the
//!   category list.
//! - [`Cache`] is the backend seam: in-process LRU ([`MemoryCache`]) or Redis
//!   ([`RedisCache`]). No backend means caching is off.
//! - [`CacheAside`] serves reads; [`CacheTrigger`] invalidates after writes.
//!
//! ```toml
//! [cache]
//! backend = "memory"        # disabled | memory | redis
//! memory_max_entries = 1024
//! ```

mod aside;
mod config;
pub mod keys;
mod lock;
mod redis_cache;
mod store;
mod trigger;

use std::sync::Arc;

use redis::aio::ConnectionManager;

pub use aside::CacheAside;
pub use config::{CacheConfig, CacheTtl};
pub use redis_cache::RedisCache;
pub use store::{Cache, CacheError, MemoryCache};
pub use trigger::CacheTrigger;

use crate::config::BackendKind;
use crate::infra::error::InfraError;

/// Metric names emitted by the cache layer.
pub mod metric_names {
    pub use super::aside::{METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS};
    pub use super::trigger::METRIC_CACHE_INVALIDATION;
}

/// Build the configured backend. `Ok(None)` when caching is disabled.
pub fn build_backend(
    config: &CacheConfig,
    redis: Option<&ConnectionManager>,
) -> Result<Option<Arc<dyn Cache>>, InfraError> {
    match config.backend {
        BackendKind::Disabled => Ok(None),
        BackendKind::Memory => Ok(Some(Arc::new(MemoryCache::new(config.memory_max_entries)))),
        BackendKind::Redis => {
            let conn = redis.ok_or_else(|| {
                InfraError::configuration("cache backend `redis` requires `redis.url`")
            })?;
            Ok(Some(Arc::new(RedisCache::new(conn.clone()))))
        }
    }
}
