//! Cache invalidation after writes.
//!
//! Every method runs after the write has committed and never fails: backend
//! errors are logged and dropped so a mutation cannot be undone by a cache
//! outage. Listing keys are removed by prefix, which may over-invalidate but
//! never leaves a stale page inside `posts:list:*`.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::keys::{CATEGORIES_PATTERN, POST_LIST_PATTERN, POST_PATTERN, post_key};
use super::store::Cache;

pub const METRIC_CACHE_INVALIDATION: &str = "bloghub_cache_invalidation_total";

#[derive(Clone, Default)]
pub struct CacheTrigger {
    backend: Option<Arc<dyn Cache>>,
}

impl CacheTrigger {
    pub fn new(backend: Option<Arc<dyn Cache>>) -> Self {
        Self { backend }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub async fn post_created(&self, slug: &str) {
        debug!(target: "bloghub::cache", slug, event = "post_created", "Invalidating cache");
        self.delete_pattern(POST_LIST_PATTERN).await;
    }

    /// `old_slug` and `new_slug` differ when the title changed.
    pub async fn post_updated(&self, old_slug: &str, new_slug: &str) {
        debug!(
            target: "bloghub::cache",
            old_slug,
            new_slug,
            event = "post_updated",
            "Invalidating cache"
        );
        self.delete_pattern(POST_LIST_PATTERN).await;
        self.delete_key(&post_key(old_slug)).await;
        if new_slug != old_slug {
            self.delete_key(&post_key(new_slug)).await;
        }
    }

    pub async fn post_deleted(&self, slug: &str) {
        debug!(target: "bloghub::cache", slug, event = "post_deleted", "Invalidating cache");
        self.delete_pattern(POST_LIST_PATTERN).await;
        self.delete_key(&post_key(slug)).await;
    }

    pub async fn category_created(&self) {
        debug!(target: "bloghub::cache", event = "category_created", "Invalidating cache");
        self.delete_pattern(CATEGORIES_PATTERN).await;
    }

    /// Posts embed their categories, so cached posts and listings go too.
    pub async fn category_changed(&self) {
        debug!(target: "bloghub::cache", event = "category_changed", "Invalidating cache");
        self.purge_all().await;
    }

    pub async fn purge_all(&self) {
        self.delete_pattern(POST_LIST_PATTERN).await;
        self.delete_pattern(POST_PATTERN).await;
        self.delete_pattern(CATEGORIES_PATTERN).await;
    }

    async fn delete_pattern(&self, pattern: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        match backend.delete_pattern(pattern).await {
            Ok(removed) => {
                counter!(METRIC_CACHE_INVALIDATION, "kind" => "pattern").increment(removed);
                debug!(target: "bloghub::cache", pattern, removed, "Invalidated cache pattern");
            }
            Err(err) => warn!(
                target: "bloghub::cache",
                pattern,
                error = %err,
                "Cache invalidation failed"
            ),
        }
    }

    async fn delete_key(&self, key: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        match backend.delete(key).await {
            Ok(()) => counter!(METRIC_CACHE_INVALIDATION, "kind" => "key").increment(1),
            Err(err) => warn!(
                target: "bloghub::cache",
                key,
                error = %err,
                "Cache invalidation failed"
            ),
        }
    }
}
