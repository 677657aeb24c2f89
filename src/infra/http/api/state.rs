use std::sync::Arc;

use crate::application::categories::CategoryService;
use crate::application::posts::PostService;
use crate::cache::CacheTrigger;

use super::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub posts: Arc<PostService>,
    pub categories: Arc<CategoryService>,
    pub cache: CacheTrigger,
    pub rate_limiter: Arc<RateLimiter>,
}
