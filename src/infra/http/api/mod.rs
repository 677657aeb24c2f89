pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::RouterState;

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let rate_state = state.api.clone();

    Router::new()
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route("/api/posts/slug/{slug}", get(handlers::get_post_by_slug))
        .route(
            "/api/posts/by-category/{category_id}",
            get(handlers::list_posts_by_category),
        )
        .route(
            "/api/posts/{id}",
            get(handlers::get_post_by_id)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route("/api/posts/{id}/related", get(handlers::related_posts))
        .route(
            "/api/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/api/categories/slug/{slug}",
            get(handlers::get_category_by_slug),
        )
        .route(
            "/api/categories/{id}",
            get(handlers::get_category_by_id)
                .patch(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/api/categories/{id}/posts",
            get(handlers::list_category_posts),
        )
        .route("/api/cache/purge", post(handlers::purge_cache))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            rate_state,
            middleware::api_rate_limit,
        ))
}
