//! Cache maintenance handlers

use axum::extract::State;
use axum::http::StatusCode;
use tracing::info;

use crate::infra::http::api::state::ApiState;

/// Drop every listing, post and category entry.
pub async fn purge_cache(State(state): State<ApiState>) -> StatusCode {
    state.cache.purge_all().await;
    info!(target: "bloghub::cache", "Cache purged on request");
    StatusCode::NO_CONTENT
}
