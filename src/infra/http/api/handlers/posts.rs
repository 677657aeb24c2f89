//! Posts handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bloghub_api_types::{
    DeletePostResponse, LimitQuery, PostCreateRequest, PostListQuery, PostUpdateRequest,
};

use super::{post_to_api, rejection_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_posts(
    State(state): State<ApiState>,
    query: Result<Query<PostListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(rejection_to_api)?;
    let page = state.posts.list(query).await.map_err(post_to_api)?;
    Ok(Json(page))
}

pub async fn get_post_by_slug(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.posts.get_by_slug(&slug).await.map_err(post_to_api)?;
    Ok(Json(post))
}

pub async fn get_post_by_id(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(rejection_to_api)?;
    let post = state.posts.get_by_id(id).await.map_err(post_to_api)?;
    Ok(Json(post))
}

pub async fn create_post(
    State(state): State<ApiState>,
    payload: Result<Json<PostCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(rejection_to_api)?;
    let post = state.posts.create(payload).await.map_err(post_to_api)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PostUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(rejection_to_api)?;
    let Json(payload) = payload.map_err(rejection_to_api)?;
    let post = state.posts.update(id, payload).await.map_err(post_to_api)?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(rejection_to_api)?;
    state.posts.delete(id).await.map_err(post_to_api)?;
    Ok(Json(DeletePostResponse {
        success: true,
        deleted_id: id,
    }))
}

pub async fn list_posts_by_category(
    State(state): State<ApiState>,
    category_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(category_id) = category_id.map_err(rejection_to_api)?;
    let Query(query) = query.map_err(rejection_to_api)?;
    let posts = state
        .posts
        .list_by_category(category_id, query.limit)
        .await
        .map_err(post_to_api)?;
    Ok(Json(posts))
}

pub async fn related_posts(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(rejection_to_api)?;
    let Query(query) = query.map_err(rejection_to_api)?;
    let posts = state
        .posts
        .related(id, query.limit)
        .await
        .map_err(post_to_api)?;
    Ok(Json(posts))
}
