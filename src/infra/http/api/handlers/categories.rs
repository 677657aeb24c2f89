//! Category handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bloghub_api_types::{CategoryCreateRequest, CategoryUpdateRequest, DeleteCategoryResponse};

use super::{category_to_api, rejection_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_categories(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.categories.list().await.map_err(category_to_api)?;
    Ok(Json(categories))
}

pub async fn get_category_by_slug(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .categories
        .get_by_slug(&slug)
        .await
        .map_err(category_to_api)?;
    Ok(Json(category))
}

pub async fn get_category_by_id(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(rejection_to_api)?;
    let category = state
        .categories
        .get_by_id(id)
        .await
        .map_err(category_to_api)?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<ApiState>,
    payload: Result<Json<CategoryCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(rejection_to_api)?;
    let category = state
        .categories
        .create(payload)
        .await
        .map_err(category_to_api)?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CategoryUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(rejection_to_api)?;
    let Json(payload) = payload.map_err(rejection_to_api)?;
    let category = state
        .categories
        .update(id, payload)
        .await
        .map_err(category_to_api)?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(rejection_to_api)?;
    state
        .categories
        .delete(id)
        .await
        .map_err(category_to_api)?;
    Ok(Json(DeleteCategoryResponse { success: true }))
}

pub async fn list_category_posts(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(rejection_to_api)?;
    let posts = state.categories.posts(id).await.map_err(category_to_api)?;
    Ok(Json(posts))
}
