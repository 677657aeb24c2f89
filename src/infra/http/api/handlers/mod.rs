//! API handlers organized by resource type.
//!
//! Each submodule holds the handlers for one resource. Service errors are
//! converted to [`ApiError`] here so every resource reports them the same way.

mod cache;
mod categories;
mod posts;

pub use cache::*;
pub use categories::*;
pub use posts::*;

use axum::http::StatusCode;

use crate::application::categories::CategoryServiceError;
use crate::application::posts::PostServiceError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

use super::error::{ApiError, codes};

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => {
            ApiError::conflict("Duplicate record", Some(constraint))
        }
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => {
            ApiError::bad_request("Invalid input", Some(message))
        }
        RepoError::Integrity { message } => {
            ApiError::conflict("Integrity constraint violated", Some(message))
        }
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::SERVICE_UNAVAILABLE,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::internal(message),
    }
}

pub(crate) fn domain_to_api(err: DomainError) -> ApiError {
    ApiError::bad_request(err.to_string(), Some(err.field().to_string()))
}

pub(crate) fn post_to_api(err: PostServiceError) -> ApiError {
    match err {
        PostServiceError::Validation(inner) => domain_to_api(inner),
        PostServiceError::EmptySlug => ApiError::bad_request(err.to_string(), None),
        PostServiceError::SlugNotFound(_) | PostServiceError::IdNotFound(_) => {
            ApiError::not_found(err.to_string())
        }
        PostServiceError::Conflict => ApiError::conflict(err.to_string(), None),
        PostServiceError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn category_to_api(err: CategoryServiceError) -> ApiError {
    match err {
        CategoryServiceError::Validation(inner) => domain_to_api(inner),
        CategoryServiceError::EmptySlug => ApiError::bad_request(err.to_string(), None),
        CategoryServiceError::SlugNotFound(_) | CategoryServiceError::IdNotFound(_) => {
            ApiError::not_found(err.to_string())
        }
        CategoryServiceError::Conflict => ApiError::conflict(err.to_string(), None),
        CategoryServiceError::Repo(repo) => repo_to_api(repo),
    }
}

/// Malformed path, query or body input.
pub(crate) fn rejection_to_api(rejection: impl std::fmt::Display) -> ApiError {
    ApiError::bad_request("Malformed request", Some(rejection.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_status_codes() {
        assert_eq!(
            post_to_api(PostServiceError::SlugNotFound("x".to_string())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            post_to_api(PostServiceError::Conflict).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            post_to_api(PostServiceError::EmptySlug).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            category_to_api(CategoryServiceError::Repo(RepoError::Timeout)).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            category_to_api(CategoryServiceError::Repo(RepoError::from_persistence("boom")))
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_is_preserved() {
        let err = post_to_api(PostServiceError::SlugNotFound("missing".to_string()));
        assert_eq!(err.message(), "Post with slug \"missing\" not found");
    }
}
