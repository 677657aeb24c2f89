//! Request and response types for the BlogHub HTTP API.
//!
//! Field names are camelCase on the wire. Timestamps serialize as RFC 3339
//! strings so payloads survive a JSON round trip unchanged, which the
//! server relies on when it caches listing and lookup results.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A blog post as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A category as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A post together with the categories it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithCategories {
    #[serde(flatten)]
    pub post: Post,
    pub categories: Vec<Category>,
}

/// A category together with the ids of the posts associated with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithPosts {
    #[serde(flatten)]
    pub category: Category,
    pub post_ids: Vec<i64>,
    pub post_count: usize,
}

/// One page of a filtered post listing plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub total: u64,
}

impl PostListResponse {
    pub fn empty() -> Self {
        Self {
            posts: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    pub category_id: Option<i64>,
    pub published: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCreateRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub published: bool,
    pub category_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdateRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
    pub category_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryCreateRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CategoryUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePostResponse {
    pub success: bool,
    pub deleted_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeleteCategoryResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample_post() -> Post {
        Post {
            id: 7,
            title: "Hello World".to_string(),
            content: "Body".to_string(),
            slug: "hello-world".to_string(),
            published: true,
            created_at: datetime!(2024-03-01 10:00 UTC),
            updated_at: datetime!(2024-03-02 11:30 UTC),
        }
    }

    #[test]
    fn post_serializes_camel_case_with_rfc3339_timestamps() {
        let value = serde_json::to_value(sample_post()).expect("serialize post");
        assert_eq!(value["createdAt"], "2024-03-01T10:00:00Z");
        assert_eq!(value["updatedAt"], "2024-03-02T11:30:00Z");
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn post_with_categories_flattens_post_fields() {
        let payload = PostWithCategories {
            post: sample_post(),
            categories: Vec::new(),
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["slug"], "hello-world");
        assert!(value["categories"].as_array().is_some_and(Vec::is_empty));

        let decoded: PostWithCategories = serde_json::from_value(value).expect("deserialize");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn create_request_defaults_to_unpublished() {
        let request: PostCreateRequest =
            serde_json::from_str(r#"{"title":"T","content":"C"}"#).expect("parse");
        assert!(!request.published);
        assert!(request.category_ids.is_none());
    }

    #[test]
    fn delete_response_uses_deleted_id_field() {
        let value = serde_json::to_value(DeletePostResponse {
            success: true,
            deleted_id: 3,
        })
        .expect("serialize");
        assert_eq!(value, serde_json::json!({"success": true, "deletedId": 3}));
    }
}
