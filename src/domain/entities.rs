//! Domain entities mirrored from persistent storage.
//!
//! The field layout lives in the wire-types crate so that rows, cached values
//! and API responses share a single shape.

pub use bloghub_api_types::{
    Category as CategoryRecord, CategoryWithPosts, Post as PostRecord, PostListResponse as PostPage,
    PostWithCategories,
};

/// One row of the post/category association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostCategoryLink {
    pub post_id: i64,
    pub category_id: i64,
}
