//! Filtered post listing: parameter resolution and the predicate list handed
//! to persistence adapters.

use bloghub_api_types::PostListQuery;

use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::validate_id;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Listing parameters after defaults are applied and bounds are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostListParams {
    pub category_id: Option<i64>,
    pub published: Option<bool>,
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u64,
}

impl PostListParams {
    pub fn from_query(query: PostListQuery) -> Result<Self, DomainError> {
        if let Some(category_id) = query.category_id {
            validate_id("categoryId", category_id)?;
        }
        let limit = resolve_limit("limit", query.limit, DEFAULT_LIMIT)?;
        let search = query
            .search
            .map(|search| search.trim().to_string())
            .filter(|search| !search.is_empty());

        Ok(Self {
            category_id: query.category_id,
            published: query.published,
            search,
            limit,
            offset: query.offset.unwrap_or(0),
        })
    }

    pub fn window(&self) -> PageWindow {
        PageWindow {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Apply `default` when absent and reject anything outside `1..=MAX_LIMIT`.
pub fn resolve_limit(
    field: &'static str,
    limit: Option<u32>,
    default: u32,
) -> Result<u32, DomainError> {
    let limit = limit.unwrap_or(default);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(DomainError::validation(
            field,
            format!("must be between 1 and {MAX_LIMIT}"),
        ));
    }
    Ok(limit)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u32,
    pub offset: u64,
}

impl PageWindow {
    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }

    pub fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + u64::from(self.limit),
        }
    }
}

/// One independent condition on a post row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostPredicate {
    IdIn(Vec<i64>),
    Published(bool),
    /// Case-insensitive substring of the title. Stored unescaped.
    TitleContains(String),
}

impl PostPredicate {
    pub fn matches(&self, post: &PostRecord) -> bool {
        match self {
            Self::IdIn(ids) => ids.contains(&post.id),
            Self::Published(flag) => post.published == *flag,
            Self::TitleContains(needle) => post
                .title
                .to_lowercase()
                .contains(needle.to_lowercase().as_str()),
        }
    }
}

/// Conjunction of predicates. An empty filter matches every post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    predicates: Vec<PostPredicate>,
}

impl PostFilter {
    pub fn builder() -> PostFilterBuilder {
        PostFilterBuilder::default()
    }

    pub fn predicates(&self) -> &[PostPredicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, post: &PostRecord) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(post))
    }
}

#[derive(Debug, Default)]
pub struct PostFilterBuilder {
    predicates: Vec<PostPredicate>,
}

impl PostFilterBuilder {
    pub fn id_in(mut self, ids: Vec<i64>) -> Self {
        self.predicates.push(PostPredicate::IdIn(ids));
        self
    }

    pub fn published(mut self, published: Option<bool>) -> Self {
        if let Some(flag) = published {
            self.predicates.push(PostPredicate::Published(flag));
        }
        self
    }

    pub fn title_contains(mut self, search: Option<&str>) -> Self {
        if let Some(search) = search.filter(|value| !value.is_empty()) {
            self.predicates
                .push(PostPredicate::TitleContains(search.to_string()));
        }
        self
    }

    pub fn build(self) -> PostFilter {
        PostFilter {
            predicates: self.predicates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> PostListQuery {
        PostListQuery::default()
    }

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let params = PostListParams::from_query(query()).expect("defaults");
        assert_eq!(params.limit, DEFAULT_LIMIT);
        assert_eq!(params.offset, 0);
        assert!(params.search.is_none());
    }

    #[test]
    fn limit_outside_bounds_is_rejected() {
        for limit in [0, MAX_LIMIT + 1] {
            let err = PostListParams::from_query(PostListQuery {
                limit: Some(limit),
                ..query()
            })
            .expect_err("out of range");
            assert_eq!(err.field(), "limit");
        }
        assert!(
            PostListParams::from_query(PostListQuery {
                limit: Some(MAX_LIMIT),
                ..query()
            })
            .is_ok()
        );
    }

    #[test]
    fn blank_search_is_treated_as_absent() {
        let params = PostListParams::from_query(PostListQuery {
            search: Some("   ".to_string()),
            ..query()
        })
        .expect("params");
        assert!(params.search.is_none());
    }

    #[test]
    fn builder_skips_absent_inputs() {
        let filter = PostFilter::builder()
            .published(None)
            .title_contains(None)
            .build();
        assert!(filter.is_empty());

        let filter = PostFilter::builder()
            .id_in(vec![1, 2])
            .published(Some(true))
            .title_contains(Some("rust"))
            .build();
        assert_eq!(
            filter.predicates(),
            &[
                PostPredicate::IdIn(vec![1, 2]),
                PostPredicate::Published(true),
                PostPredicate::TitleContains("rust".to_string()),
            ]
        );
    }

    #[test]
    fn page_window_advances_by_limit() {
        let window = PageWindow::first(200).next().next();
        assert_eq!(window.offset, 400);
        assert_eq!(window.limit, 200);
    }
}
