use std::collections::HashMap;
use std::sync::Arc;

use bloghub_api_types::{PostCreateRequest, PostListQuery, PostUpdateRequest};
use thiserror::Error;
use tracing::info;

use crate::application::listing::{PageWindow, PostFilter, PostListParams, resolve_limit};
use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::cache::keys::{post_key, post_list_key};
use crate::cache::{CacheAside, CacheTrigger, CacheTtl};
use crate::domain::entities::{CategoryRecord, PostPage, PostRecord, PostWithCategories};
use crate::domain::error::DomainError;
use crate::domain::posts::{normalize_category_ids, validate_content, validate_id, validate_title};
use crate::domain::related::{DEFAULT_RELATED_LIMIT, rank_related};
use crate::domain::slug::derive_slug;

pub const CATEGORY_POSTS_DEFAULT_LIMIT: u32 = 10;
/// Published posts considered when ranking related posts.
const RELATED_CANDIDATE_POOL: u32 = 200;

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("Slug cannot be empty")]
    EmptySlug,
    #[error("Post with slug \"{0}\" not found")]
    SlugNotFound(String),
    #[error("Post with ID {0} not found")]
    IdNotFound(i64),
    #[error("A post with this title already exists")]
    Conflict,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    cache: CacheAside,
    trigger: CacheTrigger,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        cache: CacheAside,
        trigger: CacheTrigger,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            trigger,
        }
    }

    /// Filtered, paginated listing. Cached per distinct parameter set.
    pub async fn list(&self, query: PostListQuery) -> Result<PostPage, PostServiceError> {
        let params = PostListParams::from_query(query)?;
        let key = post_list_key(&params);
        self.cache
            .get_or_fetch(&key, CacheTtl::Medium.duration(), || self.load_page(&params))
            .await
    }

    async fn load_page(&self, params: &PostListParams) -> Result<PostPage, PostServiceError> {
        let mut builder = PostFilter::builder();
        if let Some(category_id) = params.category_id {
            let ids = self.reader.post_ids_for_category(category_id).await?;
            if ids.is_empty() {
                return Ok(PostPage::empty());
            }
            builder = builder.id_in(ids);
        }
        let filter = builder
            .published(params.published)
            .title_contains(params.search.as_deref())
            .build();

        let total = self.reader.count_posts(&filter).await?;
        let posts = self.reader.list_posts(&filter, params.window()).await?;
        Ok(PostPage { posts, total })
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<PostWithCategories, PostServiceError> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(PostServiceError::EmptySlug);
        }
        self.cache
            .get_or_fetch(&post_key(slug), CacheTtl::Long.duration(), || async {
                let post = self
                    .reader
                    .find_post_by_slug(slug)
                    .await?
                    .ok_or_else(|| PostServiceError::SlugNotFound(slug.to_string()))?;
                self.with_categories(post).await
            })
            .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<PostWithCategories, PostServiceError> {
        validate_id("id", id)?;
        let post = self
            .reader
            .find_post_by_id(id)
            .await?
            .ok_or(PostServiceError::IdNotFound(id))?;
        self.with_categories(post).await
    }

    pub async fn create(&self, request: PostCreateRequest) -> Result<PostRecord, PostServiceError> {
        validate_title(&request.title)?;
        validate_content(&request.content)?;
        let category_ids = normalize_category_ids(request.category_ids.as_deref().unwrap_or(&[]))?;
        let slug = derive_slug(&request.title).map_err(DomainError::from)?;

        if self.reader.find_post_by_slug(&slug).await?.is_some() {
            return Err(PostServiceError::Conflict);
        }

        let post = self
            .writer
            .create_post(CreatePostParams {
                slug,
                title: request.title,
                content: request.content,
                published: request.published,
                category_ids,
            })
            .await
            .map_err(|err| write_error(err, None))?;

        info!(
            target: "bloghub::application::posts",
            post_id = post.id,
            slug = %post.slug,
            "Post created"
        );
        self.trigger.post_created(&post.slug).await;
        Ok(post)
    }

    pub async fn update(
        &self,
        id: i64,
        request: PostUpdateRequest,
    ) -> Result<PostRecord, PostServiceError> {
        validate_id("id", id)?;
        let existing = self
            .reader
            .find_post_by_id(id)
            .await?
            .ok_or(PostServiceError::IdNotFound(id))?;

        let (title, slug) = match request.title {
            Some(title) if title != existing.title => {
                validate_title(&title)?;
                let slug = derive_slug(&title).map_err(DomainError::from)?;
                (title, slug)
            }
            _ => (existing.title.clone(), existing.slug.clone()),
        };

        if slug != existing.slug
            && let Some(other) = self.reader.find_post_by_slug(&slug).await?
            && other.id != id
        {
            return Err(PostServiceError::Conflict);
        }

        let content = match request.content {
            Some(content) => {
                validate_content(&content)?;
                content
            }
            None => existing.content.clone(),
        };
        let category_ids = request
            .category_ids
            .as_deref()
            .map(normalize_category_ids)
            .transpose()?;

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id,
                slug,
                title,
                content,
                published: request.published.unwrap_or(existing.published),
                category_ids,
            })
            .await
            .map_err(|err| write_error(err, Some(id)))?;

        info!(
            target: "bloghub::application::posts",
            post_id = post.id,
            slug = %post.slug,
            "Post updated"
        );
        self.trigger.post_updated(&existing.slug, &post.slug).await;
        Ok(post)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        validate_id("id", id)?;
        let existing = self
            .reader
            .find_post_by_id(id)
            .await?
            .ok_or(PostServiceError::IdNotFound(id))?;

        self.writer
            .delete_post(id)
            .await
            .map_err(|err| write_error(err, Some(id)))?;

        info!(
            target: "bloghub::application::posts",
            post_id = id,
            slug = %existing.slug,
            "Post deleted"
        );
        self.trigger.post_deleted(&existing.slug).await;
        Ok(())
    }

    pub async fn list_by_category(
        &self,
        category_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<PostRecord>, PostServiceError> {
        validate_id("categoryId", category_id)?;
        let limit = resolve_limit("limit", limit, CATEGORY_POSTS_DEFAULT_LIMIT)?;
        Ok(self
            .reader
            .list_posts_in_category(category_id, Some(limit))
            .await?)
    }

    /// Published posts most similar to post `id`, best match first.
    pub async fn related(
        &self,
        id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<PostRecord>, PostServiceError> {
        let limit = resolve_limit("limit", limit, DEFAULT_RELATED_LIMIT as u32)?;
        let current = self.get_by_id(id).await?;

        let filter = PostFilter::builder().published(Some(true)).build();
        let pool = self
            .reader
            .list_posts(&filter, PageWindow::first(RELATED_CANDIDATE_POOL))
            .await?;
        let candidates = self.attach_categories(pool).await?;

        Ok(rank_related(&current, candidates, limit as usize))
    }

    async fn with_categories(
        &self,
        post: PostRecord,
    ) -> Result<PostWithCategories, PostServiceError> {
        let categories = self.reader.categories_for_post(post.id).await?;
        Ok(PostWithCategories { post, categories })
    }

    async fn attach_categories(
        &self,
        posts: Vec<PostRecord>,
    ) -> Result<Vec<PostWithCategories>, PostServiceError> {
        let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
        let mut by_post: HashMap<i64, Vec<CategoryRecord>> = HashMap::new();
        for (post_id, category) in self.reader.categories_for_posts(&ids).await? {
            by_post.entry(post_id).or_default().push(category);
        }

        Ok(posts
            .into_iter()
            .map(|post| {
                let categories = by_post.remove(&post.id).unwrap_or_default();
                PostWithCategories { post, categories }
            })
            .collect())
    }
}

fn write_error(err: RepoError, id: Option<i64>) -> PostServiceError {
    match (err, id) {
        (RepoError::Duplicate { .. }, _) => PostServiceError::Conflict,
        (RepoError::NotFound, Some(id)) => PostServiceError::IdNotFound(id),
        (other, _) => PostServiceError::Repo(other),
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use time::macros::datetime;

    use super::*;
    use crate::application::repos::{CategoriesWriteRepo, CreateCategoryParams};
    use crate::cache::{Cache, MemoryCache};
    use crate::infra::memory::InMemoryRepositories;

    struct Fixture {
        repos: Arc<InMemoryRepositories>,
        cache: Arc<MemoryCache>,
        service: PostService,
    }

    fn fixture() -> Fixture {
        let repos = Arc::new(InMemoryRepositories::new());
        let cache = Arc::new(MemoryCache::new(NonZeroUsize::new(64).expect("non-zero")));
        let backend: Arc<dyn Cache> = cache.clone();
        let service = PostService::new(
            repos.clone(),
            repos.clone(),
            CacheAside::new(Some(backend.clone())),
            CacheTrigger::new(Some(backend)),
        );
        Fixture {
            repos,
            cache,
            service,
        }
    }

    fn create_request(title: &str, published: bool, category_ids: &[i64]) -> PostCreateRequest {
        PostCreateRequest {
            title: title.to_string(),
            content: format!("Body of {title}"),
            published,
            category_ids: Some(category_ids.to_vec()),
        }
    }

    async fn category(repos: &InMemoryRepositories, name: &str) -> i64 {
        repos
            .create_category(CreateCategoryParams {
                slug: derive_slug(name).expect("slug"),
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("category")
            .id
    }

    #[tokio::test]
    async fn listing_combines_filters() {
        let fx = fixture();
        let a = category(&fx.repos, "Alpha").await;
        let b = category(&fx.repos, "Beta").await;
        let p1 = fx
            .service
            .create(create_request("First post", true, &[a]))
            .await
            .expect("p1");
        fx.service
            .create(create_request("Second post", false, &[a]))
            .await
            .expect("p2");
        fx.service
            .create(create_request("Third unique", true, &[b]))
            .await
            .expect("p3");

        let page = fx
            .service
            .list(PostListQuery {
                category_id: Some(a),
                published: Some(true),
                ..PostListQuery::default()
            })
            .await
            .expect("filtered");
        assert_eq!(page.total, 1);
        assert_eq!(page.posts[0].id, p1.id);

        let page = fx
            .service
            .list(PostListQuery {
                search: Some("UNIQUE".to_string()),
                ..PostListQuery::default()
            })
            .await
            .expect("search");
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].title, "Third unique");
    }

    #[tokio::test]
    async fn pages_are_ordered_newest_first_with_id_tie_break() {
        let fx = fixture();
        let mut ids = Vec::new();
        for n in 1..=5 {
            let post = fx
                .service
                .create(create_request(&format!("Post {n}"), n != 3, &[]))
                .await
                .expect("create");
            ids.push(post.id);
        }
        let tied = datetime!(2024-05-01 12:00 UTC);
        for &id in &ids {
            fx.repos.set_post_created_at(id, tied).await;
        }
        fx.repos
            .set_post_created_at(ids[1], datetime!(2024-05-02 12:00 UTC))
            .await;

        let page = |limit: u32, offset: u64, published: Option<bool>| PostListQuery {
            published,
            limit: Some(limit),
            offset: Some(offset),
            ..PostListQuery::default()
        };
        let page_ids = |page: &PostPage| page.posts.iter().map(|post| post.id).collect::<Vec<_>>();

        let first = fx.service.list(page(2, 0, None)).await.expect("first page");
        let second = fx.service.list(page(2, 2, None)).await.expect("second page");
        let last = fx.service.list(page(2, 4, None)).await.expect("last page");
        assert_eq!(page_ids(&first), vec![ids[1], ids[4]]);
        assert_eq!(page_ids(&second), vec![ids[3], ids[2]]);
        assert_eq!(page_ids(&last), vec![ids[0]]);
        for listing in [&first, &second, &last] {
            assert_eq!(listing.total, 5);
        }

        let published = fx
            .service
            .list(page(2, 2, Some(true)))
            .await
            .expect("published page");
        assert_eq!(page_ids(&published), vec![ids[3], ids[0]]);
        assert_eq!(published.total, 4);

        let beyond = fx.service.list(page(2, 10, None)).await.expect("past the end");
        assert!(beyond.posts.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[tokio::test]
    async fn empty_category_short_circuits() {
        let fx = fixture();
        let empty = category(&fx.repos, "Empty").await;
        fx.service
            .create(create_request("Loose post", true, &[]))
            .await
            .expect("post");

        let page = fx
            .service
            .list(PostListQuery {
                category_id: Some(empty),
                ..PostListQuery::default()
            })
            .await
            .expect("listing");
        assert_eq!(page, PostPage::empty());
    }

    #[tokio::test]
    async fn creating_a_post_evicts_cached_listing() {
        let fx = fixture();
        let first = fx
            .service
            .list(PostListQuery::default())
            .await
            .expect("listing");
        assert_eq!(first.total, 0);
        let key = "posts:list:limit:20:offset:0";
        assert!(fx.cache.get(key).await.expect("get").is_some());

        fx.service
            .create(create_request("Fresh", true, &[]))
            .await
            .expect("create");

        assert!(fx.cache.get(key).await.expect("get").is_none());
        let second = fx
            .service
            .list(PostListQuery::default())
            .await
            .expect("listing");
        assert_eq!(second.total, 1);
    }

    #[tokio::test]
    async fn duplicate_title_conflicts() {
        let fx = fixture();
        fx.service
            .create(create_request("Hello World", true, &[]))
            .await
            .expect("first");
        let err = fx
            .service
            .create(create_request("hello world!", true, &[]))
            .await
            .expect_err("slug collision");
        assert!(matches!(err, PostServiceError::Conflict));
    }

    #[tokio::test]
    async fn slug_lookup_reports_missing_and_blank() {
        let fx = fixture();
        let err = fx.service.get_by_slug("nope").await.expect_err("missing");
        assert_eq!(err.to_string(), "Post with slug \"nope\" not found");
        assert!(fx.cache.get("post:nope").await.expect("get").is_none());

        let err = fx.service.get_by_slug("   ").await.expect_err("blank");
        assert!(matches!(err, PostServiceError::EmptySlug));
    }

    #[tokio::test]
    async fn retitling_moves_slug_and_evicts_old_entry() {
        let fx = fixture();
        let post = fx
            .service
            .create(create_request("Old name", true, &[]))
            .await
            .expect("create");
        fx.service.get_by_slug("old-name").await.expect("warm");
        assert!(fx.cache.get("post:old-name").await.expect("get").is_some());

        let updated = fx
            .service
            .update(
                post.id,
                PostUpdateRequest {
                    title: Some("New name".to_string()),
                    ..PostUpdateRequest::default()
                },
            )
            .await
            .expect("update");

        assert_eq!(updated.slug, "new-name");
        assert_eq!(updated.content, post.content);
        assert!(fx.cache.get("post:old-name").await.expect("get").is_none());
        assert!(fx.service.get_by_slug("new-name").await.is_ok());
    }

    #[tokio::test]
    async fn update_replaces_categories() {
        let fx = fixture();
        let a = category(&fx.repos, "Alpha").await;
        let b = category(&fx.repos, "Beta").await;
        let post = fx
            .service
            .create(create_request("Tagged", true, &[a]))
            .await
            .expect("create");

        fx.service
            .update(
                post.id,
                PostUpdateRequest {
                    category_ids: Some(vec![b]),
                    ..PostUpdateRequest::default()
                },
            )
            .await
            .expect("update");

        let loaded = fx.service.get_by_id(post.id).await.expect("load");
        let ids: Vec<i64> = loaded.categories.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b]);
    }

    #[tokio::test]
    async fn delete_missing_post_is_not_found() {
        let fx = fixture();
        let err = fx.service.delete(99).await.expect_err("missing");
        assert_eq!(err.to_string(), "Post with ID 99 not found");
    }

    #[tokio::test]
    async fn category_listing_rejects_oversized_limit() {
        let fx = fixture();
        let err = fx
            .service
            .list_by_category(1, Some(101))
            .await
            .expect_err("limit");
        assert!(matches!(err, PostServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn related_prefers_shared_categories() {
        let fx = fixture();
        let rust = category(&fx.repos, "Rust").await;
        let cooking = category(&fx.repos, "Cooking").await;
        let current = fx
            .service
            .create(create_request("Async traits", true, &[rust]))
            .await
            .expect("current");
        let close = fx
            .service
            .create(create_request("Ownership basics", true, &[rust]))
            .await
            .expect("close");
        fx.service
            .create(create_request("Sourdough", true, &[cooking]))
            .await
            .expect("far");
        fx.service
            .create(create_request("Draft about rust", false, &[rust]))
            .await
            .expect("draft");

        let related = fx.service.related(current.id, None).await.expect("related");
        assert_eq!(related.first().map(|post| post.id), Some(close.id));
        assert!(related.iter().all(|post| post.published));
        assert!(related.iter().all(|post| post.id != current.id));
    }
}
