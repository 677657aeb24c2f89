//! In-memory repositories.
//!
//! Used when no database URL is configured and by tests. Enforces the same
//! unique constraints and cascade rules as the Postgres schema; data is lost
//! when the process exits.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::application::listing::{PageWindow, PostFilter};
use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, CreatePostParams, PostsRepo,
    PostsWriteRepo, RepoError, StoreHealth, UpdateCategoryParams, UpdatePostParams,
};
use crate::domain::entities::{CategoryRecord, PostCategoryLink, PostRecord};

#[derive(Debug, Default)]
struct MemoryState {
    posts: BTreeMap<i64, PostRecord>,
    categories: BTreeMap<i64, CategoryRecord>,
    links: BTreeSet<PostCategoryLink>,
    next_post_id: i64,
    next_category_id: i64,
}

impl MemoryState {
    fn posts_newest_first(&self) -> Vec<&PostRecord> {
        let mut posts: Vec<&PostRecord> = self.posts.values().collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        posts
    }

    fn ensure_post_slug_free(&self, slug: &str, except: Option<i64>) -> Result<(), RepoError> {
        if self
            .posts
            .values()
            .any(|post| post.slug == slug && Some(post.id) != except)
        {
            return Err(duplicate("posts_slug_key"));
        }
        Ok(())
    }

    fn ensure_category_free(
        &self,
        name: &str,
        slug: &str,
        except: Option<i64>,
    ) -> Result<(), RepoError> {
        for category in self.categories.values() {
            if Some(category.id) == except {
                continue;
            }
            if category.name == name {
                return Err(duplicate("categories_name_key"));
            }
            if category.slug == slug {
                return Err(duplicate("categories_slug_key"));
            }
        }
        Ok(())
    }

    fn replace_links(&mut self, post_id: i64, category_ids: &[i64]) -> Result<(), RepoError> {
        if let Some(missing) = category_ids
            .iter()
            .find(|id| !self.categories.contains_key(id))
        {
            return Err(RepoError::InvalidInput {
                message: format!("category {missing} does not exist"),
            });
        }
        self.links.retain(|link| link.post_id != post_id);
        self.links
            .extend(category_ids.iter().map(|&category_id| PostCategoryLink {
                post_id,
                category_id,
            }));
        Ok(())
    }

    fn categories_of(&self, post_id: i64) -> Vec<CategoryRecord> {
        let mut categories: Vec<CategoryRecord> = self
            .links
            .iter()
            .filter(|link| link.post_id == post_id)
            .filter_map(|link| self.categories.get(&link.category_id).cloned())
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        categories
    }
}

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRepositories {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a post's creation time, e.g. to arrange ordering ties.
    #[cfg(test)]
    pub(crate) async fn set_post_created_at(&self, id: i64, created_at: OffsetDateTime) {
        if let Some(post) = self.state.write().await.posts.get_mut(&id) {
            post.created_at = created_at;
        }
    }
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn post_ids_for_category(&self, category_id: i64) -> Result<Vec<i64>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .links
            .iter()
            .filter(|link| link.category_id == category_id)
            .map(|link| link.post_id)
            .collect())
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state.posts.values().filter(|post| filter.matches(post)).count() as u64)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        Ok(state
            .posts_newest_first()
            .into_iter()
            .filter(|post| filter.matches(post))
            .skip(offset)
            .take(window.limit as usize)
            .cloned()
            .collect())
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.posts.values().find(|post| post.slug == slug).cloned())
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }

    async fn categories_for_post(&self, post_id: i64) -> Result<Vec<CategoryRecord>, RepoError> {
        Ok(self.state.read().await.categories_of(post_id))
    }

    async fn categories_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<(i64, CategoryRecord)>, RepoError> {
        let state = self.state.read().await;
        Ok(post_ids
            .iter()
            .flat_map(|&post_id| {
                state
                    .categories_of(post_id)
                    .into_iter()
                    .map(move |category| (post_id, category))
            })
            .collect())
    }

    async fn list_posts_in_category(
        &self,
        category_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let limit = limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(state
            .posts_newest_first()
            .into_iter()
            .filter(|post| {
                state.links.contains(&PostCategoryLink {
                    post_id: post.id,
                    category_id,
                })
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_post_slug_free(&params.slug, None)?;

        let id = state.next_post_id + 1;
        state.replace_links(id, &params.category_ids)?;
        state.next_post_id = id;

        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id,
            title: params.title,
            content: params.content,
            slug: params.slug,
            published: params.published,
            created_at: now,
            updated_at: now,
        };
        state.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&params.id) {
            return Err(RepoError::NotFound);
        }
        state.ensure_post_slug_free(&params.slug, Some(params.id))?;
        if let Some(category_ids) = params.category_ids.as_deref() {
            state.replace_links(params.id, category_ids)?;
        }

        let post = state
            .posts
            .get_mut(&params.id)
            .ok_or(RepoError::NotFound)?;
        post.title = params.title;
        post.content = params.content;
        post.slug = params.slug;
        post.published = params.published;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state.posts.remove(&id).ok_or(RepoError::NotFound)?;
        state.links.retain(|link| link.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CategoriesRepo for InMemoryRepositories {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let state = self.state.read().await;
        let mut categories: Vec<CategoryRecord> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(categories)
    }

    async fn find_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<CategoryRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .categories
            .values()
            .find(|category| category.slug == slug)
            .cloned())
    }

    async fn find_category_by_id(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn find_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CategoryRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .categories
            .values()
            .find(|category| category.name == name)
            .cloned())
    }
}

#[async_trait]
impl CategoriesWriteRepo for InMemoryRepositories {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_category_free(&params.name, &params.slug, None)?;

        state.next_category_id += 1;
        let now = OffsetDateTime::now_utc();
        let category = CategoryRecord {
            id: state.next_category_id,
            name: params.name,
            description: params.description,
            slug: params.slug,
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_category_free(&params.name, &params.slug, Some(params.id))?;

        let category = state
            .categories
            .get_mut(&params.id)
            .ok_or(RepoError::NotFound)?;
        category.name = params.name;
        category.description = params.description;
        category.slug = params.slug;
        category.updated_at = OffsetDateTime::now_utc();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state.categories.remove(&id).ok_or(RepoError::NotFound)?;
        state.links.retain(|link| link.category_id != id);
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for InMemoryRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
