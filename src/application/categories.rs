use std::sync::Arc;

use bloghub_api_types::{CategoryCreateRequest, CategoryUpdateRequest};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, PostsRepo, RepoError,
    UpdateCategoryParams,
};
use crate::cache::keys::CATEGORIES_ALL_KEY;
use crate::cache::{CacheAside, CacheTrigger, CacheTtl};
use crate::domain::categories::{validate_description, validate_name};
use crate::domain::entities::{CategoryRecord, CategoryWithPosts, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::validate_id;
use crate::domain::slug::derive_slug;

#[derive(Debug, Error)]
pub enum CategoryServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("Slug cannot be empty")]
    EmptySlug,
    #[error("Category with slug \"{0}\" not found")]
    SlugNotFound(String),
    #[error("Category with ID {0} not found")]
    IdNotFound(i64),
    #[error("A category with this name already exists")]
    Conflict,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CategoryService {
    reader: Arc<dyn CategoriesRepo>,
    writer: Arc<dyn CategoriesWriteRepo>,
    posts: Arc<dyn PostsRepo>,
    cache: CacheAside,
    trigger: CacheTrigger,
}

impl CategoryService {
    pub fn new(
        reader: Arc<dyn CategoriesRepo>,
        writer: Arc<dyn CategoriesWriteRepo>,
        posts: Arc<dyn PostsRepo>,
        cache: CacheAside,
        trigger: CacheTrigger,
    ) -> Self {
        Self {
            reader,
            writer,
            posts,
            cache,
            trigger,
        }
    }

    pub async fn list(&self) -> Result<Vec<CategoryRecord>, CategoryServiceError> {
        self.cache
            .get_or_fetch(CATEGORIES_ALL_KEY, CacheTtl::Medium.duration(), || async {
                self.reader
                    .list_categories()
                    .await
                    .map_err(CategoryServiceError::from)
            })
            .await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<CategoryRecord, CategoryServiceError> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(CategoryServiceError::EmptySlug);
        }
        self.reader
            .find_category_by_slug(slug)
            .await?
            .ok_or_else(|| CategoryServiceError::SlugNotFound(slug.to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<CategoryWithPosts, CategoryServiceError> {
        let category = self.require(id).await?;
        let post_ids = self.posts.post_ids_for_category(id).await?;
        Ok(CategoryWithPosts {
            category,
            post_count: post_ids.len(),
            post_ids,
        })
    }

    pub async fn create(
        &self,
        request: CategoryCreateRequest,
    ) -> Result<CategoryRecord, CategoryServiceError> {
        validate_name(&request.name)?;
        let description = normalize_description(request.description)?;
        let slug = derive_slug(&request.name).map_err(DomainError::from)?;

        self.ensure_unique(&request.name, &slug, None).await?;

        let category = self
            .writer
            .create_category(CreateCategoryParams {
                slug,
                name: request.name,
                description,
            })
            .await
            .map_err(|err| write_error(err, None))?;

        info!(
            target: "bloghub::application::categories",
            category_id = category.id,
            slug = %category.slug,
            "Category created"
        );
        self.trigger.category_created().await;
        Ok(category)
    }

    pub async fn update(
        &self,
        id: i64,
        request: CategoryUpdateRequest,
    ) -> Result<CategoryRecord, CategoryServiceError> {
        let existing = self.require(id).await?;

        let (name, slug) = match request.name {
            Some(name) if name != existing.name => {
                validate_name(&name)?;
                let slug = derive_slug(&name).map_err(DomainError::from)?;
                self.ensure_unique(&name, &slug, Some(id)).await?;
                (name, slug)
            }
            _ => (existing.name.clone(), existing.slug.clone()),
        };
        let description = match request.description {
            Some(description) => normalize_description(Some(description))?,
            None => existing.description.clone(),
        };

        let category = self
            .writer
            .update_category(UpdateCategoryParams {
                id,
                slug,
                name,
                description,
            })
            .await
            .map_err(|err| write_error(err, Some(id)))?;

        info!(
            target: "bloghub::application::categories",
            category_id = id,
            slug = %category.slug,
            "Category updated"
        );
        self.trigger.category_changed().await;
        Ok(category)
    }

    /// Deleting an absent category succeeds; listings are invalidated either way.
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        validate_id("id", id)?;
        match self.writer.delete_category(id).await {
            Ok(()) => info!(
                target: "bloghub::application::categories",
                category_id = id,
                "Category deleted"
            ),
            Err(RepoError::NotFound) => debug!(
                target: "bloghub::application::categories",
                category_id = id,
                "Category already absent"
            ),
            Err(err) => return Err(write_error(err, Some(id))),
        }
        self.trigger.category_changed().await;
        Ok(())
    }

    /// Every post in the category, newest first.
    pub async fn posts(&self, id: i64) -> Result<Vec<PostRecord>, CategoryServiceError> {
        self.require(id).await?;
        Ok(self.posts.list_posts_in_category(id, None).await?)
    }

    async fn require(&self, id: i64) -> Result<CategoryRecord, CategoryServiceError> {
        validate_id("id", id)?;
        self.reader
            .find_category_by_id(id)
            .await?
            .ok_or(CategoryServiceError::IdNotFound(id))
    }

    async fn ensure_unique(
        &self,
        name: &str,
        slug: &str,
        except: Option<i64>,
    ) -> Result<(), CategoryServiceError> {
        let by_name = self.reader.find_category_by_name(name).await?;
        let by_slug = self.reader.find_category_by_slug(slug).await?;
        let taken = by_name
            .into_iter()
            .chain(by_slug)
            .any(|category| Some(category.id) != except);
        if taken {
            return Err(CategoryServiceError::Conflict);
        }
        Ok(())
    }
}

/// Blank descriptions are stored as absent.
fn normalize_description(description: Option<String>) -> Result<Option<String>, DomainError> {
    validate_description(description.as_deref())?;
    Ok(description.filter(|value| !value.trim().is_empty()))
}

fn write_error(err: RepoError, id: Option<i64>) -> CategoryServiceError {
    match (err, id) {
        (RepoError::Duplicate { .. }, _) => CategoryServiceError::Conflict,
        (RepoError::NotFound, Some(id)) => CategoryServiceError::IdNotFound(id),
        (other, _) => CategoryServiceError::Repo(other),
    }
}
