use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, RepoError, UpdateCategoryParams,
};
use crate::domain::entities::CategoryRecord;

use super::{CATEGORY_COLUMNS, PostgresRepositories, map_sqlx_error};

const RETURNING_CATEGORY: &str =
    "RETURNING id, name, description, slug, created_at, updated_at";

impl PostgresRepositories {
    async fn find_category_where(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<CategoryRecord>, RepoError> {
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.{column} = $1"
        ))
        .bind(value)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c ORDER BY c.created_at DESC, c.id DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<CategoryRecord>, RepoError> {
        self.find_category_where("slug", slug).await
    }

    async fn find_category_by_id(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CategoryRecord>, RepoError> {
        self.find_category_where("name", name).await
    }
}

#[async_trait]
impl CategoriesWriteRepo for PostgresRepositories {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let CreateCategoryParams {
            slug,
            name,
            description,
        } = params;

        let now = OffsetDateTime::now_utc();
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "INSERT INTO categories (name, description, slug, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) {RETURNING_CATEGORY}"
        ))
        .bind(name)
        .bind(description)
        .bind(slug)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let UpdateCategoryParams {
            id,
            slug,
            name,
            description,
        } = params;

        let now = OffsetDateTime::now_utc();
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "UPDATE categories \
             SET name = $2, description = $3, slug = $4, updated_at = $5 \
             WHERE id = $1 {RETURNING_CATEGORY}"
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(slug)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)
    }

    async fn delete_category(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
