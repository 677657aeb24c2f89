use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::application::listing::{PageWindow, PostFilter};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::{CategoryRecord, PostRecord};
use crate::infra::db::{CATEGORY_COLUMNS, POST_COLUMNS, PostgresRepositories, map_sqlx_error};

use super::types::{CountRow, PostCategoryRow};

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn post_ids_for_category(&self, category_id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT post_id FROM post_categories WHERE category_id = $1 ORDER BY post_id",
        )
        .bind(category_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS count FROM posts p");
        Self::push_post_filter(&mut qb, filter);

        let row = qb
            .build_query_as::<CountRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(row.count)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let offset = i64::try_from(window.offset)
            .map_err(|_| RepoError::InvalidInput {
                message: "offset exceeds supported range".to_string(),
            })?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM posts p");
        Self::push_post_filter(&mut qb, filter);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        qb.build_query_as::<PostRecord>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        sqlx::query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        sqlx::query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn categories_for_post(&self, post_id: i64) -> Result<Vec<CategoryRecord>, RepoError> {
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "SELECT {CATEGORY_COLUMNS} \
             FROM categories c \
             INNER JOIN post_categories pc ON pc.category_id = c.id \
             WHERE pc.post_id = $1 \
             ORDER BY c.name ASC"
        ))
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn categories_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<(i64, CategoryRecord)>, RepoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PostCategoryRow>(&format!(
            "SELECT pc.post_id, {CATEGORY_COLUMNS} \
             FROM post_categories pc \
             INNER JOIN categories c ON c.id = pc.category_id \
             WHERE pc.post_id = ANY($1) \
             ORDER BY pc.post_id, c.name ASC"
        ))
        .bind(post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostCategoryRow::into_pair).collect())
    }

    async fn list_posts_in_category(
        &self,
        category_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(
            " FROM posts p INNER JOIN post_categories pc ON pc.post_id = p.id WHERE pc.category_id = ",
        );
        qb.push_bind(category_id);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC");
        if let Some(limit) = limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        qb.build_query_as::<PostRecord>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
