use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;

use crate::application::repos::{CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams};
use crate::domain::entities::PostRecord;
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

const RETURNING_POST: &str = "RETURNING id, title, content, slug, published, created_at, updated_at";

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            slug,
            title,
            content,
            published,
            category_ids,
        } = params;

        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let post = sqlx::query_as::<_, PostRecord>(&format!(
            "INSERT INTO posts (title, content, slug, published, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) {RETURNING_POST}"
        ))
        .bind(title)
        .bind(content)
        .bind(slug)
        .bind(published)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        link_categories(&mut tx, post.id, &category_ids).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            slug,
            title,
            content,
            published,
            category_ids,
        } = params;

        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let post = sqlx::query_as::<_, PostRecord>(&format!(
            "UPDATE posts \
             SET slug = $2, title = $3, content = $4, published = $5, updated_at = $6 \
             WHERE id = $1 {RETURNING_POST}"
        ))
        .bind(id)
        .bind(slug)
        .bind(title)
        .bind(content)
        .bind(published)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        if let Some(category_ids) = category_ids {
            sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            link_categories(&mut tx, id, &category_ids).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
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

async fn link_categories(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    category_ids: &[i64],
) -> Result<(), RepoError> {
    if category_ids.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO post_categories (post_id, category_id) ");
    qb.push_values(category_ids, |mut row, category_id| {
        row.push_bind(post_id).push_bind(*category_id);
    });
    qb.push(" ON CONFLICT DO NOTHING");

    qb.build()
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}
