//! Postgres-backed repository implementations.

mod categories;
mod posts;
mod util;

pub use util::{escape_like, map_sqlx_error};

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::listing::{PostFilter, PostPredicate};
use crate::application::repos::{RepoError, StoreHealth};

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.slug, p.published, p.created_at, p.updated_at";
const CATEGORY_COLUMNS: &str = "c.id, c.name, c.description, c.slug, c.created_at, c.updated_at";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Render the filter as a `WHERE` clause; nothing is emitted for an empty filter.
    fn push_post_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PostFilter) {
        if filter.is_empty() {
            return;
        }

        qb.push(" WHERE ");
        for (index, predicate) in filter.predicates().iter().enumerate() {
            if index > 0 {
                qb.push(" AND ");
            }
            match predicate {
                PostPredicate::IdIn(ids) => {
                    qb.push("p.id = ANY(");
                    qb.push_bind(ids.as_slice());
                    qb.push(")");
                }
                PostPredicate::Published(flag) => {
                    qb.push("p.published = ");
                    qb.push_bind(*flag);
                }
                PostPredicate::TitleContains(needle) => {
                    qb.push("p.title ILIKE ");
                    qb.push_bind(format!("%{}%", escape_like(needle)));
                    qb.push(" ESCAPE '\\'");
                }
            }
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl StoreHealth for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
