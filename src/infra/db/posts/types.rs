use time::OffsetDateTime;

use crate::domain::entities::CategoryRecord;

/// A category joined to one of its posts.
#[derive(sqlx::FromRow)]
pub(crate) struct PostCategoryRow {
    pub(crate) post_id: i64,
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) slug: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl PostCategoryRow {
    pub(crate) fn into_pair(self) -> (i64, CategoryRecord) {
        (
            self.post_id,
            CategoryRecord {
                id: self.id,
                name: self.name,
                description: self.description,
                slug: self.slug,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        )
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CountRow {
    pub(crate) count: i64,
}
