//! Database repository for categories.
//!
//! Categories have no HTTP surface of their own; the catalog is defined by
//! startup seeding, and product create/update resolves names against it.

use sqlx::{FromRow, PgConnection};
use tracing::instrument;

use crate::db::{errors::Result, models::categories::CategoryDBResponse};

#[derive(Debug, Clone, FromRow)]
struct Category {
    id: crate::types::CategoryId,
    name: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Category> for CategoryDBResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            created_at: category.created_at,
        }
    }
}

pub struct Categories<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Categories<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a category if it does not already exist, returning the row
    /// either way. Safe to call repeatedly at startup.
    #[instrument(skip(self), err)]
    pub async fn ensure(&mut self, name: &str) -> Result<CategoryDBResponse> {
        sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut *self.db)
            .await?;

        let category: Category = sqlx::query_as("SELECT * FROM categories WHERE name = $1")
            .bind(name)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(CategoryDBResponse::from(category))
    }

    /// Look up categories by exact name. Returns only the names that exist;
    /// callers compare against their request to detect misses.
    #[instrument(skip(self, names), fields(count = names.len()), err)]
    pub async fn get_by_names(&mut self, names: &[String]) -> Result<Vec<CategoryDBResponse>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let categories: Vec<Category> = sqlx::query_as("SELECT * FROM categories WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(categories.into_iter().map(CategoryDBResponse::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_ensure_is_idempotent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Categories::new(&mut conn);

        let first = repo.ensure("Beverage").await.expect("first ensure");
        let second = repo.ensure("Beverage").await.expect("second ensure");

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Beverage");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE name = 'Beverage'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_by_names_returns_only_existing(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Categories::new(&mut conn);

        repo.ensure("Beverage").await.unwrap();
        repo.ensure("Snack").await.unwrap();

        let found = repo
            .get_by_names(&["Beverage".to_string(), "Dessert".to_string()])
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Beverage");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_by_names_empty_input(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Categories::new(&mut conn);

        let found = repo.get_by_names(&[]).await.unwrap();
        assert!(found.is_empty());
    }
}
