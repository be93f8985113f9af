//! Database repository for products and their category associations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::products::{ProductCreateDBRequest, ProductDBResponse, ProductUpdateDBRequest},
};
use crate::types::{ProductId, abbrev_uuid};

/// Filter for listing products
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub skip: i64,
    pub limit: i64,
}

impl ProductFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Product {
    id: ProductId,
    title: String,
    description: Option<String>,
    details: Option<String>,
    price: Decimal,
    rating: Option<Decimal>,
    qty: i32,
    units: Vec<String>,
    image_name: Option<String>,
    image_type: Option<String>,
    image_compressed: Option<bool>,
    image_locator: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    fn into_response(self, categories: Vec<String>) -> ProductDBResponse {
        ProductDBResponse {
            id: self.id,
            title: self.title,
            description: self.description,
            details: self.details,
            price: self.price,
            rating: self.rating,
            qty: self.qty,
            units: self.units,
            categories,
            image_name: self.image_name,
            image_type: self.image_type,
            image_compressed: self.image_compressed,
            image_locator: self.image_locator,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub struct Products<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Products<'c> {
    type CreateRequest = ProductCreateDBRequest;
    type UpdateRequest = ProductUpdateDBRequest;
    type Response = ProductDBResponse;
    type Id = ProductId;
    type Filter = ProductFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let product: Product = sqlx::query_as(
            r#"
            INSERT INTO products (title, description, details, price, rating, qty, units,
                                  image_name, image_type, image_compressed, image_locator)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.details)
        .bind(request.price)
        .bind(request.rating)
        .bind(request.qty)
        .bind(&request.units)
        .bind(request.image.as_ref().map(|i| i.storage_key.as_str()))
        .bind(request.image.as_ref().map(|i| i.content_type.as_str()))
        .bind(request.image.as_ref().map(|i| i.compressed))
        .bind(request.image.as_ref().map(|i| i.locator.as_str()))
        .fetch_one(&mut *self.db)
        .await?;

        self.replace_category_links(product.id, &request.category_ids).await?;
        let categories = self.category_names(product.id).await?;

        Ok(product.into_response(categories))
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match product {
            Some(product) => {
                let categories = self.category_names(product.id).await?;
                Ok(Some(product.into_response(categories)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let products: Vec<Product> = sqlx::query_as("SELECT * FROM products ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        self.assemble_many(products).await
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Atomic update with conditional field updates
        let product: Product = sqlx::query_as(
            r#"
            UPDATE products SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                details = COALESCE($4, details),
                price = COALESCE($5, price),
                rating = COALESCE($6, rating),
                qty = COALESCE($7, qty),
                units = COALESCE($8, units),
                image_name = COALESCE($9, image_name),
                image_type = COALESCE($10, image_type),
                image_compressed = COALESCE($11, image_compressed),
                image_locator = COALESCE($12, image_locator),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.details)
        .bind(request.price)
        .bind(request.rating)
        .bind(request.qty)
        .bind(&request.units)
        .bind(request.image.as_ref().map(|i| i.storage_key.as_str()))
        .bind(request.image.as_ref().map(|i| i.content_type.as_str()))
        .bind(request.image.as_ref().map(|i| i.compressed))
        .bind(request.image.as_ref().map(|i| i.locator.as_str()))
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(category_ids) = &request.category_ids {
            self.replace_category_links(id, category_ids).await?;
        }

        let categories = self.category_names(id).await?;
        Ok(product.into_response(categories))
    }
}

impl<'c> Products<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Exact-title lookup.
    #[instrument(skip(self), err)]
    pub async fn find_by_title(&mut self, title: &str) -> Result<Option<ProductDBResponse>> {
        let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE title = $1 LIMIT 1")
            .bind(title)
            .fetch_optional(&mut *self.db)
            .await?;

        match product {
            Some(product) => {
                let categories = self.category_names(product.id).await?;
                Ok(Some(product.into_response(categories)))
            }
            None => Ok(None),
        }
    }

    /// All products at an exact price.
    #[instrument(skip(self), err)]
    pub async fn find_by_price(&mut self, price: Decimal) -> Result<Vec<ProductDBResponse>> {
        let products: Vec<Product> = sqlx::query_as("SELECT * FROM products WHERE price = $1 ORDER BY title, id")
            .bind(price)
            .fetch_all(&mut *self.db)
            .await?;

        self.assemble_many(products).await
    }

    /// Find the product owning a stored image, by storage key.
    #[instrument(skip(self), err)]
    pub async fn find_by_image_name(&mut self, storage_key: &str) -> Result<Option<ProductDBResponse>> {
        let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE image_name = $1 LIMIT 1")
            .bind(storage_key)
            .fetch_optional(&mut *self.db)
            .await?;

        match product {
            Some(product) => {
                let categories = self.category_names(product.id).await?;
                Ok(Some(product.into_response(categories)))
            }
            None => Ok(None),
        }
    }

    /// Replace the product's category associations wholesale, preserving the
    /// order the ids were supplied in.
    async fn replace_category_links(&mut self, product_id: ProductId, category_ids: &[crate::types::CategoryId]) -> Result<()> {
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *self.db)
            .await?;

        for (position, category_id) in category_ids.iter().enumerate() {
            sqlx::query("INSERT INTO product_categories (product_id, category_id, position) VALUES ($1, $2, $3)")
                .bind(product_id)
                .bind(category_id)
                .bind(position as i32)
                .execute(&mut *self.db)
                .await?;
        }

        Ok(())
    }

    /// Category names for one product, in stored position order.
    async fn category_names(&mut self, product_id: ProductId) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT c.name FROM product_categories pc
            JOIN categories c ON c.id = pc.category_id
            WHERE pc.product_id = $1
            ORDER BY pc.position
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(names)
    }

    /// Assemble responses for many rows with a single bulk category query.
    async fn assemble_many(&mut self, products: Vec<Product>) -> Result<Vec<ProductDBResponse>> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        let rows: Vec<(ProductId, String)> = sqlx::query_as(
            r#"
            SELECT pc.product_id, c.name FROM product_categories pc
            JOIN categories c ON c.id = pc.category_id
            WHERE pc.product_id = ANY($1)
            ORDER BY pc.product_id, pc.position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut names_by_product: HashMap<ProductId, Vec<String>> = HashMap::new();
        for (product_id, name) in rows {
            names_by_product.entry(product_id).or_default().push(name);
        }

        Ok(products
            .into_iter()
            .map(|p| {
                let categories = names_by_product.remove(&p.id).unwrap_or_default();
                p.into_response(categories)
            })
            .collect())
    }
}
