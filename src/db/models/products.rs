//! Database models for products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::images::StoredImage;
use crate::types::{CategoryId, ProductId};

/// Request to insert a new product row.
///
/// Category ids are already resolved from names (order-preserving) and the
/// image, when present, has already been prepared by the image pipeline.
#[derive(Debug, Clone)]
pub struct ProductCreateDBRequest {
    pub title: String,
    pub description: Option<String>,
    pub details: Option<String>,
    pub price: Decimal,
    pub rating: Option<Decimal>,
    pub qty: i32,
    pub units: Vec<String>,
    pub category_ids: Vec<CategoryId>,
    pub image: Option<StoredImage>,
}

/// Partial update for a product row. `None` fields keep their current value.
///
/// `category_ids: None` leaves the association set untouched; `Some` replaces
/// it wholesale. A supplied image replaces all four embedded image columns.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub price: Option<Decimal>,
    pub rating: Option<Decimal>,
    pub qty: Option<i32>,
    pub units: Option<Vec<String>>,
    pub category_ids: Option<Vec<CategoryId>>,
    pub image: Option<StoredImage>,
}

/// A product row plus its flattened, order-preserving category names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDBResponse {
    pub id: ProductId,
    pub title: String,
    pub description: Option<String>,
    pub details: Option<String>,
    pub price: Decimal,
    pub rating: Option<Decimal>,
    pub qty: i32,
    pub units: Vec<String>,
    pub categories: Vec<String>,
    pub image_name: Option<String>,
    pub image_type: Option<String>,
    pub image_compressed: Option<bool>,
    pub image_locator: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
