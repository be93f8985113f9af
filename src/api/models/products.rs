//! API request/response models for products.
//!
//! Create and update arrive as `multipart/form-data` (scalar fields plus an
//! optional `file` part), so the "request body" here is [`ProductForm`],
//! parsed field-by-field from the multipart stream.

use axum::extract::Multipart;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::pagination::Pagination;
use crate::db::models::products::ProductDBResponse;
use crate::errors::Error;
use crate::images::ImageUpload;
use crate::types::ProductId;

/// Query parameters for listing products
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListProductsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// Full product details returned by the API.
///
/// Image payload bytes are never embedded; clients follow `image_locator`
/// (or `GET /api/v1/images/{image_name}`) to fetch them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    /// Unique identifier for the product
    #[schema(value_type = String, format = "uuid")]
    pub id: ProductId,
    /// Display name of the product
    pub title: String,
    /// Short description shown in listings
    pub description: Option<String>,
    /// Longer free-form details
    pub details: Option<String>,
    /// Price in the store's currency
    pub price: Decimal,
    /// Average rating, when known
    pub rating: Option<Decimal>,
    /// Stock quantity
    pub qty: i32,
    /// Sales units (e.g., "PLATE", "CUP")
    pub units: Vec<String>,
    /// Category names, in the order they were assigned
    pub categories: Vec<String>,
    /// Storage key of the product image, when one is set
    pub image_name: Option<String>,
    /// MIME type of the product image
    pub image_type: Option<String>,
    /// Resolvable reference for fetching the image bytes
    pub image_locator: Option<String>,
    /// When the product was created
    pub created_at: DateTime<Utc>,
    /// When the product was last modified
    pub updated_at: DateTime<Utc>,
}

impl From<ProductDBResponse> for ProductResponse {
    fn from(db: ProductDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            description: db.description,
            details: db.details,
            price: db.price,
            rating: db.rating,
            qty: db.qty,
            units: db.units,
            categories: db.categories,
            image_name: db.image_name,
            image_type: db.image_type,
            image_locator: db.image_locator,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Product fields parsed from a multipart form.
///
/// Everything is optional at this level; create handlers enforce their
/// required fields afterwards, update handlers treat absence as "keep".
#[derive(Debug, Default)]
pub struct ProductForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub price: Option<Decimal>,
    pub rating: Option<Decimal>,
    pub qty: Option<i32>,
    pub units: Vec<String>,
    pub categories: Vec<String>,
    pub file: Option<ImageUpload>,
}

impl ProductForm {
    /// Drain a multipart stream into a typed form.
    ///
    /// `units` and `categories` may repeat; order is preserved. A `file`
    /// part without a file name or with an empty payload counts as absent
    /// (an HTML form submits one either way).
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, Error> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {e}"),
        })? {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                "title" => form.title = Some(text(field, "title").await?),
                "description" => form.description = Some(text(field, "description").await?),
                "details" => form.details = Some(text(field, "details").await?),
                "price" => form.price = Some(parse(&text(field, "price").await?, "price")?),
                "rating" => form.rating = Some(parse(&text(field, "rating").await?, "rating")?),
                "qty" => form.qty = Some(parse(&text(field, "qty").await?, "qty")?),
                "units" => form.units.push(text(field, "units").await?),
                "categories" => form.categories.push(text(field, "categories").await?),
                "file" => {
                    let Some(original_name) = field.file_name().map(str::to_string) else {
                        continue;
                    };
                    let content_type = field
                        .content_type()
                        .map(str::to_string)
                        .unwrap_or_else(|| mime_guess::from_path(&original_name).first_or_octet_stream().to_string());
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| Error::BadRequest {
                            message: format!("Failed to read file upload: {e}"),
                        })?
                        .to_vec();

                    if !bytes.is_empty() {
                        form.file = Some(ImageUpload {
                            original_name,
                            content_type,
                            bytes,
                        });
                    }
                }
                // Unknown fields are ignored, like unknown JSON keys would be
                _ => {}
            }
        }

        Ok(form)
    }
}

async fn text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, Error> {
    field.text().await.map_err(|e| Error::BadRequest {
        message: format!("Invalid value for field {name}: {e}"),
    })
}

fn parse<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, Error> {
    value.trim().parse().map_err(|_| Error::BadRequest {
        message: format!("Invalid value for field {name}: {value:?}"),
    })
}
