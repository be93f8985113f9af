use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use sqlx::Acquire;

use crate::AppState;
use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::products::{ListProductsQuery, ProductForm, ProductResponse};
use crate::db::handlers::{Categories, Products, Repository, products::ProductFilter};
use crate::db::models::products::{ProductCreateDBRequest, ProductUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::images;
use crate::types::{CategoryId, ProductId};

/// Resolve category names to ids, preserving request order. Any name that
/// does not match an existing category fails the whole operation.
async fn resolve_categories(repo: &mut Categories<'_>, names: &[String]) -> Result<Vec<CategoryId>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let found = repo.get_by_names(names).await?;
    let by_name: HashMap<&str, CategoryId> = found.iter().map(|c| (c.name.as_str(), c.id)).collect();

    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        match by_name.get(name.as_str()) {
            Some(id) => ids.push(*id),
            None => return Err(Error::CategoryNotFound { name: name.clone() }),
        }
    }
    Ok(ids)
}

/// Remove a stored payload unless some product still references it.
///
/// Storage keys are derived from the original file name, so two products
/// uploaded with the same file name share one payload. Removal is best
/// effort - the owning row is already gone either way.
async fn remove_unreferenced_payload(state: &AppState, storage_key: &str) {
    let still_referenced = match state.db.acquire().await {
        Ok(mut conn) => Products::new(&mut conn)
            .find_by_image_name(storage_key)
            .await
            .ok()
            .flatten()
            .is_some(),
        // Can't verify; leave the payload in place rather than risk breaking
        // another product's image.
        Err(_) => true,
    };

    if !still_referenced
        && let Err(e) = state.images.delete(storage_key).await
    {
        tracing::warn!("Failed to remove image payload {storage_key}: {e}");
    }
}

#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    summary = "Create product",
    request_body(
        content_type = "multipart/form-data",
        description = "Product fields plus an optional image file part"
    ),
    responses(
        (status = 201, description = "Product created successfully", body = ProductResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "A category name did not resolve"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_product(State(state): State<AppState>, multipart: Multipart) -> Result<(StatusCode, Json<ProductResponse>)> {
    let form = ProductForm::from_multipart(multipart).await?;

    let title = form.title.filter(|t| !t.trim().is_empty()).ok_or_else(|| Error::BadRequest {
        message: "title is required".to_string(),
    })?;
    let price = form.price.ok_or_else(|| Error::BadRequest {
        message: "price is required".to_string(),
    })?;
    let qty = form.qty.ok_or_else(|| Error::BadRequest {
        message: "qty is required".to_string(),
    })?;

    // Hashing and compression are pure; do them before touching the database.
    let prepared = match form.file {
        Some(upload) => Some(images::prepare(upload, state.config.images.compress, state.images.as_ref())?),
        None => None,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let category_ids;
    {
        let mut repo = Categories::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        category_ids = resolve_categories(&mut repo, &form.categories).await?;
    }

    let product;
    {
        let mut repo = Products::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        let request = ProductCreateDBRequest {
            title,
            description: form.description,
            details: form.details,
            price,
            rating: form.rating,
            qty,
            units: form.units,
            category_ids,
            image: prepared.as_ref().map(|(image, _)| image.clone()),
        };
        product = repo.create(&request).await?;
    }

    // Payload bytes go to the backend before the row commits, so a storage
    // failure rolls the whole create back.
    if let Some((image, payload)) = &prepared {
        state.images.store(&image.storage_key, payload).await?;
    }

    if let Err(e) = tx.commit().await {
        // The row never landed; don't leave the just-written payload behind.
        if let Some((image, _)) = &prepared {
            let _ = state.images.delete(&image.storage_key).await;
        }
        return Err(Error::Database(e.into()));
    }

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    summary = "List products",
    responses(
        (status = 200, description = "Page of products", body = PaginatedResponse<ProductResponse>),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("skip" = Option<i64>, Query, description = "Number of products to skip"),
        ("limit" = Option<i64>, Query, description = "Maximum number of products to return"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<PaginatedResponse<ProductResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Products::new(&mut conn);

    let products = repo.list(&ProductFilter::new(skip, limit)).await?;
    let total_count = repo.count().await?;

    let data = products.into_iter().map(ProductResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/products/{product_id}",
    tag = "products",
    summary = "Get product",
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("product_id" = uuid::Uuid, Path, description = "Product ID")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_product(State(state): State<AppState>, Path(product_id): Path<ProductId>) -> Result<Json<ProductResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Products::new(&mut conn);

    match repo.get_by_id(product_id).await? {
        Some(product) => Ok(Json(ProductResponse::from(product))),
        None => Err(Error::NotFound {
            resource: "Product".to_string(),
            id: product_id.to_string(),
        }),
    }
}

#[utoipa::path(
    patch,
    path = "/products/{product_id}",
    tag = "products",
    summary = "Update product",
    description = "Partial update: supplied fields overwrite, omitted fields keep their values. \
                   A supplied file replaces the stored image wholesale.",
    request_body(
        content_type = "multipart/form-data",
        description = "Any subset of product fields plus an optional image file part"
    ),
    responses(
        (status = 200, description = "Product updated successfully", body = ProductResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Product or category not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("product_id" = uuid::Uuid, Path, description = "Product ID")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Json<ProductResponse>> {
    let form = ProductForm::from_multipart(multipart).await?;

    let prepared = match form.file {
        Some(upload) => Some(images::prepare(upload, state.config.images.compress, state.images.as_ref())?),
        None => None,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let old_image_key;
    {
        let mut repo = Products::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        let existing = repo.get_by_id(product_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Product".to_string(),
            id: product_id.to_string(),
        })?;
        old_image_key = existing.image_name;
    }

    // An empty or omitted category list leaves the association set untouched.
    let category_ids = if form.categories.is_empty() {
        None
    } else {
        let mut repo = Categories::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        Some(resolve_categories(&mut repo, &form.categories).await?)
    };

    let product;
    {
        let mut repo = Products::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        let request = ProductUpdateDBRequest {
            title: form.title,
            description: form.description,
            details: form.details,
            price: form.price,
            rating: form.rating,
            qty: form.qty,
            units: if form.units.is_empty() { None } else { Some(form.units) },
            category_ids,
            image: prepared.as_ref().map(|(image, _)| image.clone()),
        };
        product = repo.update(product_id, &request).await?;
    }

    if let Some((image, payload)) = &prepared {
        state.images.store(&image.storage_key, payload).await?;
    }

    if let Err(e) = tx.commit().await {
        // Compensate only when the new key didn't overwrite the payload the
        // still-current row points at.
        if let Some((image, _)) = &prepared
            && old_image_key.as_deref() != Some(image.storage_key.as_str())
        {
            let _ = state.images.delete(&image.storage_key).await;
        }
        return Err(Error::Database(e.into()));
    }

    // The image was replaced: clear the superseded payload.
    if let Some((image, _)) = &prepared
        && let Some(old_key) = old_image_key
        && old_key != image.storage_key
    {
        remove_unreferenced_payload(&state, &old_key).await;
    }

    Ok(Json(ProductResponse::from(product)))
}

#[utoipa::path(
    delete,
    path = "/products/{product_id}",
    tag = "products",
    summary = "Delete product",
    responses(
        (status = 204, description = "Product deleted successfully"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("product_id" = uuid::Uuid, Path, description = "Product ID")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_product(State(state): State<AppState>, Path(product_id): Path<ProductId>) -> Result<StatusCode> {
    let image_key;
    {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut repo = Products::new(&mut conn);

        let existing = repo.get_by_id(product_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Product".to_string(),
            id: product_id.to_string(),
        })?;
        image_key = existing.image_name;

        if !repo.delete(product_id).await? {
            return Err(Error::NotFound {
                resource: "Product".to_string(),
                id: product_id.to_string(),
            });
        }
    }

    if let Some(key) = image_key {
        remove_unreferenced_payload(&state, &key).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/products/by-title/{title}",
    tag = "products",
    summary = "Find product by title",
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
        (status = 404, description = "No product with that title"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("title" = String, Path, description = "Exact product title")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn find_product_by_title(State(state): State<AppState>, Path(title): Path<String>) -> Result<Json<ProductResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Products::new(&mut conn);

    match repo.find_by_title(&title).await? {
        Some(product) => Ok(Json(ProductResponse::from(product))),
        None => Err(Error::NotFound {
            resource: "Product".to_string(),
            id: title,
        }),
    }
}

#[utoipa::path(
    get,
    path = "/products/by-price/{price}",
    tag = "products",
    summary = "Find products by price",
    responses(
        (status = 200, description = "Products at exactly that price", body = Vec<ProductResponse>),
        (status = 404, description = "No products at that price"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("price" = String, Path, description = "Exact price, e.g. 25000 or 12.50")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn find_products_by_price(State(state): State<AppState>, Path(price): Path<Decimal>) -> Result<Json<Vec<ProductResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Products::new(&mut conn);

    let products = repo.find_by_price(price).await?;
    if products.is_empty() {
        return Err(Error::NotFound {
            resource: "Product".to_string(),
            id: price.to_string(),
        });
    }

    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}
