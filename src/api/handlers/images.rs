use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::db::handlers::Products;
use crate::errors::{Error, Result};
use crate::images::codec;

#[utoipa::path(
    get,
    path = "/images/{storage_key}",
    tag = "images",
    summary = "Fetch a stored product image",
    description = "Streams the image bytes for a storage key, decompressing when the \
                   owning product recorded the payload as compressed.",
    responses(
        (status = 200, description = "Image bytes with the stored content type"),
        (status = 404, description = "No product owns an image with that key"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("storage_key" = String, Path, description = "Image storage key (hashed name plus extension)")
    )
)]
#[tracing::instrument(skip_all, fields(storage_key = %storage_key))]
pub async fn get_image(State(state): State<AppState>, Path(storage_key): Path<String>) -> Result<Response> {
    // The owning product row is the metadata record: it knows the content
    // type and whether the payload was stored compressed.
    let owner;
    {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut repo = Products::new(&mut conn);
        owner = repo.find_by_image_name(&storage_key).await?.ok_or_else(|| Error::NotFound {
            resource: "Image".to_string(),
            id: storage_key.clone(),
        })?;
    }

    let payload = state.images.retrieve(&storage_key).await?;

    let bytes = if owner.image_compressed.unwrap_or(false) {
        codec::decompress(&payload)?
    } else {
        payload
    };

    let content_type = owner.image_type.unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
