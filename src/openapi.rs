//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::api::handlers::{images, products};
use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::products::ProductResponse;

/// OpenAPI document for the catalog API, served at `/docs`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "platter",
        description = "Restaurant catalog API: products, categories, and product images"
    ),
    paths(
        products::create_product,
        products::list_products,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::find_product_by_title,
        products::find_products_by_price,
        images::get_image,
    ),
    components(schemas(ProductResponse, PaginatedResponse<ProductResponse>)),
    tags(
        (name = "products", description = "Product catalog management"),
        (name = "images", description = "Stored product image retrieval")
    )
)]
pub struct ApiDoc;
