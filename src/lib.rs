//! # platter: a restaurant catalog service
//!
//! `platter` is a REST backend for a restaurant's product catalog: products
//! with prices, stock, and category tags, plus an uploaded image per
//! product. It exposes CRUD and lookup endpoints over PostgreSQL and serves
//! the stored images back out.
//!
//! ## Overview
//!
//! Most of the service is deliberately ordinary CRUD plumbing. The one
//! subsystem with real design decisions is the image pipeline ([`images`]):
//!
//! 1. The original file name is hashed into a deterministic, extension-
//!    preserving **storage key** ([`images::naming`]). Identical names map
//!    to identical keys, so re-uploading the same file name overwrites.
//! 2. The payload is optionally deflate-compressed ([`images::codec`]);
//!    whether that happened is recorded per image on the owning product
//!    row, so retrieval never guesses.
//! 3. Bytes are persisted behind a backend chosen at startup
//!    ([`images::storage`]): a filesystem directory or a database table.
//!    The backend also resolves the **locator** clients use to fetch the
//!    image later - a public URL for filesystem deployments, the bare key
//!    for database ones.
//!
//! Product create/update writes the payload through the backend before the
//! product transaction commits; a storage failure rolls the row back, and a
//! commit failure triggers compensating deletion of the just-written bytes,
//! so no half-created product survives.
//!
//! ## Request Flow
//!
//! Requests arrive at the Axum router built by [`build_router`]. Mutating
//! product handlers open a transaction, resolve category names to existing
//! rows (failing the whole request when a name is unknown - categories are
//! never auto-created), write through the repositories in [`db::handlers`],
//! and convert the result to wire DTOs in [`api::models`]. Image retrieval
//! (`GET /api/v1/images/{key}`) looks up the owning product row for the
//! content type and compression flag, then streams the (decompressed)
//! bytes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use platter::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = platter::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     platter::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires PostgreSQL and runs its migrations on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! platter::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod images;
mod openapi;
pub mod telemetry;
mod types;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Router, http};
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
pub use types::{CategoryId, ProductId};

use crate::config::CorsOrigin;
use crate::db::handlers::Categories;
use crate::images::storage::{ImageStorage, create_image_storage};
use crate::openapi::ApiDoc;

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from file/environment
/// - `images`: The image storage backend selected at startup
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub images: Arc<dyn ImageStorage>,
}

/// Get the platter database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Seed the category catalog from configuration.
///
/// Idempotent - existing names are left untouched, so manual additions to
/// the table survive restarts. This is the only way categories come into
/// existence; there is no category CRUD surface.
#[instrument(skip_all)]
pub async fn seed_categories(names: &[String], db: &PgPool) -> anyhow::Result<()> {
    if names.is_empty() {
        return Ok(());
    }

    let mut conn = db.acquire().await?;
    let mut repo = Categories::new(&mut conn);
    for name in names {
        repo.ensure(name).await?;
    }

    info!("Seeded {} categories", names.len());
    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// Routes are nested under `/api/v1`; the rendered OpenAPI documentation is
/// served at `/docs` and a liveness probe at `/healthz`.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let upload_limit = state.config.images.max_upload_bytes as usize;

    let api_routes = Router::new()
        .route(
            "/products",
            axum::routing::post(api::handlers::products::create_product).get(api::handlers::products::list_products),
        )
        .route(
            "/products/{product_id}",
            get(api::handlers::products::get_product)
                .patch(api::handlers::products::update_product)
                .delete(api::handlers::products::delete_product),
        )
        .route("/products/by-title/{title}", get(api::handlers::products::find_product_by_title))
        .route("/products/by-price/{price}", get(api::handlers::products::find_products_by_price))
        .route("/images/{storage_key}", get(api::handlers::images::get_image))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(cors_layer);

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects the pool, runs migrations,
///    seeds categories, and builds the storage backend and router
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting platter with configuration: {:#?}", config);

        let pool_settings = &config.database.pool;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(pool_settings.max_connections)
            .min_connections(pool_settings.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(pool_settings.acquire_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(pool_settings.idle_timeout_secs))
            .connect(&config.database.url)
            .await?;

        migrator().run(&pool).await?;
        seed_categories(&config.seed_categories, &pool).await?;

        let images = create_image_storage(&config.images.storage, &config.images.public_base_url, &pool).await?;

        let state = AppState::builder().db(pool.clone()).config(config.clone()).images(images).build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("platter listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use axum_test::multipart::{MultipartForm, Part};
    use sqlx::PgPool;

    /// Test server over a filesystem backend rooted in a tempdir. The
    /// tempdir guard must stay alive for the duration of the test.
    async fn create_test_app(pool: PgPool) -> (TestServer, tempfile::TempDir) {
        let upload_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.images.storage = config::ImageStorageBackend::Filesystem {
            path: upload_dir.path().to_path_buf(),
        };

        let images = create_image_storage(&config.images.storage, &config.images.public_base_url, &pool)
            .await
            .expect("create image storage");

        let state = AppState::builder().db(pool).config(config).images(images).build();
        let router = build_router(state).expect("build router");
        let server = TestServer::new(router).expect("Failed to create test server");

        (server, upload_dir)
    }

    async fn seed_test_categories(pool: &PgPool, names: &[&str]) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Categories::new(&mut conn);
        for name in names {
            repo.ensure(name).await.expect("seed category");
        }
    }

    fn product_form(title: &str, price: &str) -> MultipartForm {
        MultipartForm::new()
            .add_text("title", title)
            .add_text("price", price)
            .add_text("qty", "5")
            .add_text("description", "A test dish")
            .add_text("units", "PLATE")
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_product_and_image_round_trip(pool: PgPool) {
        seed_test_categories(&pool, &["Beverage", "Snack"]).await;
        let (server, upload_dir) = create_test_app(pool.clone()).await;

        let image_bytes = b"not really a jpeg, but bytes are bytes".repeat(16);
        let form = product_form("Es Campur", "15000")
            .add_text("categories", "Beverage")
            .add_text("categories", "Snack")
            .add_part(
                "file",
                Part::bytes(image_bytes.clone()).file_name("es-campur.jpg").mime_type("image/jpeg"),
            );

        let response = server.post("/api/v1/products").multipart(form).await;
        response.assert_status(StatusCode::CREATED);

        let body: serde_json::Value = response.json();
        assert_eq!(body["title"], "Es Campur");
        assert_eq!(body["categories"], serde_json::json!(["Beverage", "Snack"]));

        let key = body["image_name"].as_str().expect("image_name set").to_string();
        assert!(key.ends_with(".jpg"));
        assert_eq!(
            body["image_locator"].as_str().unwrap(),
            format!("http://localhost:2000/api/v1/images/{key}")
        );

        // The payload on disk is the compressed form, not the raw upload.
        let on_disk = std::fs::read(upload_dir.path().join(&key)).expect("payload written");
        assert_ne!(on_disk, image_bytes);

        // Retrieval decompresses back to the original bytes.
        let image_response = server.get(&format!("/api/v1/images/{key}")).await;
        image_response.assert_status_ok();
        assert_eq!(image_response.header("content-type"), "image/jpeg");
        assert_eq!(image_response.as_bytes().to_vec(), image_bytes);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_with_unknown_category_persists_nothing(pool: PgPool) {
        seed_test_categories(&pool, &["Beverage"]).await;
        let (server, upload_dir) = create_test_app(pool.clone()).await;

        let form = product_form("Ghost Dish", "9000")
            .add_text("categories", "Beverage")
            .add_text("categories", "Dessert")
            .add_part("file", Part::bytes(vec![1u8, 2, 3]).file_name("ghost.png").mime_type("image/png"));

        let response = server.post("/api/v1/products").multipart(form).await;
        response.assert_status(StatusCode::NOT_FOUND);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 0);

        // No orphan payload either - the upload directory stays empty.
        assert_eq!(std::fs::read_dir(upload_dir.path()).unwrap().count(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_requires_title(pool: PgPool) {
        let (server, _upload_dir) = create_test_app(pool).await;

        let form = MultipartForm::new().add_text("price", "1000").add_text("qty", "1");
        let response = server.post("/api/v1/products").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_patch_only_price_keeps_other_fields(pool: PgPool) {
        let (server, _upload_dir) = create_test_app(pool).await;

        let response = server.post("/api/v1/products").multipart(product_form("Nasi Goreng", "25000")).await;
        response.assert_status(StatusCode::CREATED);
        let created: serde_json::Value = response.json();
        let id = created["id"].as_str().unwrap();

        let patch = MultipartForm::new().add_text("price", "27500");
        let response = server.patch(&format!("/api/v1/products/{id}")).multipart(patch).await;
        response.assert_status_ok();

        let updated: serde_json::Value = response.json();
        assert_eq!(updated["price"], "27500");
        assert_eq!(updated["title"], "Nasi Goreng");
        assert_eq!(updated["qty"], 5);
        assert_eq!(updated["description"], "A test dish");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_patch_missing_product_is_not_found(pool: PgPool) {
        let (server, _upload_dir) = create_test_app(pool).await;

        let patch = MultipartForm::new().add_text("price", "27500");
        let response = server
            .patch(&format!("/api/v1/products/{}", uuid::Uuid::new_v4()))
            .multipart(patch)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replacing_image_removes_superseded_payload(pool: PgPool) {
        let (server, upload_dir) = create_test_app(pool).await;

        let form = product_form("Sate Ayam", "20000").add_part(
            "file",
            Part::bytes(b"first payload".to_vec()).file_name("first.jpg").mime_type("image/jpeg"),
        );
        let response = server.post("/api/v1/products").multipart(form).await;
        response.assert_status(StatusCode::CREATED);
        let created: serde_json::Value = response.json();
        let id = created["id"].as_str().unwrap();
        let first_key = created["image_name"].as_str().unwrap().to_string();

        let patch = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"second payload".to_vec()).file_name("second.jpg").mime_type("image/jpeg"),
        );
        let response = server.patch(&format!("/api/v1/products/{id}")).multipart(patch).await;
        response.assert_status_ok();
        let updated: serde_json::Value = response.json();
        let second_key = updated["image_name"].as_str().unwrap().to_string();
        assert_ne!(first_key, second_key);

        // Old payload cleared, new one present.
        assert!(!upload_dir.path().join(&first_key).exists());
        assert!(upload_dir.path().join(&second_key).exists());

        // The old key no longer resolves.
        let response = server.get(&format!("/api/v1/images/{first_key}")).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_product_lifecycle(pool: PgPool) {
        let (server, upload_dir) = create_test_app(pool).await;

        let form = product_form("Bakso", "15000").add_part(
            "file",
            Part::bytes(b"bakso image".to_vec()).file_name("bakso.jpg").mime_type("image/jpeg"),
        );
        let response = server.post("/api/v1/products").multipart(form).await;
        response.assert_status(StatusCode::CREATED);
        let created: serde_json::Value = response.json();
        let id = created["id"].as_str().unwrap().to_string();
        let key = created["image_name"].as_str().unwrap().to_string();

        let response = server.delete(&format!("/api/v1/products/{id}")).await;
        response.assert_status(StatusCode::NO_CONTENT);

        // Row gone, payload gone.
        let response = server.get(&format!("/api/v1/products/{id}")).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert!(!upload_dir.path().join(&key).exists());

        // Deleting again is a 404.
        let response = server.delete(&format!("/api/v1/products/{id}")).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_find_by_title_and_price(pool: PgPool) {
        let (server, _upload_dir) = create_test_app(pool).await;

        server.post("/api/v1/products").multipart(product_form("Mie Ayam", "12000")).await;
        server.post("/api/v1/products").multipart(product_form("Bakso Urat", "12000")).await;

        let response = server.get("/api/v1/products/by-title/Mie%20Ayam").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["title"], "Mie Ayam");

        let response = server.get("/api/v1/products/by-title/Rendang").await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server.get("/api/v1/products/by-price/12000").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body.as_array().unwrap().len(), 2);

        let response = server.get("/api/v1/products/by-price/99").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_products_pagination(pool: PgPool) {
        let (server, _upload_dir) = create_test_app(pool).await;

        for i in 0..3 {
            server
                .post("/api/v1/products")
                .multipart(product_form(&format!("Dish {i}"), "1000"))
                .await;
        }

        let response = server.get("/api/v1/products?skip=0&limit=2").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["total_count"], 3);
        assert_eq!(body["limit"], 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_image_round_trip_through_database_backend(pool: PgPool) {
        let mut config = Config::default();
        config.images.storage = config::ImageStorageBackend::Database;

        let images = create_image_storage(&config.images.storage, &config.images.public_base_url, &pool)
            .await
            .expect("create image storage");
        let state = AppState::builder().db(pool.clone()).config(config).images(images).build();
        let server = TestServer::new(build_router(state).unwrap()).unwrap();

        let image_bytes = b"payload destined for a byte column".repeat(8);
        let form = product_form("Gado Gado", "18000").add_part(
            "file",
            Part::bytes(image_bytes.clone()).file_name("gado.png").mime_type("image/png"),
        );

        let response = server.post("/api/v1/products").multipart(form).await;
        response.assert_status(StatusCode::CREATED);
        let created: serde_json::Value = response.json();
        let key = created["image_name"].as_str().unwrap().to_string();

        // Database deployments hand out the bare key as the locator.
        assert_eq!(created["image_locator"].as_str().unwrap(), key);

        let image_response = server.get(&format!("/api/v1/images/{key}")).await;
        image_response.assert_status_ok();
        assert_eq!(image_response.as_bytes().to_vec(), image_bytes);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_missing_image_is_not_found(pool: PgPool) {
        let (server, _upload_dir) = create_test_app(pool).await;

        let response = server.get("/api/v1/images/deadbeef.jpg").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
