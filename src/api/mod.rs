//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Products** (`/api/v1/products/*`): catalog CRUD, pagination, and
//!   exact title/price lookups
//! - **Images** (`/api/v1/images/*`): byte-stream retrieval of stored
//!   product images
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! the rendered documentation is served at `/docs`.

pub mod handlers;
pub mod models;
