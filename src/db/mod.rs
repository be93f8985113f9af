//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL,
//! following the repository pattern: API handlers talk to repositories
//! ([`handlers`]), repositories map rows to the structs in [`models`], and
//! failures surface through the [`errors::DbError`] taxonomy.
//!
//! Repositories are constructed over a `&mut PgConnection`, so mutations can
//! share a transaction with everything else the enclosing request does:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut repo = Products::new(tx.acquire().await?);
//! let product = repo.create(&request).await?;
//! tx.commit().await?;
//! ```
//!
//! Migrations live under `migrations/` and are applied at startup by
//! [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
