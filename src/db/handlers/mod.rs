//! Repository implementations for CRUD operations.

pub mod categories;
pub mod products;
pub mod repository;

pub use categories::Categories;
pub use products::Products;
pub use repository::Repository;
