//! Database record structures exchanged with the repositories.

pub mod categories;
pub mod products;
