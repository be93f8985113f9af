//! Database models for categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CategoryId;

/// A category row as returned by the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDBResponse {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
