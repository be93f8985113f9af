use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

use crate::db::errors::DbError;
use crate::images::ImageError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// A category name in a product request did not resolve to an existing
    /// category. Fails the whole operation; categories are never auto-created.
    #[error("Category with name {name} not found")]
    CategoryNotFound { name: String },

    /// Image pipeline error (naming, codec, or storage backend)
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::CategoryNotFound { .. } => StatusCode::NOT_FOUND,
            Error::Image(image_err) => match image_err {
                ImageError::EmptyName => StatusCode::BAD_REQUEST,
                ImageError::NotFound(_) => StatusCode::NOT_FOUND,
                ImageError::Corrupt(_) | ImageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ImageError::Database(db_err) => db_error_status(db_err),
            },
            Error::Database(db_err) => db_error_status(db_err),
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::CategoryNotFound { name } => {
                format!("Category with name {name} not found")
            }
            Error::Image(image_err) => match image_err {
                ImageError::EmptyName => "Uploaded file must have a name".to_string(),
                ImageError::NotFound(key) => format!("Image {key} not found"),
                ImageError::Corrupt(_) => "Stored image could not be read".to_string(),
                ImageError::Io(_) => "Image storage error".to_string(),
                ImageError::Database(db_err) => db_error_user_message(db_err),
            },
            Error::Database(db_err) => db_error_user_message(db_err),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

fn db_error_status(db_err: &DbError) -> StatusCode {
    match db_err {
        DbError::NotFound => StatusCode::NOT_FOUND,
        DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
        DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
        DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
        DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn db_error_user_message(db_err: &DbError) -> String {
    match db_err {
        DbError::NotFound => "Resource not found".to_string(),
        DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
            (Some("categories"), Some(c)) if c.contains("name") => "A category with this name already exists".to_string(),
            _ => "Resource already exists".to_string(),
        },
        DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
        DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
        DbError::Other(_) => "Database error occurred".to_string(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Image(ImageError::Corrupt(_)) | Error::Image(ImageError::Io(_)) | Error::Image(ImageError::Database(_)) => {
                tracing::error!("Image storage error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::BadRequest { .. }
            | Error::NotFound { .. }
            | Error::CategoryNotFound { .. }
            | Error::Image(ImageError::EmptyName)
            | Error::Image(ImageError::NotFound(_)) => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = Error::BadRequest {
            message: "title is required".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = Error::NotFound {
            resource: "Product".to_string(),
            id: "abc".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = Error::CategoryNotFound {
            name: "Dessert".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = Error::Image(ImageError::NotFound("abc.jpg".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = Error::Image(ImageError::Corrupt("bad stream".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = Error::Database(DbError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_user_messages_do_not_leak_internals() {
        let err = Error::Image(ImageError::Corrupt("inflate failed at offset 12".to_string()));
        assert_eq!(err.user_message(), "Stored image could not be read");

        let err = Error::Other(anyhow::anyhow!("connection pool exhausted"));
        assert_eq!(err.user_message(), "Internal server error");
    }
}
