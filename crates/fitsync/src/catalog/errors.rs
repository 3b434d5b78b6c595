use thiserror::Error;

/// Errors raised by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The catalog contains state that violates its own invariants, e.g. a
    /// status row without its parent record. Aborts the whole run.
    #[error("Catalog corruption: {0}")]
    Corruption(String),

    /// Caller passed data the catalog cannot store.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl CatalogError {
    #[inline]
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption(message.into())
    }

    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
