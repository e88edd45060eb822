//! Error types for Warden persistence

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        tracing::error!("In-memory store lock poisoned; a writer panicked mid-update");
        StoreError::Unavailable("in-memory store lock poisoned".to_string())
    }
}
