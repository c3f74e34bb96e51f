//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Region not open: {0}")]
    RegionNotOpen(String),

    #[error("Invalid region name: {0}")]
    InvalidRegion(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
