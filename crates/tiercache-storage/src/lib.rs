//! Tiercache Storage Layer
//!
//! This crate provides the persistent blob store abstraction used by the
//! cache engine, with an in-memory implementation and a SQLite backend.

pub mod backend;
pub mod error;
pub mod memory;
pub mod sqlite;

pub use backend::BlobStore;
pub use error::StorageError;
pub use memory::MemoryBlobStore;
pub use sqlite::SqliteBlobStore;
