//! Codedrop Storage Library
//!
//! This crate provides the [`ExpiringStore`] abstraction and its implementations:
//! an in-process [`MemoryStore`] and an on-disk [`LocalStore`].
//!
//! # Write path
//!
//! Uploads are written in two steps. [`ExpiringStore::stage`] drains the request body
//! into store-owned scratch space while enforcing the size limit chunk by chunk.
//! [`ExpiringStore::put`] then publishes the staged bytes under a code in one atomic
//! step. A conflicting code hands the staged payload back inside
//! [`StorageError::CodeConflict`] so the caller can retry without re-reading the body.
//!
//! # Read path
//!
//! Readers get a stream that holds its own reference to the payload. Deleting or
//! evicting the entry hides it from new lookups immediately, while streams already
//! open keep draining until they are dropped.

#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;

pub mod factory;
pub(crate) mod index;
pub mod staging;
pub mod traits;

// Re-export commonly used types
pub use codedrop_core::StorageBackend;
pub use factory::create_store;
#[cfg(feature = "storage-local")]
pub use local::LocalStore;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStore;
pub use staging::StagedPayload;
pub use traits::{ByteStream, CodeStream, ExpiringStore, StorageError, StorageResult, UploadStream};
