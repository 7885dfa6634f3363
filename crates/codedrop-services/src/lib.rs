//! Codedrop Services Layer
//!
//! This crate is the **business service layer**: code generation, the exchange
//! workflow (upload, info, download, delete) and background eviction. It re-exports
//! the storage API so that the API crate depends on a single service facade. Keep
//! business logic here; keep thin HTTP handling in codedrop-api.

#[cfg(feature = "cleanup")]
pub mod cleanup;
pub mod code_generator;
pub mod exchange;

#[cfg(feature = "cleanup")]
pub use cleanup::{ReapReport, Reaper, ReaperState};
pub use code_generator::{CodeGenerator, RandomCodeGenerator};
pub use codedrop_storage::{
    create_store, ByteStream, ExpiringStore, StorageBackend, StorageError, StorageResult,
    UploadStream,
};
pub use exchange::{Download, ExchangeService};
