//! Codedrop Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and code
//! format rules shared by every Codedrop component.

pub mod clock;
pub mod code_format;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use code_format::CodeFormat;
pub use config::{BaseConfig, Config, ExchangeConfig, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FileEntry, FileMetadata};
pub use storage_types::StorageBackend;
