//! Data models for the exchange
//!
//! A stored upload is a [`FileEntry`]; the subset of it that is safe to hand to
//! anyone holding the code is [`FileMetadata`].

mod entry;

pub use entry::{FileEntry, FileMetadata};
