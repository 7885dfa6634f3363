pub mod download;
pub mod file_delete;
pub mod file_info;
pub mod stats;
pub mod upload;
