//! API constants

/// API base path prefix
pub const API_PREFIX: &str = "/api";

/// Name of the multipart field carrying the upload.
pub const UPLOAD_FIELD: &str = "file";

/// Allowance on top of the upload limit for multipart framing. The exchange
/// service enforces the exact limit on the file bytes themselves.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;
