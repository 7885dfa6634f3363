//! Default values for the exchange configuration surface.

/// Retrieval code alphabet: uppercase ASCII letters followed by digits.
pub const DEFAULT_CODE_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of characters in a retrieval code.
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Attempts at minting an unused code before an upload gives up.
pub const DEFAULT_CODE_MAX_ATTEMPTS: u32 = 16;

/// How long an uploaded file stays retrievable.
pub const DEFAULT_TTL_HOURS: u64 = 24;

/// Longest accepted TTL: one year.
pub const MAX_TTL_HOURS: u64 = 24 * 365;

/// Largest accepted upload, in MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE_MB: u64 = 100;

/// Seconds between two reaper scans.
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 300;

/// Content type recorded when the client does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// File name recorded when the client does not send one.
pub const DEFAULT_FILE_NAME: &str = "unknown";
