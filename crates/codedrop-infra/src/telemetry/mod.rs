//! Tracing subscriber setup
//!
//! Log output is either human-readable or one JSON object per line, selected by
//! `LOG_FORMAT`. Filtering follows `RUST_LOG` when set.

mod init_basic;

pub use init_basic::{default_filter, init_telemetry, shutdown_telemetry};
