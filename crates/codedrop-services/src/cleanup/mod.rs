//! Background eviction of expired entries.

mod reaper;

pub use reaper::{ReapReport, Reaper, ReaperState};
