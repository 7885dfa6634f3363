//! Codedrop API Library
//!
//! This crate provides the HTTP handlers, router and application setup for the
//! code-based file exchange.

mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;

pub mod error;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
