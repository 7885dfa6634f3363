//! Code-based file exchange: publish a file under a short code, serve it back to
//! anyone holding the code until it expires.

mod service;

pub use service::{Download, ExchangeService};
