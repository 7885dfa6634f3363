//! Retrieval code generation
//!
//! Generators only produce candidates. Uniqueness is checked by the store when the
//! entry is published, and [`ExchangeService`](crate::ExchangeService) retries on
//! conflict.

use codedrop_core::CodeFormat;
use rand::Rng;

pub trait CodeGenerator: Send + Sync {
    /// A fresh candidate code. Never fails; a broken entropy source aborts the process.
    fn generate(&self) -> String;
}

/// Draws each character uniformly from the configured alphabet using the
/// thread-local CSPRNG, which is seeded from the operating system.
#[derive(Debug, Clone)]
pub struct RandomCodeGenerator {
    format: CodeFormat,
}

impl RandomCodeGenerator {
    pub fn new(format: CodeFormat) -> Self {
        Self { format }
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let alphabet = self.format.alphabet();
        let mut rng = rand::rng();
        (0..self.format.length())
            .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
            .collect()
    }
}
