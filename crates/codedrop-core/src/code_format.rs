//! Retrieval code format
//!
//! A code is a fixed number of characters drawn from a fixed alphabet. Client
//! input is case-insensitive: it is trimmed and upper-cased before being checked,
//! so the alphabet itself may only contain uppercase ASCII letters and digits.

use crate::constants::{DEFAULT_CODE_ALPHABET, DEFAULT_CODE_LENGTH};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFormat {
    length: usize,
    alphabet: Vec<u8>,
}

impl CodeFormat {
    /// Build a format, rejecting alphabets that normalization could never match.
    pub fn new(length: usize, alphabet: &str) -> Result<Self, anyhow::Error> {
        if length == 0 {
            return Err(anyhow::anyhow!("CODE_LENGTH must be greater than zero"));
        }

        let mut chars: Vec<u8> = Vec::with_capacity(alphabet.len());
        for c in alphabet.chars() {
            if !(c.is_ascii_uppercase() || c.is_ascii_digit()) {
                return Err(anyhow::anyhow!(
                    "CODE_ALPHABET may only contain A-Z and 0-9, found {:?}",
                    c
                ));
            }
            let byte = c as u8;
            if chars.contains(&byte) {
                return Err(anyhow::anyhow!(
                    "CODE_ALPHABET contains duplicate character {:?}",
                    c
                ));
            }
            chars.push(byte);
        }

        if chars.len() < 2 {
            return Err(anyhow::anyhow!(
                "CODE_ALPHABET must contain at least two characters"
            ));
        }

        Ok(Self {
            length,
            alphabet: chars,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    /// Number of distinct codes, saturating at `u128::MAX`.
    pub fn cardinality(&self) -> u128 {
        (self.alphabet.len() as u128)
            .checked_pow(self.length as u32)
            .unwrap_or(u128::MAX)
    }

    /// Normalize client input and check it against the format.
    ///
    /// Returns the canonical (uppercase) code, or `AppError::InvalidCode` for
    /// anything of the wrong length or outside the alphabet.
    pub fn parse(&self, raw: &str) -> Result<String, AppError> {
        let normalized = raw.trim().to_ascii_uppercase();

        if normalized.len() != self.length
            || !normalized.bytes().all(|b| self.alphabet.contains(&b))
        {
            return Err(AppError::InvalidCode(raw.to_string()));
        }

        Ok(normalized)
    }

    /// True if `code` is already canonical and well-formed.
    pub fn is_valid(&self, code: &str) -> bool {
        code.len() == self.length && code.bytes().all(|b| self.alphabet.contains(&b))
    }
}

impl Default for CodeFormat {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
            alphabet: DEFAULT_CODE_ALPHABET.as_bytes().to_vec(),
        }
    }
}
