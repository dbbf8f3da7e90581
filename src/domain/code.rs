//! Application code
//!
//! Domain primitive for the externally shareable application identifier.
//! Codes are validated at construction time, so a malformed code cannot be
//! stored or looked up.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed prefix of every code
const PREFIX: &str = "APP";

/// Length of the random suffix
const SUFFIX_LEN: usize = 5;

/// Alphabet of the random suffix
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Application code of the form `APP-<year>-<5 alnum>`.
///
/// # Invariants
/// - Year is exactly four ASCII digits
/// - Suffix is exactly five characters from `[A-Z0-9]`
///
/// # Example
/// ```
/// use student_housing::domain::ApplicationCode;
///
/// let code: ApplicationCode = "APP-2026-X7K2Q".parse().unwrap();
/// assert_eq!(code.as_str(), "APP-2026-X7K2Q");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApplicationCode(String);

/// Errors that can occur when parsing a code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeFormatError {
    #[error("Application code must look like APP-YYYY-XXXXX (got {0})")]
    Malformed(String),
}

impl ApplicationCode {
    /// Generate a fresh random code for the given year.
    ///
    /// Uniqueness is not guaranteed here; the application store's unique
    /// key on the code is the authority and callers retry on collision.
    pub fn generate(year: i32) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self(format!("{PREFIX}-{:04}-{suffix}", year.rem_euclid(10_000)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ApplicationCode {
    type Err = CodeFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let malformed = || CodeFormatError::Malformed(raw.to_string());

        let mut parts = raw.split('-');
        let (Some(prefix), Some(year), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        if prefix != PREFIX {
            return Err(malformed());
        }
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if suffix.len() != SUFFIX_LEN || !suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b)) {
            return Err(malformed());
        }

        Ok(Self(raw.to_string()))
    }
}

impl TryFrom<String> for ApplicationCode {
    type Error = CodeFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ApplicationCode::from_str(&value)
    }
}

impl From<ApplicationCode> for String {
    fn from(code: ApplicationCode) -> Self {
        code.0
    }
}
