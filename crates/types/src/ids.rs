//! Registry identifiers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum length of a validator identifier
pub const VALIDATOR_ID_MIN_LEN: usize = 3;
/// Maximum length of a validator identifier
pub const VALIDATOR_ID_MAX_LEN: usize = 64;

/// Textual validator identifier.
///
/// Between 3 and 64 characters drawn from `[a-z0-9_-]`. Once assigned in the
/// registry an identifier is never handed out again, even after revocation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ValidatorId(String);

impl ValidatorId {
    /// Parses and validates a validator identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.len() < VALIDATOR_ID_MIN_LEN || id.len() > VALIDATOR_ID_MAX_LEN {
            return Err(Error::InvalidValidatorId(format!(
                "length must be {}..={}, got {}",
                VALIDATOR_ID_MIN_LEN,
                VALIDATOR_ID_MAX_LEN,
                id.len()
            )));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-'))
        {
            return Err(Error::InvalidValidatorId(format!(
                "illegal character {:?} in {:?}",
                c, id
            )));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier bytes, as used in canonical hashing.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ValidatorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ValidatorId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ValidatorId> for String {
    fn from(id: ValidatorId) -> Self {
        id.0
    }
}

impl AsRef<str> for ValidatorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Monotonically assigned deployment request identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeploymentId(pub u64);

impl DeploymentId {
    /// Returns the identifier that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DeploymentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
