//! Blockchain addresses
//!
//! The core accepts `0x` followed by 40 hex characters, case-insensitive on
//! input, and always works with the lowercase form.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static ADDRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());

/// Errors for rejected input, raised before any graph work happens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid address: {0:?} (expected 0x followed by 40 hex characters)")]
    InvalidAddress(String),

    #[error("Source and destination are the same address: {0}")]
    SameEndpoints(String),
}

/// A validated, lowercase blockchain address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validate and normalize an address
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if !ADDRESS_REGEX.is_match(trimmed) {
            return Err(CoreError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines: `0x1234…abcd`
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// Validate a path query's endpoints; identical endpoints are a trivial non-path
pub fn validate_path_endpoints(from: &str, to: &str) -> Result<(Address, Address), CoreError> {
    let from = Address::parse(from)?;
    let to = Address::parse(to)?;
    if from == to {
        return Err(CoreError::SameEndpoints(from.to_string()));
    }
    Ok((from, to))
}

/// Normalize an arbitrary node identifier for lookups
pub fn normalize_node_id(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}
