// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host identifier: a lowercase fully-qualified DNS name.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;
use std::fmt;

/// A validated, lowercase fully-qualified host name.
///
/// Construction always validates: the name must contain at least one dot,
/// so a short name and a domain can both be derived.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostId(SmolStr);

/// Error returned when a candidate host id fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostIdError {
    #[error("host id is empty")]
    Empty,
    #[error("host id '{0}' is not a fully-qualified name (missing a dot)")]
    NotFullyQualified(String),
}

impl HostId {
    /// Parse and validate a candidate host id, lower-casing it first.
    pub fn parse(candidate: impl AsRef<str>) -> Result<Self, HostIdError> {
        let candidate = candidate.as_ref().trim();
        if candidate.is_empty() {
            return Err(HostIdError::Empty);
        }
        let lower = candidate.to_ascii_lowercase();
        if !lower.contains('.') {
            return Err(HostIdError::NotFullyQualified(lower));
        }
        Ok(Self(SmolStr::new(lower)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first dot.
    pub fn short_name(&self) -> &str {
        self.0.split_once('.').map(|(short, _)| short).unwrap_or(&self.0)
    }

    /// Everything after the first dot.
    pub fn domain(&self) -> &str {
        self.0.split_once('.').map(|(_, domain)| domain).unwrap_or("")
    }
}

impl TryFrom<String> for HostId {
    type Error = HostIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<HostId> for String {
    fn from(value: HostId) -> Self {
        value.0.to_string()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostId({:?})", self.0.as_str())
    }
}

impl Borrow<str> for HostId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for HostId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
#[path = "host_id_tests.rs"]
mod tests;
