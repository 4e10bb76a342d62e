use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Public channel identifier.
///
/// The remote namespace is case-insensitive, so a `Handle` always holds the
/// ASCII-lowercased form and plain equality is the correct comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    #[error("handle is empty")]
    Empty,
    #[error("handle {handle:?} contains invalid character {ch:?}")]
    InvalidCharacter { handle: String, ch: char },
}

impl Handle {
    /// Accepts `name`, `@name` and surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, HandleError> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(HandleError::Empty);
        }
        if let Some(ch) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(HandleError::InvalidCharacter {
                handle: trimmed.to_string(),
                ch,
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Stand-in handle for entities without a public username.
    pub fn from_numeric_id(id: i64) -> Self {
        Self(id.unsigned_abs().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Handle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Handle {
    type Error = HandleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
