//! Validated organization / contact-person names.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Letters (Cyrillic and Latin), whitespace and hyphens only.
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[А-Яа-яЁёA-Za-z\s-]+$").expect("Invalid regex"));

/// Errors that can occur when parsing a [`PartyName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The input is empty after trimming.
    #[error("name cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length in characters.
        max: usize,
    },
    /// The input contains something other than letters, spaces or hyphens.
    #[error("name may only contain letters, spaces or hyphens")]
    InvalidCharacters,
}

/// An organization name or contact person entered during registration.
///
/// ## Constraints
///
/// - Surrounding whitespace is trimmed
/// - Length: 1-128 characters
/// - Only Cyrillic or Latin letters, whitespace and hyphens
///
/// ## Examples
///
/// ```
/// use krash_order_core::PartyName;
///
/// assert!(PartyName::parse("ООО Рога").is_ok());
/// assert!(PartyName::parse("Jean-Paul Sartre").is_ok());
///
/// assert!(PartyName::parse("   ").is_err());
/// assert!(PartyName::parse("Рога123").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PartyName(String);

impl PartyName {
    /// Maximum length of a name, in characters.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a `PartyName` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than
    /// [`Self::MAX_LENGTH`] characters, or contains anything but letters,
    /// whitespace and hyphens.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(NameError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(NameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if !NAME_RE.is_match(trimmed) {
            return Err(NameError::InvalidCharacters);
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `PartyName` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PartyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PartyName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PartyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
