//! Identifier types for the project domain.

use super::ProjectDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-chosen project identifier.
///
/// Identifiers are embedded in namespace and queue names, so they are
/// restricted to lowercase ASCII letters, digits and `-`, must start with a
/// letter, and must not end with `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Creates a validated project identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectDomainError::EmptyProjectId`] for blank input and
    /// [`ProjectDomainError::InvalidProjectId`] for disallowed characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ProjectDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProjectDomainError::EmptyProjectId);
        }
        let starts_with_letter = trimmed.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        let allowed = trimmed
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !starts_with_letter || !allowed || trimmed.ends_with('-') {
            return Err(ProjectDomainError::InvalidProjectId(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectId {
    type Error = ProjectDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectId> for String {
    fn from(value: ProjectId) -> Self {
        value.0
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
