//! Project secrets.

use super::ProjectDomainError;
use serde::{Deserialize, Serialize};

/// Value reported in place of a secret's real value.
pub const REDACTED_SECRET_VALUE: &str = "*** REDACTED ***";

/// A key/value pair stored in the project's secret store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    key: String,
    value: String,
}

impl Secret {
    /// Creates a secret.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectDomainError::EmptySecretKey`] when the key is blank.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, ProjectDomainError> {
        let owned_key = key.into();
        if owned_key.trim().is_empty() {
            return Err(ProjectDomainError::EmptySecretKey);
        }
        Ok(Self {
            key: owned_key,
            value: value.into(),
        })
    }

    /// Returns the secret key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the secret value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns a copy whose value is replaced by [`REDACTED_SECRET_VALUE`].
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: REDACTED_SECRET_VALUE.to_owned(),
        }
    }
}
