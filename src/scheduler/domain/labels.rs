//! Resource labels and label selectors.

use std::collections::BTreeMap;
use std::fmt;

/// Labels attached to a cluster resource.
pub type ResourceLabels = BTreeMap<String, String>;

/// Label naming the role a resource plays, for example `worker-config`.
pub const COMPONENT_LABEL: &str = "brignext.io/component";
/// Label naming the owning project.
pub const PROJECT_LABEL: &str = "brignext.io/project";
/// Label naming the owning event.
pub const EVENT_LABEL: &str = "brignext.io/event";

/// One clause of a [`LabelSelector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelRequirement {
    /// The label must be present with this value.
    Equals(String, String),
    /// The label must be absent or carry a different value.
    NotEquals(String, String),
}

impl LabelRequirement {
    fn is_satisfied_by(&self, labels: &ResourceLabels) -> bool {
        match self {
            Self::Equals(key, value) => labels.get(key) == Some(value),
            Self::NotEquals(key, value) => labels.get(key) != Some(value),
        }
    }
}

/// Conjunction of label requirements.
///
/// An empty selector matches every resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSelector {
    requirements: Vec<LabelRequirement>,
}

impl LabelSelector {
    /// Creates a selector that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `key` to equal `value`.
    #[must_use]
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements
            .push(LabelRequirement::Equals(key.into(), value.into()));
        self
    }

    /// Requires `key` not to equal `value`.
    #[must_use]
    pub fn not_equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements
            .push(LabelRequirement::NotEquals(key.into(), value.into()));
        self
    }

    /// Returns the requirements in insertion order.
    #[must_use]
    pub fn requirements(&self) -> &[LabelRequirement] {
        &self.requirements
    }

    /// Returns `true` when every requirement holds for `labels`.
    #[must_use]
    pub fn matches(&self, labels: &ResourceLabels) -> bool {
        self.requirements
            .iter()
            .all(|requirement| requirement.is_satisfied_by(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut separator = "";
        for requirement in &self.requirements {
            match requirement {
                LabelRequirement::Equals(key, value) => write!(f, "{separator}{key}={value}")?,
                LabelRequirement::NotEquals(key, value) => {
                    write!(f, "{separator}{key}!={value}")?;
                }
            }
            separator = ",";
        }
        Ok(())
    }
}
