//! Event subscriptions used to fan provider events out to projects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Labels attached to events and subscriptions.
pub type EventLabels = BTreeMap<String, String>;

/// Wildcard accepted in [`EventSubscription::types`].
const ANY_TYPE: &str = "*";

/// A project's interest in events from one source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSubscription {
    /// Event source, for example `github`.
    pub source: String,
    /// Event types of interest. `*` matches any type; an empty list matches
    /// every type.
    pub types: Vec<String>,
    /// Labels that a matching event must carry, with equal values.
    pub labels: EventLabels,
}

impl EventSubscription {
    /// Creates a subscription to `source` for the given types.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            source: source.into(),
            types: types.into_iter().map(Into::into).collect(),
            labels: EventLabels::new(),
        }
    }

    /// Adds a required label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns `true` when an event with this source, type and labels should
    /// be delivered to the subscribing project.
    ///
    /// Every label on the event must be present on the subscription with the
    /// same value. Blank sources and types never match.
    #[must_use]
    pub fn matches(&self, source: &str, event_type: &str, labels: &EventLabels) -> bool {
        if self.source.is_empty() || source.is_empty() || event_type.is_empty() {
            return false;
        }
        if self.source != source {
            return false;
        }
        let type_matches = self.types.is_empty()
            || self
                .types
                .iter()
                .any(|candidate| candidate == event_type || candidate == ANY_TYPE);
        type_matches
            && labels
                .iter()
                .all(|(key, value)| self.labels.get(key) == Some(value))
    }
}
