//! Lifecycle events emitted by reconciliation controllers.
//!
//! Field names follow the controllers' JSON encoding, so an event body read
//! off the wire deserializes directly into [`Event`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key classifying commit status events
pub const META_COMMIT_STATUS_KEY: &str = "commit_status";

/// Commit status value for intermediate updates
pub const META_COMMIT_STATUS_UPDATE_VALUE: &str = "update";

/// Metadata key whose value becomes the `summary` annotation
pub const META_SUMMARY_KEY: &str = "summary";

/// Reference to the object an event concerns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_path: String,
}

impl ObjectReference {
    pub fn new(kind: &str, name: &str, namespace: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }
}

/// A lifecycle event reported by a controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// The object this event is about
    pub involved_object: ObjectReference,

    /// Severity of the event, usually `info` or `error`
    pub severity: String,

    /// When the event was recorded
    pub timestamp: DateTime<Utc>,

    /// Human-readable description
    pub message: String,

    /// Short machine-oriented reason, e.g. `ReconciliationFailed`
    pub reason: String,

    /// Free-form key/value metadata attached by the controller
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Name of the controller that emitted the event
    pub reporting_controller: String,

    /// Instance of the controller that emitted the event
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reporting_instance: String,
}

impl Event {
    /// Check whether the event is a commit status event with the given status
    pub fn is_commit_status(&self, status: &str) -> bool {
        self.metadata
            .get(META_COMMIT_STATUS_KEY)
            .is_some_and(|value| value == status)
    }
}
