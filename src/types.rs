use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Label or annotation set, ordered by key so payloads serialize deterministically
pub type Labels = BTreeMap<String, String>;

/// Alert status as understood by Alertmanager
///
/// Events only ever raise alerts; Alertmanager resolves them once they stop
/// being re-sent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Firing,
}

impl Display for AlertStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Firing => write!(f, "firing"),
        }
    }
}

/// Alertmanager alert payload
///
/// Labels identify the alert for grouping and routing; annotations carry
/// the human-readable text. The two never share a key once built from an
/// event.
///
/// See: <https://prometheus.io/docs/alerting/latest/clients/>
///
/// # Example
///
/// ```rust
/// use alertmanager_notifier::{Alert, AlertStatus};
///
/// let alert = Alert::firing()
///     .with_label("alertname", "FluxKustomizationBuildFailed")
///     .with_label("namespace", "flux-system")
///     .with_annotation("message", "kustomize build failed");
///
/// assert_eq!(alert.status, AlertStatus::Firing);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Always firing for event-driven alerts
    pub status: AlertStatus,

    /// Labels identify the alert (used for deduplication and routing)
    pub labels: Labels,

    /// Annotations contain additional information (not used for dedup)
    pub annotations: Labels,
}

impl Alert {
    /// Create an empty firing alert
    pub fn firing() -> Self {
        Self::default()
    }

    /// Add a label to the alert
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    /// Get the alertname label
    pub fn alertname(&self) -> Option<&str> {
        self.labels.get("alertname").map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_creation() {
        let alert = Alert::firing()
            .with_label("alertname", "TestAlert")
            .with_label("severity", "error")
            .with_annotation("message", "Test message");

        assert_eq!(alert.status, AlertStatus::Firing);
        assert_eq!(alert.alertname(), Some("TestAlert"));
        assert_eq!(alert.labels.get("severity"), Some(&"error".to_string()));
        assert_eq!(
            alert.annotations.get("message"),
            Some(&"Test message".to_string())
        );
    }

    #[test]
    fn test_alert_serialization() {
        let alert = Alert::firing()
            .with_label("b", "2")
            .with_label("a", "1")
            .with_annotation("message", "hi");

        let json = serde_json::to_string(&vec![alert]).unwrap();
        assert_eq!(
            json,
            r#"[{"status":"firing","labels":{"a":"1","b":"2"},"annotations":{"message":"hi"}}]"#
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(AlertStatus::Firing.to_string(), "firing");
        assert_eq!(
            serde_json::to_string(&AlertStatus::default()).unwrap(),
            r#""firing""#
        );
    }

    #[test]
    fn test_alertname_missing() {
        assert_eq!(Alert::firing().alertname(), None);
    }
}
