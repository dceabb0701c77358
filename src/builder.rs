use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use crate::event::{Event, META_COMMIT_STATUS_UPDATE_VALUE, META_SUMMARY_KEY};
use crate::types::{Alert, AlertStatus, Labels};

/// Prefix of every generated `alertname`
pub const ALERTNAME_PREFIX: &str = "Flux";

/// Turns an event reason into the suffix of an `alertname`
pub trait TitleCase: Send + Sync + Debug {
    fn title(&self, input: &str) -> String;
}

/// Upper-cases the first letter of each whitespace-delimited word and
/// lower-cases the rest, dropping the whitespace
///
/// Case mapping uses Unicode defaults, never a locale. `"build failed"`
/// becomes `"BuildFailed"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvariantTitleCase;

impl TitleCase for InvariantTitleCase {
    fn title(&self, input: &str) -> String {
        title_words(input, true)
    }
}

/// Like [`InvariantTitleCase`] but keeps the case of the remaining letters,
/// so reasons that are already camel case (`ReconciliationFailed`) pass
/// through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PreservingTitleCase;

impl TitleCase for PreservingTitleCase {
    fn title(&self, input: &str) -> String {
        title_words(input, false)
    }
}

fn title_words(input: &str, lower_rest: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for word in input.split_whitespace() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
        }
        if lower_rest {
            out.extend(chars.flat_map(char::to_lowercase));
        } else {
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Renders `2006-01-02 15:04:05.999999999 +0000 UTC`, with trailing zeros of
/// the fractional seconds trimmed and the fraction omitted when zero
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    let mut out = timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
    let nanos = timestamp.timestamp_subsec_nanos();
    if nanos > 0 {
        let fraction = format!("{nanos:09}");
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out.push_str(" +0000 UTC");
    out
}

/// Maps events to alerts
///
/// Labels start from the event metadata (minus `summary`, which becomes an
/// annotation) and are then overlaid with `alertname`, `severity`,
/// `reason`, `timestamp`, `kind`, `name`, `namespace` and
/// `reportingcontroller`, which win over metadata keys of the same name.
/// The `message` annotation is always set.
#[derive(Debug, Clone)]
pub struct AlertBuilder {
    casing: Arc<dyn TitleCase>,
}

impl Default for AlertBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertBuilder {
    pub fn new() -> Self {
        Self::with_title_case(InvariantTitleCase)
    }

    /// Use a different strategy for the reason part of `alertname`
    pub fn with_title_case(casing: impl TitleCase + 'static) -> Self {
        Self {
            casing: Arc::new(casing),
        }
    }

    /// `Flux` + involved object kind + title-cased reason
    pub fn alertname(&self, event: &Event) -> String {
        format!(
            "{ALERTNAME_PREFIX}{}{}",
            event.involved_object.kind,
            self.casing.title(&event.reason)
        )
    }

    /// Build the alert for an event
    ///
    /// Returns `None` for commit status update events, which are too noisy
    /// to alert on.
    pub fn build(&self, event: &Event) -> Option<Alert> {
        if event.is_commit_status(META_COMMIT_STATUS_UPDATE_VALUE) {
            debug!(
                kind = %event.involved_object.kind,
                name = %event.involved_object.name,
                "Skipping commit status update event"
            );
            return None;
        }

        let mut labels: Labels = event.metadata.clone();

        let mut annotations = Labels::new();
        annotations.insert("message".to_string(), event.message.clone());
        if let Some(summary) = labels.remove(META_SUMMARY_KEY) {
            annotations.insert(META_SUMMARY_KEY.to_string(), summary);
        }

        let object = &event.involved_object;
        labels.insert("alertname".to_string(), self.alertname(event));
        labels.insert("severity".to_string(), event.severity.clone());
        labels.insert("reason".to_string(), event.reason.clone());
        labels.insert("timestamp".to_string(), format_timestamp(&event.timestamp));
        labels.insert("kind".to_string(), object.kind.clone());
        labels.insert("name".to_string(), object.name.clone());
        labels.insert("namespace".to_string(), object.namespace.clone());
        labels.insert(
            "reportingcontroller".to_string(),
            event.reporting_controller.clone(),
        );

        Some(Alert {
            status: AlertStatus::Firing,
            labels,
            annotations,
        })
    }
}
