//! # Alertmanager Notifier
//!
//! Forwards reconciliation events to one or more
//! [Alertmanager](https://prometheus.io/docs/alerting/latest/alertmanager/)-compatible
//! webhook endpoints.
//!
//! ## Features
//!
//! - Maps each event to a firing alert with fixed labels (`alertname`,
//!   `severity`, `reason`, `timestamp`, `kind`, `name`, `namespace`,
//!   `reportingcontroller`) on top of the event metadata
//! - Optional Prometheus-style relabeling of the alert labels
//! - Delivery to every endpoint independently, with all failures reported
//!   together
//! - Commit status update events are skipped
//!
//! ## Example
//!
//! ```rust,no_run
//! use alertmanager_notifier::{Alertmanager, Event, NotifierConfig, ObjectReference};
//! use chrono::Utc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NotifierConfig::new("http://am-1:9093/api/v2/alerts,http://am-2:9093/api/v2/alerts")
//!         .with_relabel_config("action: labeldrop\nregex: timestamp\n");
//!     let notifier = Alertmanager::new(config)?;
//!
//!     let event = Event {
//!         involved_object: ObjectReference::new("Kustomization", "app", "flux-system"),
//!         severity: "error".to_string(),
//!         timestamp: Utc::now(),
//!         message: "kustomize build failed".to_string(),
//!         reason: "BuildFailed".to_string(),
//!         metadata: Default::default(),
//!         reporting_controller: "kustomize-controller".to_string(),
//!         reporting_instance: String::new(),
//!     };
//!
//!     notifier.post(&event).await?;
//!     Ok(())
//! }
//! ```

mod builder;
mod client;
mod config;
mod endpoints;
mod errors;
mod event;
mod notifier;
mod relabel;
mod types;

pub use builder::{
    format_timestamp, AlertBuilder, InvariantTitleCase, PreservingTitleCase, TitleCase,
    ALERTNAME_PREFIX,
};
pub use client::{AlertSender, HttpSender};
pub use config::{NotifierConfig, DEFAULT_TIMEOUT};
pub use endpoints::parse_endpoints;
pub use errors::{
    DeliveryError, EndpointFailure, EndpointParseError, ErrorList, NotifierError, Result,
};
pub use event::{
    Event, ObjectReference, META_COMMIT_STATUS_KEY, META_COMMIT_STATUS_UPDATE_VALUE,
    META_SUMMARY_KEY,
};
pub use notifier::{Alertmanager, Notifier};
pub use relabel::{
    is_valid_label_name, Action, RelabelConfig, RelabelError, RelabelRegex, RelabelRules,
    Relabeler,
};
pub use types::{Alert, AlertStatus, Labels};
