use async_trait::async_trait;
use futures::future::join_all;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::builder::AlertBuilder;
use crate::client::{AlertSender, HttpSender};
use crate::config::NotifierConfig;
use crate::endpoints::parse_endpoints;
use crate::errors::{DeliveryError, EndpointFailure, ErrorList, NotifierError, Result};
use crate::event::Event;
use crate::relabel::{RelabelRules, Relabeler};
use crate::types::Alert;

/// Something that can forward an event
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Forward one event; cancelling `cancel` abandons in-flight deliveries
    async fn notify(&self, event: &Event, cancel: &CancellationToken) -> Result<()>;
}

/// Forwards events as alerts to one or more Alertmanager-compatible endpoints
///
/// Configuration is validated once in [`Alertmanager::new`]; the notifier
/// is immutable afterwards and can be shared between tasks.
///
/// # Example
///
/// ```rust,no_run
/// use alertmanager_notifier::{Alertmanager, Event, NotifierConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let notifier = Alertmanager::new(NotifierConfig::new(
///         "http://am-1:9093/api/v2/alerts,http://am-2:9093/api/v2/alerts",
///     ))?;
///
///     let body = std::fs::read_to_string("event.json")?;
///     let event: Event = serde_json::from_str(&body)?;
///
///     notifier.post(&event).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Alertmanager {
    endpoints: Arc<[Url]>,
    builder: AlertBuilder,
    relabeler: Option<Arc<dyn Relabeler>>,
    sender: Arc<dyn AlertSender>,
}

impl Alertmanager {
    /// Create a notifier from its configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any endpoint is not a valid request URI (all of them are reported)
    /// - The relabel document cannot be parsed or holds an invalid rule
    /// - The HTTP client cannot be built from the proxy and trust store
    pub fn new(config: NotifierConfig) -> Result<Self> {
        let endpoints = parse_endpoints(&config.endpoints)?;

        let relabeler = match config.relabel_config.as_deref() {
            Some(document) => RelabelRules::parse(document)?
                .map(|rules| Arc::new(rules) as Arc<dyn Relabeler>),
            None => None,
        };

        let sender = HttpSender::new(
            config.proxy_url.as_deref(),
            config.trust_store.as_deref(),
            config.timeout,
        )?;

        debug!(
            endpoints = endpoints.len(),
            relabel = relabeler.is_some(),
            "Created Alertmanager notifier"
        );

        Ok(Self {
            endpoints: endpoints.into(),
            builder: AlertBuilder::new(),
            relabeler,
            sender: Arc::new(sender),
        })
    }

    /// Replace the transport used to reach endpoints
    pub fn with_sender(mut self, sender: Arc<dyn AlertSender>) -> Self {
        self.sender = sender;
        self
    }

    /// Replace the relabel stage, enabling it if it was off
    pub fn with_relabeler(mut self, relabeler: Arc<dyn Relabeler>) -> Self {
        self.relabeler = Some(relabeler);
        self
    }

    /// Replace the event-to-alert mapping
    pub fn with_alert_builder(mut self, builder: AlertBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Endpoints in configured order
    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    /// Whether labels are rewritten before delivery
    pub fn performs_relabel(&self) -> bool {
        self.relabeler.is_some()
    }

    /// Build the alert for an event and run the relabel stage
    ///
    /// `Ok(None)` means the event is a commit status update and there is
    /// nothing to deliver. Relabel rules that discard the label set leave
    /// the alert with no labels; it is still delivered.
    pub fn alert_for(&self, event: &Event) -> Result<Option<Alert>> {
        let Some(mut alert) = self.builder.build(event) else {
            return Ok(None);
        };

        if let Some(relabeler) = &self.relabeler {
            alert.labels = relabeler.relabel(alert.labels)?;
            if alert.labels.is_empty() {
                debug!("Relabel rules discarded every label");
            }
        }

        Ok(Some(alert))
    }

    /// Forward an event to every endpoint
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Delivery`] listing every endpoint that
    /// failed, or [`NotifierError::Relabel`] if the relabel stage failed.
    pub async fn post(&self, event: &Event) -> Result<()> {
        self.post_with_cancellation(event, &CancellationToken::new())
            .await
    }

    /// Forward an event to every endpoint, abandoning attempts still in
    /// flight once `cancel` fires
    ///
    /// Endpoints that already answered keep their outcome; abandoned ones
    /// are reported as [`DeliveryError::Cancelled`].
    #[instrument(
        name = "Alertmanager::post",
        skip_all,
        fields(
            kind = %event.involved_object.kind,
            name = %event.involved_object.name,
            reason = %event.reason
        )
    )]
    pub async fn post_with_cancellation(
        &self,
        event: &Event,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(alert) = self.alert_for(event)? else {
            return Ok(());
        };

        self.deliver(&[alert], cancel).await
    }

    async fn deliver(&self, alerts: &[Alert], cancel: &CancellationToken) -> Result<()> {
        let attempts = self.endpoints.iter().map(|endpoint| async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(DeliveryError::Cancelled),
                result = self.sender.send(endpoint, alerts) => result,
            };

            match &result {
                Ok(()) => debug!(endpoint = %endpoint, "Alert delivered"),
                Err(err) => warn!(endpoint = %endpoint, error = %err, "Alert delivery failed"),
            }

            result.map_err(|error| EndpointFailure {
                endpoint: endpoint.clone(),
                error,
            })
        });

        let failures: ErrorList<EndpointFailure> = join_all(attempts)
            .await
            .into_iter()
            .filter_map(|result| result.err())
            .collect();

        failures.into_result((), NotifierError::Delivery)
    }
}

impl Debug for Alertmanager {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alertmanager")
            .field("endpoints", &self.endpoints)
            .field("builder", &self.builder)
            .field("relabeler", &self.relabeler)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for Alertmanager {
    async fn notify(&self, event: &Event, cancel: &CancellationToken) -> Result<()> {
        self.post_with_cancellation(event, cancel).await
    }
}
