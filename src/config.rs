use std::time::Duration;

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Construction inputs for [`Alertmanager`](crate::Alertmanager)
///
/// Nothing here is validated until the notifier is built.
///
/// ```rust
/// use alertmanager_notifier::NotifierConfig;
/// use std::time::Duration;
///
/// let config = NotifierConfig::new("http://am-1:9093/api/v2/alerts,http://am-2:9093/api/v2/alerts")
///     .with_proxy("http://proxy.internal:3128")
///     .with_relabel_config("action: labeldrop\nregex: timestamp\n")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Comma-separated endpoint URLs
    pub endpoints: String,

    /// Proxy for all outbound requests
    pub proxy_url: Option<String>,

    /// PEM bundle of trusted root certificates
    pub trust_store: Option<Vec<u8>>,

    /// Relabel rule document; blank disables relabeling
    pub relabel_config: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl NotifierConfig {
    pub fn new(endpoints: &str) -> Self {
        Self {
            endpoints: endpoints.to_string(),
            proxy_url: None,
            trust_store: None,
            relabel_config: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_proxy(mut self, proxy_url: &str) -> Self {
        self.proxy_url = Some(proxy_url.to_string());
        self
    }

    pub fn with_trust_store(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.trust_store = Some(pem.into());
        self
    }

    pub fn with_relabel_config(mut self, document: &str) -> Self {
        self.relabel_config = Some(document.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
