use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;
use url::Url;

use crate::relabel::RelabelError;

/// Result type alias for notifier operations
pub type Result<T> = std::result::Result<T, NotifierError>;

/// Errors raised while constructing a notifier or posting an event
#[derive(Debug, Error)]
pub enum NotifierError {
    /// One or more endpoint tokens are not valid request URIs
    #[error("invalid endpoint configuration: {0}")]
    InvalidEndpoints(ErrorList<EndpointParseError>),

    /// The relabel document could not be parsed
    #[error("failed to parse relabel config: {0}")]
    RelabelConfig(#[source] serde_yaml::Error),

    /// A relabel rule parsed but is not usable
    #[error("invalid relabel rule #{index}: {reason}")]
    InvalidRelabelRule {
        /// Zero-based position of the rule in the document
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// Failed to build HTTP client
    #[error("Failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// The proxy URL was rejected by the HTTP client
    #[error("invalid proxy URL: {0}")]
    InvalidProxy(#[source] reqwest::Error),

    /// The trust store is not a usable PEM bundle
    #[error("invalid trust store: {0}")]
    InvalidTrustStore(#[source] reqwest::Error),

    /// The trust store holds no PEM certificates
    #[error("invalid trust store: no PEM certificates found")]
    EmptyTrustStore,

    /// The relabel stage failed for this event
    #[error("relabeling failed: {0}")]
    Relabel(#[from] RelabelError),

    /// At least one endpoint did not accept the alert
    #[error("failed to deliver alert: {0}")]
    Delivery(ErrorList<EndpointFailure>),
}

impl NotifierError {
    /// Check if the error was raised while validating configuration
    ///
    /// Configuration errors only occur during construction; they never come
    /// back from posting an event.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEndpoints(_)
                | Self::RelabelConfig(_)
                | Self::InvalidRelabelRule { .. }
                | Self::BuildHttpClient(_)
                | Self::InvalidProxy(_)
                | Self::InvalidTrustStore(_)
                | Self::EmptyTrustStore
        )
    }

    /// Per-endpoint failures, if this is a delivery error
    pub fn delivery_failures(&self) -> Option<&ErrorList<EndpointFailure>> {
        match self {
            Self::Delivery(failures) => Some(failures),
            _ => None,
        }
    }
}

/// A single endpoint token that failed validation
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// The token does not parse as an absolute URL
    #[error("invalid endpoint {token:?}: {source}")]
    Malformed {
        /// The offending token
        token: String,
        /// Underlying parse error
        #[source]
        source: url::ParseError,
    },

    /// The token parses, but is opaque and cannot be used as a request target
    #[error("invalid endpoint {token:?}: not a request URI")]
    NotRequestUri {
        /// The offending token
        token: String,
    },
}

impl EndpointParseError {
    /// The endpoint token that was rejected
    pub fn token(&self) -> &str {
        match self {
            Self::Malformed { token, .. } | Self::NotRequestUri { token } => token,
        }
    }
}

/// Errors that can occur when delivering to a single endpoint
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest_middleware::Error),

    /// Failed to serialize alerts
    #[error("Failed to serialize alerts: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The endpoint returned a non-success response
    #[error("Alertmanager API error: HTTP {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The attempt was abandoned because the call was cancelled
    #[error("delivery cancelled")]
    Cancelled,
}

impl DeliveryError {
    /// Check if the error is retryable
    ///
    /// Returns `true` for:
    /// - Network/connection errors
    /// - Timeout errors
    /// - Server errors (5xx status codes)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(source) => {
                if let Some(reqwest_err) = StdError::source(source) {
                    if let Some(err) = reqwest_err.downcast_ref::<reqwest::Error>() {
                        return err.is_connect() || err.is_timeout();
                    }
                }
                if let reqwest_middleware::Error::Reqwest(err) = source {
                    return err.is_connect() || err.is_timeout();
                }
                false
            }
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A delivery failure tied to the endpoint it happened on
#[derive(Debug, Error)]
#[error("{endpoint}: {error}")]
pub struct EndpointFailure {
    /// Endpoint the alert was sent to
    pub endpoint: Url,
    /// Why the delivery failed
    #[source]
    pub error: DeliveryError,
}

/// Ordered collection of errors that renders every entry
///
/// Only surfaced through [`ErrorList::into_result`], so a returned list is
/// never empty.
#[derive(Debug)]
pub struct ErrorList<E> {
    errors: Vec<E>,
}

impl<E> ErrorList<E> {
    /// Create an empty list
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Append an error, keeping insertion order
    pub fn push(&mut self, error: E) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.errors.iter()
    }

    /// `Ok(value)` when nothing was collected, otherwise the list mapped
    /// into the caller's error type
    pub fn into_result<T, F>(self, value: T, wrap: F) -> Result<T>
    where
        F: FnOnce(Self) -> NotifierError,
    {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(wrap(self))
        }
    }
}

impl<E> Default for ErrorList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> FromIterator<E> for ErrorList<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl<'a, E> IntoIterator for &'a ErrorList<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl<E: Display> Display for ErrorList<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            1 => write!(f, "1 error occurred:")?,
            n => write!(f, "{n} errors occurred:")?,
        }
        for error in &self.errors {
            write!(f, "\n\t* {error}")?;
        }
        Ok(())
    }
}

impl<E: StdError> StdError for ErrorList<E> {}
