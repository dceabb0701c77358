use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client, Proxy};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::errors::{DeliveryError, NotifierError, Result};
use crate::types::Alert;

/// Delivers a batch of alerts to one endpoint
///
/// Implementations make a single attempt; retries are the caller's concern.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, endpoint: &Url, alerts: &[Alert]) -> std::result::Result<(), DeliveryError>;
}

/// [`AlertSender`] that POSTs the alerts as a JSON array
///
/// # Example
///
/// ```rust,no_run
/// use alertmanager_notifier::{Alert, AlertSender, HttpSender};
/// use url::Url;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sender = HttpSender::new(None, None, Duration::from_secs(15))?;
///
///     let alert = Alert::firing()
///         .with_label("alertname", "FluxKustomizationBuildFailed")
///         .with_annotation("message", "kustomize build failed");
///
///     let endpoint = Url::parse("http://localhost:9093/api/v2/alerts")?;
///     sender.send(&endpoint, &[alert]).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct HttpSender {
    client: ClientWithMiddleware,
}

impl HttpSender {
    /// Create a new sender
    ///
    /// # Arguments
    ///
    /// * `proxy` - Proxy URL for all requests; `None` or empty uses the environment
    /// * `trust_store` - PEM bundle replacing the built-in root certificates
    /// * `timeout` - Request timeout duration
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy or trust store is rejected or the HTTP
    /// client cannot be built.
    pub fn new(proxy: Option<&str>, trust_store: Option<&[u8]>, timeout: Duration) -> Result<Self> {
        let mut builder = Client::builder().timeout(timeout);

        if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
            let proxy = Proxy::all(proxy).map_err(NotifierError::InvalidProxy)?;
            builder = builder.proxy(proxy);
        }

        if let Some(pem) = trust_store {
            let certificates =
                Certificate::from_pem_bundle(pem).map_err(NotifierError::InvalidTrustStore)?;
            if certificates.is_empty() {
                return Err(NotifierError::EmptyTrustStore);
            }
            debug!(certificates = certificates.len(), "Using custom trust store");
            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        let client = builder.build().map_err(NotifierError::BuildHttpClient)?;

        let client = ClientBuilder::new(client).build();

        Ok(Self { client })
    }

    /// Create a new sender with a custom reqwest middleware client
    ///
    /// This allows you to add custom middleware (logging, auth, etc.)
    pub fn with_client(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlertSender for HttpSender {
    #[instrument(
        name = "HttpSender::send",
        skip_all,
        fields(endpoint = %endpoint, alert_count = alerts.len())
    )]
    async fn send(&self, endpoint: &Url, alerts: &[Alert]) -> std::result::Result<(), DeliveryError> {
        let body = serde_json::to_vec(alerts).map_err(DeliveryError::Serialize)?;

        debug!("Posting alerts");

        let response = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(DeliveryError::Request)?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Alerts posted successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(server: &MockServer) -> Url {
        Url::parse(&format!("{}/api/v2/alerts", server.uri())).unwrap()
    }

    fn alert() -> Alert {
        Alert::firing()
            .with_label("alertname", "FluxKustomizationBuildFailed")
            .with_annotation("message", "build failed")
    }

    #[tokio::test]
    async fn test_send_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v2/alerts"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!([{
                "status": "firing",
                "labels": {"alertname": "FluxKustomizationBuildFailed"},
                "annotations": {"message": "build failed"}
            }])))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sender = HttpSender::new(None, None, Duration::from_secs(10)).unwrap();

        let result = sender.send(&endpoint(&mock_server), &[alert()]).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad request"))
            .mount(&mock_server)
            .await;

        let sender = HttpSender::new(None, None, Duration::from_secs(10)).unwrap();

        let result = sender.send(&endpoint(&mock_server), &[alert()]).await;

        match result {
            Err(DeliveryError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad request");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_server_error_is_retryable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service unavailable"))
            .mount(&mock_server)
            .await;

        let sender = HttpSender::new(None, None, Duration::from_secs(10)).unwrap();

        let err = sender
            .send(&endpoint(&mock_server), &[alert()])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_send_timeout_is_retryable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let sender = HttpSender::new(None, None, Duration::from_millis(100)).unwrap();

        let err = sender
            .send(&endpoint(&mock_server), &[alert()])
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Request(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_empty_proxy_is_ignored() {
        assert!(HttpSender::new(Some(""), None, Duration::from_secs(1)).is_ok());
    }

    const SELF_SIGNED_PEM: &str = "\
-----BEGIN CERTIFICATE-----
MIIDGzCCAgOgAwIBAgIUDaIt7UzEpuoZlx/HHbUzJWDCmfwwDQYJKoZIhvcNAQEL
BQAwHDEaMBgGA1UEAwwRYWxlcnRtYW5hZ2VyLnRlc3QwIBcNMjYxMDE1MTEyNzAx
WhgPMjEyNjA5MjExMTI3MDFaMBwxGjAYBgNVBAMMEWFsZXJ0bWFuYWdlci50ZXN0
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAjOhxiZ4YZg6apbWkbXvq
Qv5+GGdGxHu4QLF/r6petCdOVbvsG2+5fgAHQ0vjA7E1/9uKfUjFUx7wNk7GFrnI
CreLNYv1y9SiZrw9WCGizOF+dn1LQTRPF5W8XLUkvbQ8HmQXWyvHRQQgKvftz9Zb
w8icmptrCp9/COQ0kv+0pxr1/YNYjWBSZ1Z3kfDfaBB7lmTpbYNh8WKYNJ/H3HIP
hz/8yzzt+wGJ9pJwYrxNxi/s7fo1R74QRbYlwTsMdPOytBahfV0iFo3o9h4LethT
1snL8R/ikRSnOcy07Au/JBBitmlaEHUohh5sw2z0c0DNcdR1v62ImSjrPiR5V0/P
wwIDAQABo1MwUTAdBgNVHQ4EFgQUtl7SaOnQYyWs8pcgns3+EWYsre0wHwYDVR0j
BBgwFoAUtl7SaOnQYyWs8pcgns3+EWYsre0wDwYDVR0TAQH/BAUwAwEB/zANBgkq
hkiG9w0BAQsFAAOCAQEAag3JoeoXnBzwpifSagx1cKid7zMNVpP0yj1vf+/6IJS4
YbGBB0aVh3DHUd5JnCcon2wURgig/qXSCPhGSr0/KVZHocKvRB0cbzp9jC6PqNQO
skmIWuCWh6nmKkvtaJbRvNARtwLpS90RU+hH2r2nYK2G+8vsDhm2R7hyZqy2qdeL
/zmbpUVHfD4H7exxAHytLSVJADkOGJpVVLJELh0shIC52xeeGpttuL0xjsY8Wps+
LuPZn1+kyrRG/jk/Axol42VtFzACFuECGhYMXSKACEwkqTC6+sMuKXbTimT3GpNX
AlXdZvCmFzvjTg/oPQ35PwmErrNLS4M39/KznLi7vw==
-----END CERTIFICATE-----
";

    #[test]
    fn test_unparseable_proxy_rejected() {
        let result = HttpSender::new(Some("http://[::1"), None, Duration::from_secs(1));
        assert!(matches!(result, Err(NotifierError::InvalidProxy(_))));
    }

    #[test]
    fn test_trust_store_without_certificates_rejected() {
        let result = HttpSender::new(None, Some(&b"not a pem bundle"[..]), Duration::from_secs(1));
        let err = result.err().unwrap();
        assert!(matches!(err, NotifierError::EmptyTrustStore));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_self_signed_trust_store_accepted() {
        let result = HttpSender::new(
            None,
            Some(SELF_SIGNED_PEM.as_bytes()),
            Duration::from_secs(1),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_proxy_is_accepted() {
        assert!(HttpSender::new(Some("http://proxy.internal:3128"), None, Duration::from_secs(1)).is_ok());
    }
}
