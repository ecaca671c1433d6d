//! Transport to the gateway's server-to-server endpoint.
//!
//! The protocol engine only hands over a URL and a form-encoded body and gets
//! raw bytes back. Timeouts, TLS and connection handling belong to the
//! [`GatewayTransport`] implementation; failures come back as data inside the
//! [`TransportReply`], and nothing is retried.
//!
//! # Feature Flags
//!
//! [`HttpTransport`] needs the `http-transport` feature (on by default) for
//! actual HTTP requests. Without it every call reports an error reply.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
#[cfg(feature = "http-transport")]
use std::time::Duration;

use crate::config::MerchantConfig;
use crate::response::GatewayResponse;
use crate::{CommwebError, Result};

/// Category of a transport failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    /// The request timed out.
    Timeout,
    /// No connection could be established.
    Connect,
    /// The gateway answered with a non-success HTTP status.
    Status(u16),
    /// The response body could not be read.
    Body,
    /// Anything else, including a transport compiled out of the build.
    Other,
}

/// Transport-level failure, reported alongside whatever body was received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Human readable detail.
    pub message: String,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportErrorKind::Status(status) => write!(f, "HTTP {}: {}", status, self.message),
            kind => write!(f, "{:?}: {}", kind, self.message),
        }
    }
}

/// Raw result of one POST to the gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportReply {
    /// Body as received; may be empty on failure.
    pub body: String,
    /// Set when the transport itself failed.
    pub error: Option<TransportError>,
}

impl TransportReply {
    /// A reply carrying a body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            error: None,
        }
    }

    /// A failed reply.
    pub fn failed(error: TransportError) -> Self {
        Self {
            body: String::new(),
            error: Some(error),
        }
    }
}

/// Posts form-encoded requests to the gateway.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// POST `body` as `application/x-www-form-urlencoded` to `url`.
    async fn post_form(&self, url: &str, body: &str) -> TransportReply;
}

/// Everything known about one server-to-server exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayExchange {
    /// Endpoint the request was sent to.
    pub url: String,
    /// Encoded body that was sent.
    pub post_body: String,
    /// Body that came back.
    pub raw_response: String,
    /// Gateway message, HTML error page or transport failure text.
    pub message: String,
    /// Transport failure, if any.
    pub transport_error: Option<TransportError>,
    /// Parsed response; `None` when the transport failed, returned HTML or
    /// sent a body that could not be parsed.
    pub response: Option<GatewayResponse>,
    /// Why `raw_response` could not be parsed.
    pub parse_error: Option<String>,
}

impl GatewayExchange {
    /// Check whether a parsed gateway response is available.
    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }
}

/// Check whether a reply body is an HTML error page rather than gateway data.
pub fn is_html_page(body: &str) -> bool {
    body.contains("<html>")
}

/// reqwest-backed transport.
///
/// Certificate verification stays enabled.
pub struct HttpTransport {
    timeout_secs: u64,
    #[cfg(feature = "http-transport")]
    client: reqwest::Client,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport with the given request timeout.
    #[cfg(feature = "http-transport")]
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CommwebError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            timeout_secs,
            client,
        })
    }

    /// Create a transport with the given request timeout (stub when feature disabled).
    #[cfg(not(feature = "http-transport"))]
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self { timeout_secs })
    }

    /// Create a transport using the merchant's configured timeout.
    pub fn from_config(config: &MerchantConfig) -> Result<Self> {
        Self::new(config.timeout_secs)
    }

    /// Configured timeout in seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    #[cfg(feature = "http-transport")]
    fn map_reqwest_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::new(
                TransportErrorKind::Timeout,
                format!("gateway request timed out after {}s", self.timeout_secs),
            )
        } else if e.is_connect() {
            TransportError::new(TransportErrorKind::Connect, e.to_string())
        } else {
            TransportError::new(TransportErrorKind::Other, e.to_string())
        }
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    #[cfg(feature = "http-transport")]
    async fn post_form(&self, url: &str, body: &str) -> TransportReply {
        let response = match self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return TransportReply::failed(self.map_reqwest_error(e)),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return TransportReply::failed(TransportError::new(
                    TransportErrorKind::Body,
                    format!("Failed to read response: {}", e),
                ))
            }
        };

        if !status.is_success() {
            return TransportReply {
                error: Some(TransportError::new(
                    TransportErrorKind::Status(status.as_u16()),
                    status.canonical_reason().unwrap_or("unexpected status"),
                )),
                body: text,
            };
        }

        TransportReply::ok(text)
    }

    #[cfg(not(feature = "http-transport"))]
    async fn post_form(&self, _url: &str, _body: &str) -> TransportReply {
        TransportReply::failed(TransportError::new(
            TransportErrorKind::Other,
            CommwebError::Unimplemented("HTTP transport (enable the 'http-transport' feature)")
                .to_string(),
        ))
    }
}
