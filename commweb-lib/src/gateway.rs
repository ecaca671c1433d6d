//! The protocol engine: builder, signer and interpreter behind one handle.

use std::fmt;
use std::sync::Arc;

use crate::config::MerchantConfig;
use crate::counter::AttemptCounter;
use crate::request::{PaymentMode, PaymentRecord, RequestBuilder};
use crate::response::{parse_response, GatewayResponse, ResponseInterpreter, ResponseOutcome};
use crate::signer::{post_body, SignedRequest, Signer};
use crate::transport::{
    is_html_page, GatewayExchange, GatewayTransport, TransportError, TransportErrorKind,
};
use crate::{CommwebError, Fields, Result};

/// Client for one merchant account.
///
/// Immutable after construction and safe to share between tasks; every
/// operation is a function of its arguments plus the merchant configuration.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use commweb_lib::{
///     Fields, InMemoryAttemptCounter, MerchantConfig, PaymentGateway, PaymentMode, PaymentRecord,
/// };
///
/// let config = MerchantConfig::new(
///     "ACCESS01",
///     "MERCHANT01",
///     "0F1E2D3C4B5A69788796A5B4C3D2E1F0",
///     "https://shop.example.com",
/// );
/// let gateway = PaymentGateway::new(config)?
///     .with_attempt_counter(Arc::new(InMemoryAttemptCounter::new()));
///
/// let payment = PaymentRecord::new("tok123", "PAY-1", 2.0, 10.00);
/// let fields = gateway.build_payment_request(&Fields::new(), &payment, PaymentMode::Redirect)?;
/// let request = gateway.render(&fields);
///
/// assert!(request.url.contains("vpc_SecureHash="));
/// assert_eq!(fields.get("vpc_MerchTxnRef"), Some("tok123/1"));
/// # Ok::<(), commweb_lib::CommwebError>(())
/// ```
#[derive(Clone)]
pub struct PaymentGateway {
    config: Arc<MerchantConfig>,
    builder: RequestBuilder,
    signer: Signer,
    interpreter: ResponseInterpreter,
    transport: Option<Arc<dyn GatewayTransport>>,
}

impl fmt::Debug for PaymentGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentGateway")
            .field("config", &self.config)
            .field("builder", &self.builder)
            .field("signer", &self.signer)
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}

impl PaymentGateway {
    /// Create a gateway client for a merchant.
    ///
    /// # Errors
    ///
    /// [`CommwebError::InvalidSecret`] if the secret is not valid hex.
    /// An empty secret is accepted with a warning: requests then go out unsigned.
    pub fn new(config: MerchantConfig) -> Result<Self> {
        let signer = Signer::from_config(&config)?;
        for warning in config.warnings() {
            tracing::warn!(merchant = %config.merchant_id, "{}", warning);
        }

        Ok(Self {
            builder: RequestBuilder::new(&config),
            interpreter: ResponseInterpreter::new(signer.clone()),
            signer,
            config: Arc::new(config),
            transport: None,
        })
    }

    /// Set the attempt counter used when building payments.
    pub fn with_attempt_counter(mut self, counter: Arc<dyn AttemptCounter>) -> Self {
        self.builder = self.builder.with_attempt_counter(counter);
        self
    }

    /// Set the transport used by [`send`](Self::send).
    pub fn with_transport(mut self, transport: Arc<dyn GatewayTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Merchant configuration.
    pub fn config(&self) -> &MerchantConfig {
        &self.config
    }

    /// Signer holding the merchant secret.
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// See [`RequestBuilder::build_payment_request`].
    #[tracing::instrument(skip(self, params, payment), fields(token = %payment.token, %mode))]
    pub fn build_payment_request(
        &self,
        params: &Fields,
        payment: &PaymentRecord,
        mode: PaymentMode,
    ) -> Result<Fields> {
        let fields = self.builder.build_payment_request(params, payment, mode)?;
        tracing::debug!(field_count = fields.len(), "built payment request");
        Ok(fields)
    }

    /// See [`RequestBuilder::build_refund_request`].
    #[tracing::instrument(skip_all, fields(operator = %operator))]
    pub fn build_refund_request(&self, logged: &Fields, operator: &str, password: &str) -> Fields {
        self.builder.build_refund_request(logged, operator, password)
    }

    /// Sort, sign and render fields as a redirect request.
    pub fn render(&self, fields: &Fields) -> SignedRequest {
        self.signer.render(fields)
    }

    /// Redirect URL for a field set, signed when a secret is configured.
    pub fn payment_url(&self, fields: &Fields) -> String {
        self.render(fields).url
    }

    /// POST fields to the configured gateway endpoint.
    ///
    /// Transport failures, HTML error pages and unparseable bodies are
    /// returned inside the exchange with no parsed response, so the raw reply
    /// is always available for investigation. The caller decides whether to
    /// retry; a retry must build a new request so it gets a new attempt number.
    ///
    /// # Errors
    ///
    /// [`CommwebError::MissingCollaborator`] if no transport is set.
    #[tracing::instrument(skip_all, fields(url = %self.config.gateway_url))]
    pub async fn send(&self, fields: &Fields) -> Result<GatewayExchange> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(CommwebError::MissingCollaborator("gateway transport"))?;

        let url = self.config.gateway_url.clone();
        let body = post_body(fields);
        let reply = transport.post_form(&url, &body).await;

        let mut exchange = GatewayExchange {
            url,
            post_body: body,
            raw_response: reply.body,
            message: String::new(),
            transport_error: reply.error,
            response: None,
            parse_error: None,
        };

        if is_html_page(&exchange.raw_response) {
            tracing::warn!("gateway returned an HTML page");
            exchange.message = exchange.raw_response.clone();
        } else if let Some(error) = &exchange.transport_error {
            tracing::warn!(%error, "gateway transport failed");
            exchange.message = error.to_string();
        } else {
            match parse_response(&exchange.raw_response) {
                Ok(response) => {
                    exchange.message = response.message.clone();
                    exchange.response = Some(response);
                }
                Err(error) => {
                    tracing::warn!(%error, "gateway reply could not be parsed");
                    exchange.message = error.to_string();
                    exchange.parse_error = Some(match error {
                        CommwebError::MalformedResponse { reason } => reason,
                        other => other.to_string(),
                    });
                }
            }
        }

        Ok(exchange)
    }

    /// Like [`send`](Self::send), but a missing response is an error.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) reports, plus
    /// [`CommwebError::MalformedResponse`] for an unparseable body and
    /// [`CommwebError::ConnectionTimeout`], [`CommwebError::ConnectionFailed`]
    /// or [`CommwebError::Transport`] when the transport failed.
    pub async fn send_for_response(&self, fields: &Fields) -> Result<GatewayResponse> {
        let exchange = self.send(fields).await?;
        if let Some(response) = exchange.response {
            return Ok(response);
        }
        if let Some(reason) = exchange.parse_error {
            return Err(CommwebError::malformed(reason));
        }

        Err(match exchange.transport_error {
            Some(error) => self.transport_failure(&exchange.url, error),
            None => CommwebError::Transport(format!(
                "gateway returned an HTML page ({} bytes)",
                exchange.raw_response.len()
            )),
        })
    }

    fn transport_failure(&self, url: &str, error: TransportError) -> CommwebError {
        match error.kind {
            TransportErrorKind::Timeout => CommwebError::ConnectionTimeout {
                operation: format!("POST {}", url),
                timeout_ms: self.config.timeout_secs.saturating_mul(1000),
            },
            TransportErrorKind::Connect => CommwebError::ConnectionFailed {
                target: url.to_string(),
                reason: error.message,
            },
            _ => CommwebError::Transport(error.to_string()),
        }
    }

    /// See [`parse_response`].
    pub fn parse_response(&self, raw_body: &str) -> Result<GatewayResponse> {
        parse_response(raw_body)
    }

    /// See [`ResponseInterpreter::verify_and_explain`].
    pub fn verify_and_explain(&self, fields: &Fields) -> ResponseOutcome {
        self.interpreter.verify_and_explain(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_config, FixedAttemptCounter, MockTransport};
    use crate::transport::TransportReply;
    use crate::CommwebErrorCode;

    fn gateway_with(reply: TransportReply) -> (PaymentGateway, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new(reply));
        let gateway = PaymentGateway::new(test_config())
            .unwrap()
            .with_attempt_counter(Arc::new(FixedAttemptCounter(1)))
            .with_transport(transport.clone());
        (gateway, transport)
    }

    #[test]
    fn test_malformed_secret_is_rejected_up_front() {
        let config = MerchantConfig::new("A", "M", "XYZ", "https://shop.example.com");
        let err = PaymentGateway::new(config).unwrap_err();
        assert_eq!(err.code(), CommwebErrorCode::InvalidSecret);
    }

    #[test]
    fn test_gateway_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PaymentGateway>();
    }

    #[tokio::test]
    async fn test_send_posts_body_to_gateway_url() {
        let (gateway, transport) = gateway_with(TransportReply::ok(
            "vpc_TxnResponseCode=2&vpc_Message=Declined",
        ));
        let fields: Fields = [("vpc_Command", "pay"), ("vpc_Amount", "2200")]
            .into_iter()
            .collect();

        let exchange = gateway.send(&fields).await.unwrap();

        assert_eq!(exchange.url, gateway.config().gateway_url);
        assert_eq!(exchange.post_body, "vpc_Command=pay&vpc_Amount=2200");
        assert_eq!(exchange.message, "Declined");
        assert_eq!(exchange.response.unwrap().response_code, "2");
        assert_eq!(
            transport.requests(),
            vec![(
                gateway.config().gateway_url.clone(),
                "vpc_Command=pay&vpc_Amount=2200".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_send_reports_html_pages_as_message() {
        let page = "<html><body>Service Unavailable</body></html>";
        let (gateway, _) = gateway_with(TransportReply::ok(page));

        let exchange = gateway.send(&Fields::new()).await.unwrap();
        assert!(!exchange.has_response());
        assert_eq!(exchange.message, page);
    }

    #[tokio::test]
    async fn test_send_reports_transport_errors_as_data() {
        let (gateway, _) = gateway_with(TransportReply::failed(TransportError::new(
            TransportErrorKind::Connect,
            "connection refused",
        )));

        let exchange = gateway.send(&Fields::new()).await.unwrap();
        assert!(!exchange.has_response());
        assert_eq!(
            exchange.transport_error.unwrap().kind,
            TransportErrorKind::Connect
        );
        assert!(exchange.message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_send_keeps_unparseable_reply() {
        let body = "vpc_TxnResponseCode=0&vpc_ReceiptNo=RC99&vpc_Amount=2200&garbage";
        let (gateway, _) = gateway_with(TransportReply::ok(body));
        let fields: Fields = [("vpc_Command", "pay")].into_iter().collect();

        let exchange = gateway.send(&fields).await.unwrap();

        assert!(!exchange.has_response());
        assert_eq!(exchange.raw_response, body);
        assert!(exchange.raw_response.contains("vpc_ReceiptNo=RC99"));
        assert_eq!(exchange.post_body, "vpc_Command=pay");
        assert!(exchange.parse_error.unwrap().contains("garbage"));
        assert!(exchange.transport_error.is_none());
    }

    #[tokio::test]
    async fn test_send_for_response_rejects_malformed_body() {
        let (gateway, _) = gateway_with(TransportReply::ok("not a form body"));
        let err = gateway.send_for_response(&Fields::new()).await.unwrap_err();
        assert_eq!(err.code(), CommwebErrorCode::MalformedResponse);
        assert!(err.is_protocol_violation());
    }

    #[tokio::test]
    async fn test_send_for_response_maps_transport_failures() {
        let (gateway, _) = gateway_with(TransportReply::failed(TransportError::new(
            TransportErrorKind::Timeout,
            "too slow",
        )));
        let err = gateway.send_for_response(&Fields::new()).await.unwrap_err();
        assert_eq!(err.code(), CommwebErrorCode::ConnectionTimeout);
        assert!(err.is_retryable());

        let (gateway, _) = gateway_with(TransportReply::failed(TransportError::new(
            TransportErrorKind::Connect,
            "connection refused",
        )));
        let err = gateway.send_for_response(&Fields::new()).await.unwrap_err();
        assert_eq!(err.code(), CommwebErrorCode::ConnectionFailed);

        let (gateway, _) = gateway_with(TransportReply::ok("<html>Bad Gateway</html>"));
        let err = gateway.send_for_response(&Fields::new()).await.unwrap_err();
        assert_eq!(err.code(), CommwebErrorCode::Transport);
    }

    #[tokio::test]
    async fn test_send_for_response_returns_parsed_reply() {
        let (gateway, _) = gateway_with(TransportReply::ok("vpc_TxnResponseCode=1"));
        let response = gateway.send_for_response(&Fields::new()).await.unwrap();
        assert_eq!(response.response_code, "1");
    }

    #[tokio::test]
    async fn test_send_without_transport() {
        let gateway = PaymentGateway::new(test_config()).unwrap();
        let err = gateway.send(&Fields::new()).await.unwrap_err();
        assert_eq!(err.code(), CommwebErrorCode::MissingCollaborator);
    }
}
