//! CommWeb library.
//!
//! Client side of the CommWeb (MIGS) virtual payment client protocol. The
//! crate builds and signs payment and refund requests, talks to the gateway
//! through a pluggable transport, and authenticates and explains responses.
//!
//! Storage is left to the caller: payment attempts are counted through the
//! [`AttemptCounter`] trait and the HTTP exchange goes through
//! [`GatewayTransport`].
//!
//! # Features
//!
//! - **Request Building**: Payment (direct or redirect) and refund field sets
//! - **Signing**: HMAC-SHA256 over the canonical field string
//! - **Response Verification**: Signature check and response-code explanations
//! - **Transport Abstraction**: Trait-based design, with a reqwest implementation
//!   behind the `http-transport` feature
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use commweb_lib::{Fields, InMemoryAttemptCounter, MerchantConfig, PaymentGateway};
//! use commweb_lib::{PaymentMode, PaymentRecord};
//!
//! let config = MerchantConfig::new(
//!     "ACCESS01",
//!     "MERCHANT01",
//!     "0F1E2D3C4B5A69788796A5B4C3D2E1F0",
//!     "https://shop.example.com",
//! );
//! let gateway = PaymentGateway::new(config)?
//!     .with_attempt_counter(Arc::new(InMemoryAttemptCounter::new()));
//!
//! let payment = PaymentRecord::new("tok123", "PAY-1", 2.0, 10.00);
//! let fields = gateway.build_payment_request(&Fields::new(), &payment, PaymentMode::Redirect)?;
//! assert_eq!(fields.get("vpc_Amount"), Some("2200"));
//!
//! let url = gateway.payment_url(&fields);
//! assert!(url.starts_with("https://migs.mastercard.com.au/vpcpay?"));
//! # Ok::<(), commweb_lib::CommwebError>(())
//! ```

pub mod codes;
pub mod config;
pub mod counter;
pub mod errors;
pub mod fields;
pub mod gateway;
pub mod prelude;
pub mod request;
pub mod response;
pub mod signer;
pub mod transport;

/// Test utilities for gateway testing.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{config_from_env, ConfigWarning, MerchantConfig, SecureSecret};
pub use counter::{AttemptCounter, InMemoryAttemptCounter};
pub use errors::{CommwebError, CommwebErrorCode};
pub use fields::Fields;
pub use gateway::PaymentGateway;
pub use request::{Command, PaymentMode, PaymentRecord, RequestBuilder};
pub use response::{parse_response, GatewayResponse, ResponseInterpreter, ResponseOutcome};
pub use signer::{SignedRequest, Signer};
pub use transport::{
    GatewayExchange, GatewayTransport, HttpTransport, TransportError, TransportErrorKind,
    TransportReply,
};

/// Common result alias for CommWeb operations.
pub type Result<T> = std::result::Result<T, CommwebError>;
