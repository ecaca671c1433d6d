//! Test utilities for the CommWeb client.
//!
//! This module provides:
//! - Merchant fixtures with a known secret
//! - Mock attempt counters and a recording transport
//! - Helpers that sign responses the way the gateway does
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use commweb_lib::test_utils::{approved_response, test_config, FixedAttemptCounter, MockTransport};
//! use commweb_lib::{PaymentGateway, TransportReply};
//!
//! let transport = Arc::new(MockTransport::new(TransportReply::ok(approved_response("tok/1"))));
//! let gateway = PaymentGateway::new(test_config())?
//!     .with_attempt_counter(Arc::new(FixedAttemptCounter(1)))
//!     .with_transport(transport.clone());
//! # Ok::<(), commweb_lib::CommwebError>(())
//! ```

mod fixtures;
mod mocks;

pub use fixtures::{
    approved_response, sign_response_fields, test_config, test_signer, TestFixtures,
    TEST_SECRET_HEX,
};

pub use mocks::{FailingAttemptCounter, FixedAttemptCounter, MockTransport};
