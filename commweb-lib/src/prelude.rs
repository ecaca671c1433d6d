//! Prelude module for convenient imports.
//!
//! ```rust
//! use commweb_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - Configuration: `MerchantConfig`, `config_from_env`
//! - Error types: `CommwebError`, `CommwebErrorCode`, `Result`
//! - Requests: `Fields`, `PaymentRecord`, `PaymentMode`, `PaymentGateway`
//! - Collaborator traits: `AttemptCounter`, `GatewayTransport`

// Core types
pub use crate::{Fields, PaymentGateway, PaymentMode, PaymentRecord};

// Configuration
pub use crate::config::{config_from_env, MerchantConfig};

// Error handling
pub use crate::errors::{CommwebError, CommwebErrorCode};
pub use crate::Result;

// Collaborators
pub use crate::counter::{AttemptCounter, InMemoryAttemptCounter};
pub use crate::transport::{GatewayTransport, HttpTransport, TransportReply};

// Signing and verification
pub use crate::response::{GatewayResponse, ResponseOutcome};
pub use crate::signer::{SignedRequest, Signer};
