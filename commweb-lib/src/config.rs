//! Merchant configuration.
//!
//! # Environment Variables
//!
//! [`config_from_env`] reads:
//!
//! - `COMMWEB_ACCESS_CODE` - merchant access code (required)
//! - `COMMWEB_MERCHANT_ID` - merchant id (required)
//! - `COMMWEB_SECURE_SECRET` - hex-encoded shared secret (required, may be empty)
//! - `COMMWEB_BASE_URL` - base URL for return links (required)
//! - `COMMWEB_GATEWAY_URL` - POST endpoint override (optional)
//! - `COMMWEB_CLIENT_URL` - redirect endpoint override (optional)
//! - `COMMWEB_TIMEOUT` - transport timeout in seconds (optional, default: 30)

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{CommwebError, Result};

/// Default server-to-server endpoint for direct payments and refunds.
pub const DEFAULT_GATEWAY_URL: &str = "https://migs.mastercard.com.au/vpcdps";

/// Default client-entry endpoint for redirect payments.
pub const DEFAULT_CLIENT_ENTRY_URL: &str = "https://migs.mastercard.com.au/vpcpay";

/// Hex-encoded merchant secret.
///
/// Zeroized on drop and never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureSecret(String);

impl SecureSecret {
    /// Wrap a hex-encoded secret.
    pub fn new(hex_secret: impl Into<String>) -> Self {
        Self(hex_secret.into())
    }

    /// Check if no secret is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the secret into raw HMAC key bytes.
    ///
    /// Returns `Ok(None)` when no secret is configured.
    pub fn decode(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        if self.0.is_empty() {
            return Ok(None);
        }
        let key = hex::decode(&self.0)?;
        Ok(Some(Zeroizing::new(key)))
    }
}

impl fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SecureSecret(<empty>)")
        } else {
            f.write_str("SecureSecret(<redacted>)")
        }
    }
}

/// Non-fatal configuration findings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No secret is configured: requests go out unsigned and successful
    /// responses cannot be authenticated.
    UnsignedRequests,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsignedRequests => write!(
                f,
                "no secure secret configured, requests will be sent unsigned"
            ),
        }
    }
}

/// Merchant credentials and endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MerchantConfig {
    /// Merchant access code (`vpc_AccessCode`).
    pub access_code: String,

    /// Merchant id (`vpc_Merchant`).
    pub merchant_id: String,

    /// Hex-encoded shared secret for request and response signatures.
    #[serde(default)]
    pub secure_secret: SecureSecret,

    /// Base URL the return link is built on (e.g., `https://shop.example.com`).
    pub base_url: String,

    /// Endpoint direct payments and refunds are POSTed to.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Endpoint redirect payments send the customer to.
    #[serde(default = "default_client_entry_url")]
    pub client_entry_url: String,

    /// Request timeout in seconds, used by the HTTP transport.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_client_entry_url() -> String {
    DEFAULT_CLIENT_ENTRY_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl MerchantConfig {
    /// Create a new merchant configuration with the default endpoints.
    pub fn new(
        access_code: impl Into<String>,
        merchant_id: impl Into<String>,
        secure_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            access_code: access_code.into(),
            merchant_id: merchant_id.into(),
            secure_secret: SecureSecret::new(secure_secret),
            base_url: base_url.into(),
            gateway_url: default_gateway_url(),
            client_entry_url: default_client_entry_url(),
            timeout_secs: default_timeout(),
        }
    }

    /// Override the POST endpoint.
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    /// Override the redirect endpoint.
    pub fn with_client_entry_url(mut self, url: impl Into<String>) -> Self {
        self.client_entry_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Decode the merchant secret, failing on malformed hex.
    pub fn secret_key(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        self.secure_secret.decode()
    }

    /// Check the settings every request depends on.
    pub fn validate(&self) -> Result<()> {
        if self.access_code.is_empty() {
            return Err(CommwebError::invalid_config("access_code", "must not be empty"));
        }
        if self.merchant_id.is_empty() {
            return Err(CommwebError::invalid_config("merchant_id", "must not be empty"));
        }
        if self.gateway_url.is_empty() {
            return Err(CommwebError::invalid_config("gateway_url", "must not be empty"));
        }
        self.secret_key()?;
        Ok(())
    }

    /// Non-fatal findings about this configuration.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.secure_secret.is_empty() {
            warnings.push(ConfigWarning::UnsignedRequests);
        }
        warnings
    }
}

/// Load merchant configuration from environment variables.
///
/// Returns `None` if a required variable is missing. Unparseable optional
/// values are ignored.
///
/// # Example
///
/// ```bash
/// export COMMWEB_ACCESS_CODE=ABCD1234
/// export COMMWEB_MERCHANT_ID=TESTMERCHANT01
/// export COMMWEB_SECURE_SECRET=0F1E2D3C4B5A69788796A5B4C3D2E1F0
/// export COMMWEB_BASE_URL=https://shop.example.com
/// ```
pub fn config_from_env() -> Option<MerchantConfig> {
    let access_code = std::env::var("COMMWEB_ACCESS_CODE").ok()?;
    let merchant_id = std::env::var("COMMWEB_MERCHANT_ID").ok()?;
    let secret = std::env::var("COMMWEB_SECURE_SECRET").ok()?;
    let base_url = std::env::var("COMMWEB_BASE_URL").ok()?;

    let mut config = MerchantConfig::new(access_code, merchant_id, secret, base_url);

    if let Ok(url) = std::env::var("COMMWEB_GATEWAY_URL") {
        config = config.with_gateway_url(url);
    }

    if let Ok(url) = std::env::var("COMMWEB_CLIENT_URL") {
        config = config.with_client_entry_url(url);
    }

    if let Ok(timeout) = std::env::var("COMMWEB_TIMEOUT") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config = config.with_timeout(secs);
        }
    }

    Some(config)
}
