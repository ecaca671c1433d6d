//! Canonical serialization and HMAC-SHA256 request signing.
//!
//! The gateway recomputes the signature from the fields it receives, so the
//! canonical string must be reproduced exactly:
//!
//! 1. fields sorted by key, byte-wise ascending
//! 2. empty values skipped
//! 3. the client-entry URL marker skipped
//! 4. `key=value` pairs joined with `&`, values not encoded
//!
//! The digest is keyed with the hex-decoded merchant secret and sent as
//! upper-case hex.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use url::form_urlencoded::byte_serialize;
use zeroize::Zeroizing;

use crate::config::{MerchantConfig, DEFAULT_CLIENT_ENTRY_URL};
use crate::fields::names;
use crate::{Fields, Result};

type HmacSha256 = Hmac<Sha256>;

/// Value of `vpc_SecureHashType` for HMAC-SHA256 signatures.
pub const SECURE_HASH_TYPE: &str = "SHA256";

/// A request ready to be sent to the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    /// Fields in canonical (sorted) order.
    pub fields: Fields,
    /// String the signature was computed over.
    pub canonical_string: String,
    /// Upper-case hex HMAC-SHA256, `None` when no secret is configured.
    pub signature: Option<String>,
    /// Redirect URL including the signature pair.
    pub url: String,
}

impl SignedRequest {
    /// Check whether the request carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// URL-encode a key or value as `application/x-www-form-urlencoded`.
pub fn form_encode(input: &str) -> String {
    byte_serialize(input.as_bytes()).collect()
}

/// Concatenate `key=value` pairs over non-empty fields, in the given order,
/// leaving out the client-entry URL marker.
pub(crate) fn join_for_hash<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .filter(|(key, value)| !value.is_empty() && *key != names::CLIENT_ENTRY_URL)
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical signing input for a field set.
///
/// Independent of the order the fields were inserted in.
pub fn canonical_string(fields: &Fields) -> String {
    join_for_hash(fields.sorted().iter())
}

/// Form-encoded POST body.
///
/// Unlike the redirect URL, the body keeps the fields in insertion order.
/// Empty values are omitted.
pub fn post_body(fields: &Fields) -> String {
    fields
        .non_empty()
        .map(|(key, value)| format!("{}={}", form_encode(key), form_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signs requests with the merchant secret.
#[derive(Clone)]
pub struct Signer {
    key: Option<Zeroizing<Vec<u8>>>,
    client_entry_url: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("signed", &self.key.is_some())
            .field("client_entry_url", &self.client_entry_url)
            .finish()
    }
}

impl Signer {
    /// Create a signer from raw key bytes. `None` produces unsigned requests.
    pub fn new(key: Option<Zeroizing<Vec<u8>>>) -> Self {
        Self {
            key,
            client_entry_url: DEFAULT_CLIENT_ENTRY_URL.to_string(),
        }
    }

    /// Create a signer for a merchant, decoding its secret.
    ///
    /// # Errors
    ///
    /// [`CommwebError::InvalidSecret`](crate::CommwebError::InvalidSecret) if the
    /// secret is not valid hex.
    pub fn from_config(config: &MerchantConfig) -> Result<Self> {
        Ok(Self::new(config.secret_key()?).with_client_entry_url(config.client_entry_url.clone()))
    }

    /// Set the redirect endpoint used when the fields carry no marker.
    pub fn with_client_entry_url(mut self, url: impl Into<String>) -> Self {
        self.client_entry_url = url.into();
        self
    }

    /// Check whether a secret is configured.
    pub fn has_secret(&self) -> bool {
        self.key.is_some()
    }

    /// HMAC-SHA256 of `message` as upper-case hex, `None` without a secret.
    pub fn sign(&self, message: &str) -> Option<String> {
        let key = self.key.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(key).ok()?;
        mac.update(message.as_bytes());
        Some(hex::encode_upper(mac.finalize().into_bytes()))
    }

    /// Check a hex signature over `message` in constant time.
    ///
    /// Hex case is ignored. Returns false without a secret or for input that is
    /// not hex.
    pub fn verify(&self, message: &str, signature_hex: &str) -> bool {
        let Some(key) = self.key.as_ref() else {
            return false;
        };
        let Ok(expected) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
            return false;
        };
        mac.update(message.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// Sort, sign and render a field set as a redirect URL.
    #[tracing::instrument(skip_all, fields(field_count = fields.len()))]
    pub fn render(&self, fields: &Fields) -> SignedRequest {
        let sorted = fields.sorted();

        let base = sorted
            .get_non_empty(names::CLIENT_ENTRY_URL)
            .unwrap_or(self.client_entry_url.as_str());
        let query = sorted
            .non_empty()
            .map(|(key, value)| format!("{}={}", form_encode(key), form_encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let mut url = format!("{}?{}", base, query);

        let canonical_string = join_for_hash(sorted.iter());
        let signature = self.sign(&canonical_string);

        match &signature {
            Some(hash) => {
                url.push_str(&format!(
                    "&{}={}&{}={}",
                    names::SECURE_HASH,
                    hash,
                    names::SECURE_HASH_TYPE,
                    SECURE_HASH_TYPE
                ));
            }
            None => tracing::warn!("rendering unsigned request, no secure secret configured"),
        }

        SignedRequest {
            fields: sorted,
            canonical_string,
            signature,
            url,
        }
    }
}
