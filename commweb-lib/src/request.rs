//! Request building for payments and refunds.
//!
//! The builder only selects and injects fields. Ordering, encoding and signing
//! happen in [`Signer`](crate::Signer).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MerchantConfig;
use crate::counter::AttemptCounter;
use crate::fields::names;
use crate::{CommwebError, Fields, Result};

/// Protocol version sent with every request.
pub const VPC_VERSION: &str = "1";

/// Locale sent with every request.
pub const VPC_LOCALE: &str = "en";

/// GST multiplier applied to the order total.
pub const TAX_MULTIPLIER: f64 = 1.1;

/// Path of the receipt page the customer returns to after a redirect payment.
pub const RETURN_PATH: &str = "/payment/common-wealth-receipt.html";

/// Caller fields copied into every payment request.
const PAYMENT_FIELDS: &[&str] = &[
    names::MERCH_TXN_REF,
    names::ORDER_INFO,
    names::AMOUNT,
    names::RETURN_URL,
    names::ACCESS_CODE,
    names::MERCHANT,
    names::VERSION,
    names::COMMAND,
    names::LOCALE,
];

/// Extra caller fields accepted for direct (card-present) payments.
const DIRECT_CARD_FIELDS: &[&str] = &[
    names::CARD_NUM,
    names::CARD_EXP,
    names::CARD_SECURITY_CODE,
];

/// Logged fields a refund is built from, without the `vpc_` prefix.
const REFUND_FIELDS: &[&str] = &["MerchTxnRef", "TransactionNo", "Amount"];

/// Caller sub-fields holding the four card number groups.
const CARD_NUMBER_PARTS: [&str; 4] = ["cardNumOne", "cardNumTwo", "cardNumThree", "cardNumFour"];

/// Caller sub-fields holding the expiry, year first.
const CARD_EXPIRY_PARTS: [&str; 2] = ["cardExpiryYear", "cardExpiryMonth"];

/// Gateway command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Authorise and capture a payment.
    Pay,
    /// Refund a captured payment.
    Refund,
}

impl Command {
    /// Wire value of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pay => "pay",
            Self::Refund => "refund",
        }
    }
}

/// How the card details reach the gateway.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    /// Card number and expiry are collected by the merchant and POSTed
    /// server-to-server.
    #[default]
    Direct,
    /// The customer is redirected to the gateway and comes back to a return URL.
    Redirect,
}

impl PaymentMode {
    /// Name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Redirect => "redirect",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = CommwebError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "direct" | "curl" => Ok(Self::Direct),
            "redirect" | "http" => Ok(Self::Redirect),
            other => Err(CommwebError::invalid_config(
                "payment mode",
                format!("unknown mode '{}'", other),
            )),
        }
    }
}

/// The payment being charged, as stored by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Payment token; also the stem of the merchant transaction reference.
    pub token: String,
    /// Caller's payment id, sent as order info.
    pub payment_id: String,
    /// Number of units.
    pub quantity: f64,
    /// Price of one unit, before tax, in dollars.
    pub unit_amount: f64,
}

impl PaymentRecord {
    /// Create a new payment record.
    pub fn new(
        token: impl Into<String>,
        payment_id: impl Into<String>,
        quantity: f64,
        unit_amount: f64,
    ) -> Self {
        Self {
            token: token.into(),
            payment_id: payment_id.into(),
            quantity,
            unit_amount,
        }
    }

    /// Total including tax, in cents.
    pub fn amount_in_cents(&self) -> i64 {
        amount_in_cents(self.quantity, self.unit_amount)
    }
}

/// Total including tax, in cents.
///
/// Rounds half away from zero.
///
/// ```
/// use commweb_lib::request::amount_in_cents;
///
/// assert_eq!(amount_in_cents(2.0, 10.00), 2200);
/// ```
pub fn amount_in_cents(quantity: f64, unit_amount: f64) -> i64 {
    (quantity * unit_amount * TAX_MULTIPLIER * 100.0).round() as i64
}

/// Merchant transaction reference for a given attempt.
pub fn merch_txn_ref(token: &str, attempt: u32) -> String {
    format!("{}/{}", token, attempt)
}

/// Assembles payment and refund field sets.
#[derive(Clone)]
pub struct RequestBuilder {
    access_code: String,
    merchant_id: String,
    base_url: String,
    client_entry_url: String,
    counter: Option<Arc<dyn AttemptCounter>>,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("access_code", &self.access_code)
            .field("merchant_id", &self.merchant_id)
            .field("base_url", &self.base_url)
            .field("has_counter", &self.counter.is_some())
            .finish()
    }
}

impl RequestBuilder {
    /// Create a builder for a merchant. No attempt counter is set.
    pub fn new(config: &MerchantConfig) -> Self {
        Self {
            access_code: config.access_code.clone(),
            merchant_id: config.merchant_id.clone(),
            base_url: config.base_url.clone(),
            client_entry_url: config.client_entry_url.clone(),
            counter: None,
        }
    }

    /// Set the attempt counter consulted for every payment request.
    pub fn with_attempt_counter(mut self, counter: Arc<dyn AttemptCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Build the field set for a payment authorisation.
    ///
    /// Caller fields outside the allow-list are dropped; merchant fields always
    /// win over caller-supplied ones.
    ///
    /// # Errors
    ///
    /// - [`CommwebError::MissingCollaborator`] if no attempt counter is set
    /// - [`CommwebError::AttemptCounter`] if the counter fails
    pub fn build_payment_request(
        &self,
        params: &Fields,
        payment: &PaymentRecord,
        mode: PaymentMode,
    ) -> Result<Fields> {
        let counter = self
            .counter
            .as_ref()
            .ok_or(CommwebError::MissingCollaborator("attempt counter"))?;

        let mut fields: Fields = params
            .non_empty()
            .filter(|(key, _)| is_accepted_payment_field(key, mode))
            .collect();

        self.insert_merchant_fields(&mut fields, Command::Pay);

        match mode {
            PaymentMode::Direct => {
                fields.insert(names::CARD_NUM, join_parts(params, &CARD_NUMBER_PARTS));
                fields.insert(names::CARD_EXP, join_parts(params, &CARD_EXPIRY_PARTS));
            }
            PaymentMode::Redirect => {
                fields.insert(names::RETURN_URL, self.return_url(params, &payment.token));
            }
        }

        let attempt = counter
            .count_attempts(&payment.token)
            .map_err(|e| match e {
                CommwebError::AttemptCounter { .. } => e,
                other => CommwebError::AttemptCounter {
                    token: payment.token.clone(),
                    reason: other.to_string(),
                },
            })?;
        tracing::debug!(token = %payment.token, attempt, "counted payment attempts");

        fields.insert(names::MERCH_TXN_REF, merch_txn_ref(&payment.token, attempt));
        fields.insert(names::ORDER_INFO, payment.payment_id.clone());
        fields.insert(names::AMOUNT, payment.amount_in_cents().to_string());

        Ok(fields)
    }

    /// Build the field set for refunding a logged transaction.
    ///
    /// `logged` holds the gateway log record of the original payment; its keys
    /// may carry the `vpc_` prefix or not. `operator` and `password` identify
    /// the user the gateway authorised for refunds.
    pub fn build_refund_request(&self, logged: &Fields, operator: &str, password: &str) -> Fields {
        let mut fields = Fields::new();
        self.insert_merchant_fields(&mut fields, Command::Refund);

        for (key, value) in logged.non_empty() {
            let name = key.strip_prefix("vpc_").unwrap_or(key);
            if !REFUND_FIELDS.contains(&name) {
                continue;
            }
            let wire_name = match name {
                "TransactionNo" => names::TRANS_NO.to_string(),
                other => format!("vpc_{}", other),
            };
            fields.insert(wire_name, value);
        }

        fields.insert(names::USER, operator);
        fields.insert(names::PASSWORD, password);
        fields
    }

    fn insert_merchant_fields(&self, fields: &mut Fields, command: Command) {
        fields.insert(names::ACCESS_CODE, self.access_code.clone());
        fields.insert(names::MERCHANT, self.merchant_id.clone());
        fields.insert(names::VERSION, VPC_VERSION);
        fields.insert(names::COMMAND, command.as_str());
        fields.insert(names::LOCALE, VPC_LOCALE);
        fields.insert(names::CLIENT_ENTRY_URL, self.client_entry_url.clone());
    }

    /// Receipt page URL the gateway sends the customer back to.
    fn return_url(&self, params: &Fields, token: &str) -> String {
        let mut url = format!(
            "{}{}?type={}",
            self.base_url,
            RETURN_PATH,
            present(params, "type").unwrap_or("")
        );
        for name in ["id", "update", "force"] {
            if let Some(value) = present(params, name) {
                url.push('&');
                url.push_str(name);
                url.push('=');
                url.push_str(value);
            }
        }
        url.push_str("&token=");
        url.push_str(token);
        url
    }
}

fn is_accepted_payment_field(key: &str, mode: PaymentMode) -> bool {
    PAYMENT_FIELDS.contains(&key)
        || (mode == PaymentMode::Direct && DIRECT_CARD_FIELDS.contains(&key))
}

/// Caller sub-field value, treating `""` and `"0"` as absent.
fn present<'a>(params: &'a Fields, name: &str) -> Option<&'a str> {
    params.get_non_empty(name).filter(|value| *value != "0")
}

fn join_parts(params: &Fields, parts: &[&str]) -> String {
    parts
        .iter()
        .filter_map(|part| present(params, part))
        .collect()
}
