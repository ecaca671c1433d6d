//! Gateway response parsing, signature verification and error text.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::codes;
use crate::fields::names;
use crate::signer::{join_for_hash, Signer};
use crate::{CommwebError, Fields, Result};

/// Response fields covered by the gateway's signature.
pub const SIGNED_RESPONSE_FIELDS: &[&str] = &[
    "vpc_AVSRequestCode",
    "vpc_AVSResultCode",
    "vpc_AcqAVSRespCode",
    "vpc_AcqCSCRespCode",
    "vpc_AcqResponseCode",
    "vpc_Amount",
    "vpc_AuthorizeId",
    "vpc_BatchNo",
    "vpc_CSCResultCode",
    "vpc_Card",
    "vpc_Command",
    "vpc_Locale",
    "vpc_MerchTxnRef",
    "vpc_Merchant",
    "vpc_Message",
    "vpc_OrderInfo",
    "vpc_ReceiptNo",
    "vpc_TransactionNo",
    "vpc_TxnResponseCode",
    "vpc_Version",
];

/// Text shown when a successful response fails signature verification.
pub const INVALID_SIGNATURE_TEXT: &str =
    "Invalid Payment Gateway response signature. Please contact support";

/// A parsed gateway response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Body exactly as received.
    pub raw_body: String,
    /// Decoded fields, in the order received.
    pub fields: Fields,
    /// `vpc_Message`, empty when absent.
    pub message: String,
    /// `vpc_TxnResponseCode`, `"7"` when absent.
    pub response_code: String,
}

impl GatewayResponse {
    /// Check whether the gateway approved the transaction.
    ///
    /// This does not authenticate the response; see
    /// [`ResponseInterpreter::verify_and_explain`].
    pub fn is_approved(&self) -> bool {
        self.response_code == codes::SUCCESS
    }
}

/// Interpretation of a gateway response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOutcome {
    /// True only for an approved and authenticated transaction.
    pub success: bool,
    /// Text for the operator or customer; empty on success.
    pub error_text: String,
    /// Signature check result; `None` when no check applies (declines).
    pub signature_valid: Option<bool>,
    /// Response code the outcome was derived from.
    pub response_code: String,
    /// Table description of the response code.
    pub description: String,
}

impl ResponseOutcome {
    /// Check whether the response failed authentication.
    pub fn is_tampered(&self) -> bool {
        self.signature_valid == Some(false)
    }

    /// Turn a failed signature check into an error.
    ///
    /// Gateway declines are left as data.
    pub fn ensure_authentic(&self, merch_txn_ref: &str) -> Result<()> {
        if self.is_tampered() {
            return Err(CommwebError::SignatureMismatch {
                merch_txn_ref: merch_txn_ref.to_string(),
            });
        }
        Ok(())
    }
}

fn form_decode(input: &str) -> Result<String> {
    let spaced: Cow<'_, str> = if input.contains('+') {
        Cow::Owned(input.replace('+', " "))
    } else {
        Cow::Borrowed(input)
    };
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| CommwebError::malformed(format!("invalid UTF-8 in '{}': {}", input, e)))
}

/// Parse a `key=value&key=value` response body.
///
/// Keys and values are form-decoded. Surrounding whitespace and empty segments
/// (e.g. a trailing `&`) are ignored; a later duplicate key overwrites an
/// earlier one.
///
/// # Errors
///
/// [`CommwebError::MalformedResponse`] for an empty body, a pair without `=`,
/// or an escape that does not decode to UTF-8.
///
/// # Example
///
/// ```
/// use commweb_lib::response::parse_response;
///
/// let response = parse_response("vpc_TxnResponseCode=2&vpc_Message=Declined+by+bank")?;
/// assert_eq!(response.response_code, "2");
/// assert_eq!(response.message, "Declined by bank");
/// # Ok::<(), commweb_lib::CommwebError>(())
/// ```
pub fn parse_response(raw_body: &str) -> Result<GatewayResponse> {
    let body = raw_body.trim();
    if body.is_empty() {
        return Err(CommwebError::malformed("empty response body"));
    }

    let mut fields = Fields::new();
    for pair in body.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| CommwebError::malformed(format!("pair without '=': {}", pair)))?;
        fields.insert(form_decode(key)?, form_decode(value)?);
    }

    let message = fields.get(names::MESSAGE).unwrap_or("").to_string();
    let response_code = fields
        .get(names::TXN_RESPONSE_CODE)
        .unwrap_or(codes::SYSTEM_ERROR)
        .to_string();

    Ok(GatewayResponse {
        raw_body: raw_body.to_string(),
        fields,
        message,
        response_code,
    })
}

/// Turn a system error message into presentable text.
///
/// The gateway reports rejected fields as `"<prefix>: <detail>: ..."`. The
/// prefix is dropped when there is more than one segment, segments are trimmed
/// and joined with spaces, and field names are made readable. Falls back to
/// the description of code `7` when nothing is left.
///
/// ```
/// use commweb_lib::response::system_error_text;
///
/// assert_eq!(
///     system_error_text("E5000: Invalid CardExp"),
///     "Invalid Card Expiry Date"
/// );
/// assert_eq!(system_error_text(""), "Payment Server System Error");
/// ```
pub fn system_error_text(message: &str) -> String {
    let mut segments: Vec<&str> = message.split(':').collect();
    if segments.len() > 1 {
        segments.remove(0);
    }

    let text = segments
        .iter()
        .map(|segment| segment.trim())
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" CardNum", "")
        .replace("CardExp", "Card Expiry Date")
        .replace("CardSecurityCode", "Card Security Code");

    if text.is_empty() {
        codes::describe(codes::SYSTEM_ERROR).to_string()
    } else {
        text
    }
}

/// Authenticates and explains gateway responses.
#[derive(Clone, Debug)]
pub struct ResponseInterpreter {
    signer: Signer,
}

impl ResponseInterpreter {
    /// Create an interpreter that verifies with the given signer's secret.
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    /// Canonical string the gateway signs its response over.
    ///
    /// Only the signed response fields with non-empty values take part, in
    /// byte-wise key order.
    pub fn canonical_response_string(fields: &Fields) -> String {
        join_for_hash(
            fields
                .sorted()
                .iter()
                .filter(|(key, _)| SIGNED_RESPONSE_FIELDS.contains(key)),
        )
    }

    /// Decide whether a response confirms the payment and produce error text.
    ///
    /// - Code `0`: the signature is recomputed and compared with
    ///   `vpc_SecureHash`, ignoring hex case. A mismatch, a missing hash or a
    ///   missing secret suppresses success.
    /// - Code `7`: the gateway message is cleaned up by [`system_error_text`].
    /// - Anything else: the table description from [`codes::describe`].
    ///
    /// Never fails; a missing response code is treated as `7`.
    #[tracing::instrument(skip_all, fields(response_code = tracing::field::Empty))]
    pub fn verify_and_explain(&self, fields: &Fields) -> ResponseOutcome {
        let response_code = fields
            .get(names::TXN_RESPONSE_CODE)
            .unwrap_or(codes::SYSTEM_ERROR)
            .to_string();
        tracing::Span::current().record("response_code", response_code.as_str());
        let description = codes::describe(&response_code).to_string();

        if response_code == codes::SUCCESS {
            let canonical = Self::canonical_response_string(fields);
            let supplied = fields.get(names::SECURE_HASH).unwrap_or("");
            let valid = self.signer.verify(&canonical, supplied);

            if !valid {
                tracing::warn!(
                    merch_txn_ref = fields.get(names::MERCH_TXN_REF).unwrap_or(""),
                    has_secret = self.signer.has_secret(),
                    "gateway response signature mismatch"
                );
            }

            return ResponseOutcome {
                success: valid,
                error_text: if valid {
                    String::new()
                } else {
                    INVALID_SIGNATURE_TEXT.to_string()
                },
                signature_valid: Some(valid),
                response_code,
                description,
            };
        }

        let error_text = if response_code == codes::SYSTEM_ERROR {
            system_error_text(fields.get(names::MESSAGE).unwrap_or(""))
        } else {
            description.clone()
        };
        tracing::debug!(%error_text, "gateway declined transaction");

        ResponseOutcome {
            success: false,
            error_text,
            signature_valid: None,
            response_code,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestFixtures;
    use crate::CommwebErrorCode;
    use zeroize::Zeroizing;

    const SECRET_HEX: &str = "0F1E2D3C4B5A69788796A5B4C3D2E1F0";

    fn interpreter() -> ResponseInterpreter {
        let key = Zeroizing::new(hex::decode(SECRET_HEX).unwrap());
        ResponseInterpreter::new(Signer::new(Some(key)))
    }

    fn approved_fields() -> Fields {
        let mut fields: Fields = [
            ("vpc_TxnResponseCode", "0"),
            ("vpc_MerchTxnRef", "tok123/1"),
            ("vpc_Amount", "2200"),
            ("vpc_Message", "Approved"),
            ("vpc_ReceiptNo", "RC123"),
            ("vpc_AuthorizeId", ""),
            ("vpc_Unsigned", "not covered"),
        ]
        .into_iter()
        .collect();
        let canonical = ResponseInterpreter::canonical_response_string(&fields);
        let hash = interpreter().signer.sign(&canonical).unwrap();
        fields.insert(names::SECURE_HASH, hash);
        fields.insert(names::SECURE_HASH_TYPE, "SHA256");
        fields
    }

    #[test]
    fn test_parse_response_decodes_pairs() {
        let response =
            parse_response("vpc_Message=Invalid+CardExp%3A+bad&vpc_TxnResponseCode=7&vpc_Card=VC\n")
                .unwrap();

        assert_eq!(response.message, "Invalid CardExp: bad");
        assert_eq!(response.response_code, "7");
        assert_eq!(response.fields.get("vpc_Card"), Some("VC"));
        assert!(!response.is_approved());
    }

    #[test]
    fn test_parse_response_keeps_equals_in_values() {
        let response = parse_response("a=b=c&vpc_TxnResponseCode=0").unwrap();
        assert_eq!(response.fields.get("a"), Some("b=c"));
        assert!(response.is_approved());
    }

    #[test]
    fn test_parse_response_missing_code_defaults_to_system_error() {
        let response = parse_response("vpc_Message=oops").unwrap();
        assert_eq!(response.response_code, "7");
    }

    #[test]
    fn test_parse_response_rejects_malformed_pairs() {
        let err = parse_response("vpc_TxnResponseCode=0&garbage").unwrap_err();
        assert_eq!(err.code(), CommwebErrorCode::MalformedResponse);
        assert!(err.is_protocol_violation());

        assert!(parse_response("").is_err());
        assert!(parse_response("a=%FF").is_err());
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let outcome = interpreter().verify_and_explain(&approved_fields());

        assert!(outcome.success);
        assert_eq!(outcome.signature_valid, Some(true));
        assert!(outcome.error_text.is_empty());
        assert_eq!(outcome.description, "Transaction Successful");
        assert!(outcome.ensure_authentic("tok123/1").is_ok());
    }

    #[test]
    fn test_lower_case_signature_is_accepted() {
        let mut fields = approved_fields();
        let hash = fields.get(names::SECURE_HASH).unwrap().to_lowercase();
        fields.insert(names::SECURE_HASH, hash);

        assert!(interpreter().verify_and_explain(&fields).success);
    }

    #[test]
    fn test_tampered_field_is_rejected() {
        let mut fields = approved_fields();
        fields.insert("vpc_Amount", "1");

        let outcome = interpreter().verify_and_explain(&fields);
        assert!(!outcome.success);
        assert!(outcome.is_tampered());
        assert_eq!(outcome.error_text, INVALID_SIGNATURE_TEXT);

        let err = outcome.ensure_authentic("tok123/1").unwrap_err();
        assert_eq!(err.code(), CommwebErrorCode::SignatureMismatch);
    }

    #[test]
    fn test_unsigned_fields_do_not_affect_signature() {
        let mut fields = approved_fields();
        fields.insert("vpc_Unsigned", "changed");

        assert!(interpreter().verify_and_explain(&fields).success);
    }

    #[test]
    fn test_missing_hash_or_secret_fails_closed() {
        let mut fields = approved_fields();
        fields.remove(names::SECURE_HASH);
        assert!(interpreter().verify_and_explain(&fields).is_tampered());

        let outcome = ResponseInterpreter::new(Signer::new(None))
            .verify_and_explain(&approved_fields());
        assert!(!outcome.success);
        assert!(outcome.is_tampered());
    }

    #[test]
    fn test_declines_use_the_code_table() {
        let fields: Fields = [("vpc_TxnResponseCode", "4"), ("vpc_Message", "whatever")]
            .into_iter()
            .collect();

        let outcome = interpreter().verify_and_explain(&fields);
        assert!(!outcome.success);
        assert_eq!(outcome.signature_valid, None);
        assert_eq!(outcome.error_text, "Expired Card");
        assert!(outcome.ensure_authentic("x").is_ok());
    }

    #[test]
    fn test_unknown_code_uses_default_description() {
        let fields: Fields = [("vpc_TxnResponseCode", "Z")].into_iter().collect();
        let outcome = interpreter().verify_and_explain(&fields);
        assert_eq!(outcome.error_text, "Unable to be determined");
    }

    #[test]
    fn test_system_error_message_rules() {
        assert_eq!(
            system_error_text("Error: Invalid CardNum: bad format"),
            "Invalid bad format"
        );
        assert_eq!(
            system_error_text("E5000: Field CardSecurityCode is missing"),
            "Field Card Security Code is missing"
        );
        assert_eq!(system_error_text("  No prefix here "), "No prefix here");
        assert_eq!(system_error_text("Prefix only:"), "Payment Server System Error");
    }

    #[test]
    fn test_system_error_outcome() {
        let fields: Fields = [
            ("vpc_TxnResponseCode", "7"),
            ("vpc_Message", "I5154: Invalid CardExp value"),
        ]
        .into_iter()
        .collect();

        let outcome = interpreter().verify_and_explain(&fields);
        assert_eq!(outcome.error_text, "Invalid Card Expiry Date value");
        assert_eq!(outcome.description, "Payment Server System Error");

        let empty: Fields = [("vpc_Message", "")].into_iter().collect();
        let outcome = interpreter().verify_and_explain(&empty);
        assert_eq!(outcome.response_code, "7");
        assert_eq!(outcome.error_text, "Payment Server System Error");
    }

    #[test]
    fn test_system_error_text_for_gateway_messages() {
        let expected = [
            "Cannot form a matching secure hash based on the merchant's request",
            "Invalid Field Card Expiry Date",
            "vpc_CardNum Invalid",
        ];
        for (message, text) in TestFixtures::SYSTEM_ERROR_MESSAGES.iter().zip(expected) {
            assert_eq!(system_error_text(message), text);
        }
    }
}
