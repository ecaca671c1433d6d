//! Test fixtures and data generators.

use zeroize::Zeroizing;

use crate::fields::names;
use crate::response::ResponseInterpreter;
use crate::signer::{post_body, Signer};
use crate::{Fields, MerchantConfig};

/// Merchant secret used by every fixture, as hex.
pub const TEST_SECRET_HEX: &str = "0F1E2D3C4B5A69788796A5B4C3D2E1F0";

/// Collection of commonly used test fixtures.
pub struct TestFixtures;

impl TestFixtures {
    /// Merchant access code.
    pub const ACCESS_CODE: &'static str = "ACCESS01";

    /// Merchant id.
    pub const MERCHANT_ID: &'static str = "TESTMERCHANT01";

    /// Merchant site the customer returns to.
    pub const BASE_URL: &'static str = "https://shop.example.com";

    /// Card number groups accepted by the gateway test environment.
    pub const CARD_NUMBER_PARTS: [&'static str; 4] = ["5123", "4567", "8901", "2346"];

    /// Gateway messages seen with response code 7.
    pub const SYSTEM_ERROR_MESSAGES: &'static [&'static str] = &[
        "E5000: Cannot form a matching secure hash based on the merchant's request",
        "I5101: Invalid Field : CardExp",
        "Field Error: vpc_CardNum: Invalid CardNum",
    ];
}

/// Merchant configuration signing with [`TEST_SECRET_HEX`].
pub fn test_config() -> MerchantConfig {
    MerchantConfig::new(
        TestFixtures::ACCESS_CODE,
        TestFixtures::MERCHANT_ID,
        TEST_SECRET_HEX,
        TestFixtures::BASE_URL,
    )
}

/// Signer holding [`TEST_SECRET_HEX`].
pub fn test_signer() -> Signer {
    let key = hex::decode(TEST_SECRET_HEX).unwrap_or_default();
    Signer::new(Some(Zeroizing::new(key)))
}

/// Add the `vpc_SecureHash` the gateway would attach to these response fields.
pub fn sign_response_fields(fields: &mut Fields) {
    let canonical = ResponseInterpreter::canonical_response_string(fields);
    if let Some(signature) = test_signer().sign(&canonical) {
        fields.insert(names::SECURE_HASH, signature);
        fields.insert(names::SECURE_HASH_TYPE, "SHA256");
    }
}

/// Form-encoded body of a signed approval for `merch_txn_ref`.
pub fn approved_response(merch_txn_ref: &str) -> String {
    let mut fields: Fields = [
        ("vpc_TxnResponseCode", "0"),
        ("vpc_Message", "Approved"),
        ("vpc_MerchTxnRef", merch_txn_ref),
        ("vpc_Amount", "2200"),
        ("vpc_ReceiptNo", "123456789012"),
        ("vpc_TransactionNo", "2000001"),
        ("vpc_AuthorizeId", "000123"),
        ("vpc_BatchNo", "20261017"),
        ("vpc_Card", "MC"),
    ]
    .into_iter()
    .collect();
    fields.insert("vpc_Merchant", TestFixtures::MERCHANT_ID);
    sign_response_fields(&mut fields);
    post_body(&fields)
}
