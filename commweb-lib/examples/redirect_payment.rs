//! Redirect Payment Example
//!
//! This example builds a hosted-page payment for a stored order, prints the
//! signed redirect URL, and then interprets the receipt the gateway sends the
//! customer back with.
//!
//! # Usage
//!
//! ```bash
//! export COMMWEB_ACCESS_CODE=ABCD1234
//! export COMMWEB_MERCHANT_ID=TESTMERCHANT01
//! export COMMWEB_SECURE_SECRET=0F1E2D3C4B5A69788796A5B4C3D2E1F0
//! export COMMWEB_BASE_URL=https://shop.example.com
//! cargo run --example redirect_payment
//! ```
//!
//! Without the environment a sandbox merchant is used.

use std::sync::Arc;

use commweb_lib::prelude::*;

fn sandbox_config() -> MerchantConfig {
    MerchantConfig::new(
        "ABCD1234",
        "TESTMERCHANT01",
        "0F1E2D3C4B5A69788796A5B4C3D2E1F0",
        "https://shop.example.com",
    )
}

fn main() -> Result<()> {
    let config = config_from_env().unwrap_or_else(sandbox_config);
    config.validate()?;

    let counter = Arc::new(InMemoryAttemptCounter::new());
    let gateway = PaymentGateway::new(config)?.with_attempt_counter(counter);

    println!("=== CommWeb Redirect Payment ===\n");

    let payment = PaymentRecord::new("a81f03c2", "ORDER-1001", 3.0, 24.95);
    let params: Fields = [("type", "order"), ("id", "1001")].into_iter().collect();

    let fields = gateway.build_payment_request(&params, &payment, PaymentMode::Redirect)?;
    let request = gateway.render(&fields);

    println!("Amount (cents, incl. GST): {}", payment.amount_in_cents());
    println!("Signed: {}", request.is_signed());
    println!("Redirect the customer to:\n  {}\n", request.url);

    // The gateway appends its response to the return URL; a decline looks like this.
    let receipt = "vpc_TxnResponseCode=4&vpc_Message=Expired+Card\
                   &vpc_MerchTxnRef=a81f03c2%2F1&vpc_Amount=8234";
    let response = gateway.parse_response(receipt)?;
    let outcome = gateway.verify_and_explain(&response.fields);

    println!("Response code: {}", outcome.response_code);
    println!("Approved: {}", outcome.success);
    if !outcome.success {
        println!("Reason: {}", outcome.error_text);
    }
    outcome.ensure_authentic(fields.get("vpc_MerchTxnRef").unwrap_or(""))?;

    Ok(())
}
