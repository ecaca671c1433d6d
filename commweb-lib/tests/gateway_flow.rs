//! End-to-end payment flows against a mock gateway.
//!
//! Run with: `cargo test -p commweb-lib --test gateway_flow`

use std::sync::Arc;

use commweb_lib::test_utils::{
    approved_response, test_config, FailingAttemptCounter, FixedAttemptCounter, MockTransport,
    TestFixtures,
};
use commweb_lib::transport::{TransportError, TransportErrorKind};
use commweb_lib::{
    CommwebErrorCode, Fields, InMemoryAttemptCounter, PaymentGateway, PaymentMode, PaymentRecord,
    TransportReply,
};

fn card_params() -> Fields {
    let [one, two, three, four] = TestFixtures::CARD_NUMBER_PARTS;
    [
        ("cardNumOne", one),
        ("cardNumTwo", two),
        ("cardNumThree", three),
        ("cardNumFour", four),
        ("cardExpiryMonth", "05"),
        ("cardExpiryYear", "29"),
        ("vpc_CardSecurityCode", "123"),
    ]
    .into_iter()
    .collect()
}

fn payment() -> PaymentRecord {
    PaymentRecord::new("tok123", "PAY-1", 2.0, 10.00)
}

#[tokio::test]
async fn test_direct_payment_is_approved() {
    let transport = Arc::new(MockTransport::new(TransportReply::ok(approved_response(
        "tok123/1",
    ))));
    let gateway = PaymentGateway::new(test_config())
        .unwrap()
        .with_attempt_counter(Arc::new(InMemoryAttemptCounter::new()))
        .with_transport(transport.clone());

    let fields = gateway
        .build_payment_request(&card_params(), &payment(), PaymentMode::Direct)
        .unwrap();
    assert_eq!(fields.get("vpc_CardNum"), Some("5123456789012346"));
    assert_eq!(fields.get("vpc_CardExp"), Some("2905"));

    let exchange = gateway.send(&fields).await.unwrap();
    assert_eq!(transport.request_count(), 1);
    assert!(exchange.post_body.contains("vpc_MerchTxnRef=tok123%2F1"));
    assert!(exchange.post_body.contains("vpc_Amount=2200"));

    let response = exchange.response.unwrap();
    let outcome = gateway.verify_and_explain(&response.fields);
    assert!(outcome.success);
    assert!(outcome.error_text.is_empty());
    assert!(outcome.ensure_authentic("tok123/1").is_ok());
}

#[tokio::test]
async fn test_tampered_approval_is_rejected() {
    let body = approved_response("tok123/1").replace("vpc_Amount=2200", "vpc_Amount=1");
    let transport = Arc::new(MockTransport::new(TransportReply::ok(body)));
    let gateway = PaymentGateway::new(test_config())
        .unwrap()
        .with_attempt_counter(Arc::new(FixedAttemptCounter(1)))
        .with_transport(transport);

    let fields = gateway
        .build_payment_request(&card_params(), &payment(), PaymentMode::Direct)
        .unwrap();
    let exchange = gateway.send(&fields).await.unwrap();
    let outcome = gateway.verify_and_explain(&exchange.response.unwrap().fields);

    assert!(!outcome.success);
    assert!(outcome.is_tampered());
    let err = outcome.ensure_authentic("tok123/1").unwrap_err();
    assert_eq!(err.code(), CommwebErrorCode::SignatureMismatch);
}

#[tokio::test]
async fn test_decline_and_system_error_are_explained() {
    let transport = Arc::new(MockTransport::with_replies(vec![
        TransportReply::ok("vpc_TxnResponseCode=5&vpc_Message=Declined"),
        TransportReply::ok("vpc_TxnResponseCode=7&vpc_Message=I5101%3A+Invalid+Field+%3A+CardExp"),
    ]));
    let gateway = PaymentGateway::new(test_config())
        .unwrap()
        .with_attempt_counter(Arc::new(InMemoryAttemptCounter::new()))
        .with_transport(transport.clone());

    let first = gateway
        .build_payment_request(&card_params(), &payment(), PaymentMode::Direct)
        .unwrap();
    let exchange = gateway.send(&first).await.unwrap();
    let outcome = gateway.verify_and_explain(&exchange.response.unwrap().fields);
    assert_eq!(outcome.error_text, "Insufficient funds");
    assert_eq!(outcome.signature_valid, None);

    let retry = gateway
        .build_payment_request(&card_params(), &payment(), PaymentMode::Direct)
        .unwrap();
    assert_eq!(retry.get("vpc_MerchTxnRef"), Some("tok123/2"));

    let exchange = gateway.send(&retry).await.unwrap();
    let outcome = gateway.verify_and_explain(&exchange.response.unwrap().fields);
    assert_eq!(outcome.error_text, "Invalid Field Card Expiry Date");

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].1, requests[1].1);
}

#[tokio::test]
async fn test_transport_failure_leaves_no_response() {
    let transport = Arc::new(MockTransport::new(TransportReply::failed(
        TransportError::new(TransportErrorKind::Timeout, "gateway request timed out after 30s"),
    )));
    let gateway = PaymentGateway::new(test_config())
        .unwrap()
        .with_attempt_counter(Arc::new(FixedAttemptCounter(1)))
        .with_transport(transport);

    let fields = gateway
        .build_payment_request(&card_params(), &payment(), PaymentMode::Direct)
        .unwrap();
    let exchange = gateway.send(&fields).await.unwrap();

    assert!(!exchange.has_response());
    assert!(exchange.message.contains("timed out"));
}

#[test]
fn test_redirect_payment_url_is_signed() {
    let gateway = PaymentGateway::new(test_config())
        .unwrap()
        .with_attempt_counter(Arc::new(FixedAttemptCounter(3)));
    let params: Fields = [("type", "order"), ("id", "42")].into_iter().collect();

    let fields = gateway
        .build_payment_request(&params, &payment(), PaymentMode::Redirect)
        .unwrap();
    assert_eq!(
        fields.get("vpc_ReturnURL"),
        Some("https://shop.example.com/payment/common-wealth-receipt.html?type=order&id=42&token=tok123")
    );

    let request = gateway.render(&fields);
    assert!(request.is_signed());
    assert!(request.url.starts_with("https://migs.mastercard.com.au/vpcpay?"));
    assert!(request.url.contains("vpc_MerchTxnRef=tok123%2F3"));
    assert!(request.url.ends_with("&vpc_SecureHashType=SHA256"));
    assert!(!request.canonical_string.contains("virtualPaymentClientURL"));
}

#[test]
fn test_refund_request_is_built_from_log() {
    let gateway = PaymentGateway::new(test_config()).unwrap();
    let logged: Fields = [
        ("MerchTxnRef", "tok123/1"),
        ("TransactionNo", "2000001"),
        ("Amount", "2200"),
        ("ReceiptNo", "123456789012"),
    ]
    .into_iter()
    .collect();

    let fields = gateway.build_refund_request(&logged, "refund-user", "s3cret");

    assert_eq!(fields.get("vpc_Command"), Some("refund"));
    assert_eq!(fields.get("vpc_TransNo"), Some("2000001"));
    assert_eq!(fields.get("vpc_User"), Some("refund-user"));
    assert!(!fields.contains_key("vpc_ReceiptNo"));
}

#[test]
fn test_counter_failure_blocks_payment() {
    let gateway = PaymentGateway::new(test_config())
        .unwrap()
        .with_attempt_counter(Arc::new(FailingAttemptCounter));

    let err = gateway
        .build_payment_request(&card_params(), &payment(), PaymentMode::Direct)
        .unwrap_err();
    assert_eq!(err.code(), CommwebErrorCode::AttemptCounter);
}
