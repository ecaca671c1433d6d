//! Transaction response codes (`vpc_TxnResponseCode`).

/// Response code for an approved transaction.
pub const SUCCESS: &str = "0";

/// Response code for a payment server system error.
///
/// Its `vpc_Message` usually names the rejected field.
pub const SYSTEM_ERROR: &str = "7";

/// Description used for codes missing from the table.
pub const UNKNOWN_DESCRIPTION: &str = "Unable to be determined";

/// Human readable description of a response code.
///
/// Never fails: unknown codes map to [`UNKNOWN_DESCRIPTION`].
///
/// # Example
///
/// ```
/// use commweb_lib::codes::describe;
///
/// assert_eq!(describe("2"), "Bank Declined Transaction");
/// assert_eq!(describe("Z"), "Unable to be determined");
/// ```
pub fn describe(code: &str) -> &'static str {
    match code {
        "0" => "Transaction Successful",
        "?" => "Transaction status is unknown",
        "1" => "Unknown Error",
        "2" => "Bank Declined Transaction",
        "3" => "No Reply from Bank",
        "4" => "Expired Card",
        "5" => "Insufficient funds",
        "6" => "Error Communicating with Bank",
        "7" => "Payment Server System Error",
        "8" => "Transaction Type Not Supported",
        "9" => "Bank declined transaction (Do not contact Bank)",
        "A" => "Transaction Aborted",
        "B" => "Transaction Declined",
        "C" => "Transaction Cancelled",
        "D" => "Deferred transaction has been received and is awaiting processing",
        "F" => "3D Secure Authentication failed",
        "I" => "Card Security Code verification failed",
        "L" => "Shopping Transaction Locked (Please try the transaction again later)",
        "N" => "Card security code is invalid or not matched",
        "P" => "Card security code not processed",
        "R" => "Transaction was not processed - Reached limit of retry attempts allowed",
        "S" => "Duplicate SessionID (OrderInfo)",
        "T" => "Address Verification Failed",
        "U" => "Card Issuer is not registered and/or certified",
        "V" => "Address Verification and Card Security Code Failed",
        _ => UNKNOWN_DESCRIPTION,
    }
}

/// Check whether a code is part of the gateway's published table.
pub fn is_known(code: &str) -> bool {
    describe(code) != UNKNOWN_DESCRIPTION
}
