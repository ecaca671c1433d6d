//! Ordered field sets exchanged with the gateway.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Gateway field names.
pub mod names {
    pub const ACCESS_CODE: &str = "vpc_AccessCode";
    pub const MERCHANT: &str = "vpc_Merchant";
    pub const VERSION: &str = "vpc_Version";
    pub const COMMAND: &str = "vpc_Command";
    pub const LOCALE: &str = "vpc_Locale";
    pub const MERCH_TXN_REF: &str = "vpc_MerchTxnRef";
    pub const ORDER_INFO: &str = "vpc_OrderInfo";
    pub const AMOUNT: &str = "vpc_Amount";
    pub const RETURN_URL: &str = "vpc_ReturnURL";
    pub const CARD_NUM: &str = "vpc_CardNum";
    pub const CARD_EXP: &str = "vpc_CardExp";
    pub const CARD_SECURITY_CODE: &str = "vpc_CardSecurityCode";
    pub const TRANSACTION_NO: &str = "vpc_TransactionNo";
    /// Refunds carry the original transaction number under this shorter name.
    pub const TRANS_NO: &str = "vpc_TransNo";
    pub const USER: &str = "vpc_User";
    pub const PASSWORD: &str = "vpc_Password";
    pub const SECURE_HASH: &str = "vpc_SecureHash";
    pub const SECURE_HASH_TYPE: &str = "vpc_SecureHashType";
    pub const TXN_RESPONSE_CODE: &str = "vpc_TxnResponseCode";
    pub const MESSAGE: &str = "vpc_Message";

    /// Rendered into the redirect URL but never part of the signed string.
    pub const CLIENT_ENTRY_URL: &str = "virtualPaymentClientURL";
}

/// Insertion-ordered mapping of gateway field names to values.
///
/// Overwriting an existing key keeps its original position, so a request built
/// from caller parameters and then patched with merchant fields serializes in a
/// stable order.
///
/// # Example
///
/// ```
/// use commweb_lib::Fields;
///
/// let mut fields = Fields::new();
/// fields.insert("vpc_OrderInfo", "order-1");
/// fields.insert("vpc_Amount", "2200");
/// fields.insert("vpc_OrderInfo", "order-2");
///
/// let keys: Vec<&str> = fields.keys().collect();
/// assert_eq!(keys, ["vpc_OrderInfo", "vpc_Amount"]);
/// assert_eq!(fields.get("vpc_OrderInfo"), Some("order-2"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(IndexMap<String, String>);

impl Fields {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert or overwrite a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Get a field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Get a field value, treating an empty string as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Remove a field, preserving the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    /// Check whether a field is present (even if empty).
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over pairs whose value is non-empty.
    pub fn non_empty(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(_, value)| !value.is_empty())
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields, including empty ones.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the field set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of this field set ordered by key, compared byte-wise.
    pub fn sorted(&self) -> Self {
        let mut sorted = self.0.clone();
        sorted.sort_keys();
        Self(sorted)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        fields.extend(iter);
        fields
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Fields {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for Fields {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
