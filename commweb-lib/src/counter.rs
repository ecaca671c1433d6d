//! Payment attempt counting.
//!
//! Each submission for a payment token gets a fresh attempt number so the
//! gateway never sees the same merchant transaction reference twice.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::{CommwebError, Result};

/// Source of per-token attempt numbers.
///
/// Implementations are usually backed by the caller's payment log. A failure
/// must be returned as an error: a payment is never built without a
/// trustworthy count.
pub trait AttemptCounter: Send + Sync {
    /// Number of the attempt being made for `payment_token`.
    fn count_attempts(&self, payment_token: &str) -> Result<u32>;
}

/// In-memory attempt counter.
///
/// Every call increments the count for the token, starting at 1. Counts are
/// lost when the process exits, so this is meant for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryAttemptCounter {
    attempts: RwLock<HashMap<String, u32>>,
}

fn lock_error(token: &str) -> CommwebError {
    CommwebError::AttemptCounter {
        token: token.to_string(),
        reason: "InMemoryAttemptCounter: lock poisoned".to_string(),
    }
}

impl InMemoryAttemptCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for a token without incrementing it.
    ///
    /// Returns 0 for unknown tokens or if the lock is poisoned.
    pub fn current(&self, payment_token: &str) -> u32 {
        self.attempts
            .read()
            .ok()
            .and_then(|attempts| attempts.get(payment_token).copied())
            .unwrap_or(0)
    }
}

impl AttemptCounter for InMemoryAttemptCounter {
    fn count_attempts(&self, payment_token: &str) -> Result<u32> {
        let mut attempts = self
            .attempts
            .write()
            .map_err(|_| lock_error(payment_token))?;
        let count = attempts.entry(payment_token.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}
