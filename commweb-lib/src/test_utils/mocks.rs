//! Mock collaborators for exercising the gateway without a network.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::counter::AttemptCounter;
use crate::transport::{GatewayTransport, TransportReply};
use crate::{CommwebError, Result};

/// Attempt counter that always reports the same attempt.
#[derive(Clone, Copy, Debug)]
pub struct FixedAttemptCounter(pub u32);

impl AttemptCounter for FixedAttemptCounter {
    fn count_attempts(&self, _payment_token: &str) -> Result<u32> {
        Ok(self.0)
    }
}

/// Attempt counter whose backing store is unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingAttemptCounter;

impl AttemptCounter for FailingAttemptCounter {
    fn count_attempts(&self, payment_token: &str) -> Result<u32> {
        Err(CommwebError::AttemptCounter {
            token: payment_token.to_string(),
            reason: "payment log unavailable".to_string(),
        })
    }
}

/// Transport that records every request and answers with canned replies.
///
/// Replies are served in order; the last one repeats once the queue runs out.
#[derive(Debug)]
pub struct MockTransport {
    replies: Mutex<Vec<TransportReply>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    /// Create a transport that always answers with `reply`.
    pub fn new(reply: TransportReply) -> Self {
        Self::with_replies(vec![reply])
    }

    /// Create a transport answering with `replies` in order.
    pub fn with_replies(replies: Vec<TransportReply>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far as `(url, body)` pairs.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GatewayTransport for MockTransport {
    async fn post_form(&self, url: &str, body: &str) -> TransportReply {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), body.to_string()));

        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop().unwrap_or_default()
        } else {
            replies.last().cloned().unwrap_or_default()
        }
    }
}
