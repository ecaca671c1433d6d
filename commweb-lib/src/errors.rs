//! Error types for CommWeb operations.
//!
//! Only configuration problems, protocol violations and transport failures are
//! errors. Outcomes declared by the gateway (declines, expired cards, ...) are
//! returned as [`ResponseOutcome`](crate::ResponseOutcome) data instead.

/// Error codes for FFI and log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CommwebErrorCode {
    /// Feature not compiled in
    Unimplemented = 1000,
    /// Required collaborator was not supplied
    MissingCollaborator = 2000,
    /// Merchant secret is not valid hex
    InvalidSecret = 2001,
    /// Invalid merchant configuration
    InvalidConfig = 2002,
    /// Attempt counter could not produce a count
    AttemptCounter = 2003,
    /// Gateway response could not be parsed
    MalformedResponse = 3000,
    /// Gateway response signature does not match
    SignatureMismatch = 3001,
    /// Transport/network layer error
    Transport = 4000,
    /// Connection failed
    ConnectionFailed = 4001,
    /// Connection timeout
    ConnectionTimeout = 4002,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Errors raised by the CommWeb protocol engine.
#[derive(Debug, thiserror::Error)]
pub enum CommwebError {
    /// Feature not compiled in.
    #[error("{0} is not available in this build")]
    Unimplemented(&'static str),

    /// A collaborator the operation depends on was never configured.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// The merchant secret could not be decoded from hex.
    #[error("invalid merchant secret: {reason}")]
    InvalidSecret {
        /// Decoder failure
        reason: String,
    },

    /// Merchant configuration is unusable.
    #[error("invalid configuration {field}: {reason}")]
    InvalidConfig {
        /// Offending setting
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// The attempt counter failed for a payment token.
    #[error("attempt counter failed for payment {token}: {reason}")]
    AttemptCounter {
        /// Payment token that was being counted
        token: String,
        /// Underlying error message
        reason: String,
    },

    /// The gateway sent a body that is not a valid `key=value&...` string.
    #[error("malformed gateway response: {reason}")]
    MalformedResponse {
        /// What was wrong with the body
        reason: String,
    },

    /// The gateway response signature did not verify.
    #[error("gateway response signature mismatch for {merch_txn_ref}")]
    SignatureMismatch {
        /// Merchant transaction reference of the affected response
        merch_txn_ref: String,
    },

    /// Transport/network layer error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Connection failed.
    #[error("connection to {target} failed: {reason}")]
    ConnectionFailed {
        /// Target endpoint
        target: String,
        /// Underlying error message
        reason: String,
    },

    /// Connection timeout.
    #[error("{operation} timed out after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Operation that timed out
        operation: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Internal/unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommwebError {
    /// Get the error code for FFI/log correlation.
    pub fn code(&self) -> CommwebErrorCode {
        match self {
            Self::Unimplemented(_) => CommwebErrorCode::Unimplemented,
            Self::MissingCollaborator(_) => CommwebErrorCode::MissingCollaborator,
            Self::InvalidSecret { .. } => CommwebErrorCode::InvalidSecret,
            Self::InvalidConfig { .. } => CommwebErrorCode::InvalidConfig,
            Self::AttemptCounter { .. } => CommwebErrorCode::AttemptCounter,
            Self::MalformedResponse { .. } => CommwebErrorCode::MalformedResponse,
            Self::SignatureMismatch { .. } => CommwebErrorCode::SignatureMismatch,
            Self::Transport(_) => CommwebErrorCode::Transport,
            Self::ConnectionFailed { .. } => CommwebErrorCode::ConnectionFailed,
            Self::ConnectionTimeout { .. } => CommwebErrorCode::ConnectionTimeout,
            Self::Internal(_) => CommwebErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true for errors that must stop processing before any network call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCollaborator(_)
                | Self::InvalidSecret { .. }
                | Self::InvalidConfig { .. }
                | Self::AttemptCounter { .. }
        )
    }

    /// Returns true when the gateway broke the wire protocol or the signature.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse { .. } | Self::SignatureMismatch { .. }
        )
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// Signature mismatches are never retryable: they need manual investigation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ConnectionFailed { .. } | Self::ConnectionTimeout { .. }
        )
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed response error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }
}

impl From<hex::FromHexError> for CommwebError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidSecret {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = CommwebError::MissingCollaborator("attempt counter");
        assert_eq!(err.code(), CommwebErrorCode::MissingCollaborator);
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_categories_are_disjoint() {
        let mismatch = CommwebError::SignatureMismatch {
            merch_txn_ref: "tok123/1".to_string(),
        };
        assert!(mismatch.is_protocol_violation());
        assert!(!mismatch.is_configuration());
        assert!(!mismatch.is_retryable());

        let timeout = CommwebError::ConnectionTimeout {
            operation: "gateway POST".to_string(),
            timeout_ms: 30_000,
        };
        assert!(timeout.is_retryable());
        assert!(!timeout.is_protocol_violation());
    }

    #[test]
    fn test_error_display() {
        let err = CommwebError::malformed("pair without '=': abc");
        assert_eq!(
            err.to_string(),
            "malformed gateway response: pair without '=': abc"
        );

        let err = CommwebError::invalid_config("base_url", "must not be empty");
        assert_eq!(err.code(), CommwebErrorCode::InvalidConfig);
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_hex_error_conversion() {
        let err: CommwebError = hex::decode("zz").unwrap_err().into();
        assert_eq!(err.code(), CommwebErrorCode::InvalidSecret);
    }
}
