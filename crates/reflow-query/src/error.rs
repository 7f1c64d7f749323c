//! Error taxonomy for remote calls.

/// Error type for query and mutation invocations.
///
/// The variants carry their retry classification: validation/permission
/// failures (4xx) are terminal and never retried, transport failures and
/// 5xx responses are transient and eligible for retry with backoff.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The backend rejected the call with an HTTP-shaped status.
    #[error("remote call failed with status {status}")]
    Remote {
        /// The status code reported by the backend.
        status: u16,
    },

    /// The call never reached the backend.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not complete in time.
    #[error("remote call timed out")]
    Timeout,

    /// The response arrived but did not match the expected shape.
    #[error("response decode error: {0}")]
    Decode(String),
}

impl QueryError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Remote { status } => (500..600).contains(status),
            Self::Network(_) | Self::Timeout => true,
            Self::Decode(_) => false,
        }
    }

    /// Whether the failure is final and must surface to the caller.
    pub fn is_terminal(&self) -> bool {
        !self.is_transient()
    }
}
