use thiserror::Error;

/// Error taxonomy for the access layer.
///
/// Callers can distinguish "the user said no" (`AuthDenied`), "the service is
/// degraded" (`RetriesExceeded`) and "the request was rejected" (`Http`)
/// without string matching.
#[derive(Debug, Error)]
pub enum Error {
    /// The identity provider refused to issue a credential: the user declined
    /// consent, or no grantable credential exists for a silent request.
    #[error("Authorization denied: {0}")]
    AuthDenied(String),

    /// The identity provider call itself failed (transport, misconfiguration).
    #[error("Identity provider unavailable: {0}")]
    AuthUnavailable(String),

    /// The mail service rejected the request for a non-retryable reason.
    #[error("Request failed {status}: {body}")]
    Http { status: u16, body: String },

    /// Transient failures persisted past the attempt budget.
    #[error("Exceeded {0} retries")]
    RetriesExceeded(u32),

    /// The HTTP call could not be sent or the connection dropped mid-flight.
    #[error("Network error: {0}")]
    Network(String),

    /// A 2xx response carried a body we could not parse.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The credential store failed to persist or delete a record.
    #[error("Credential store error: {0}")]
    Store(String),

    /// The service channel is gone (dispatcher stopped or never started).
    #[error("Service channel closed")]
    ChannelClosed,

    /// A boundary-layer timeout elapsed before the service responded.
    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

impl Error {
    /// Status code for `Http` errors, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
