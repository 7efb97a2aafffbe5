//! Error types for the peer-connection layer

/// Result type alias using the peer-connection Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in peer-connection operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation invoked after the peer was torn down
    #[error("peer has been destroyed")]
    Destroyed,

    /// Second call to `destroy()` on the same peer
    #[error("peer has been destroyed already")]
    AlreadyDestroyed,

    /// Signaling payload was malformed or carried an unrecognized type
    #[error("invalid signaling data received: {0}")]
    InvalidSignal(String),

    /// `replace_track` referenced a track id with no recorded sender
    #[error("sender for track not found: {0}")]
    SenderNotFound(String),

    /// Local offer creation or application failed; reported via the `error` event
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// Underlying transport reported a failed connection; terminal, no retry
    #[error("rtc connection failed")]
    ConnectionFailed,

    /// Error surfaced by the underlying connection resource
    #[error("transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means the peer instance is unusable
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Error::Destroyed | Error::AlreadyDestroyed)
    }
}
