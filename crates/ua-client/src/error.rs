//! Client error kinds
//!
//! Propagation rules: Decode and Security errors fault the secure channel;
//! Service errors are per-call and never poison it; Transport errors kill
//! the transport and cascade upward. Per-operation status codes inside a
//! successful response are data, not errors.

use ua_types::{EncodingError, StatusCode};

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The socket died, framing broke, or the server sent an Error message.
    #[error("transport: {0}")]
    Transport(String),

    /// A received payload did not decode.
    #[error("decode: {0}")]
    Decode(#[from] EncodingError),

    /// Signature verification, decryption or certificate handling failed.
    #[error("security: {0}")]
    Security(String),

    /// The response header carried a bad service result.
    #[error("service failed: {0}")]
    Service(StatusCode),

    /// An object was used outside its lifecycle, e.g. a session before
    /// activation.
    #[error("invalid state: {0}")]
    State(String),

    /// The operation missed its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl Error {
    /// `true` for the kinds that fault the secure channel.
    pub fn faults_channel(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::Security(_))
    }

    /// The service result when this is a service error.
    pub fn service_result(&self) -> Option<StatusCode> {
        match self {
            Error::Service(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_classification() {
        assert!(Error::Security("bad signature".into()).faults_channel());
        assert!(
            Error::Decode(EncodingError::Truncated {
                needed: 4,
                remaining: 0
            })
            .faults_channel()
        );
        assert!(!Error::Service(StatusCode::BAD_NODE_ID_UNKNOWN).faults_channel());
        assert!(!Error::Transport("closed".into()).faults_channel());
    }

    #[test]
    fn service_result_extraction() {
        let err = Error::Service(StatusCode::BAD_IDENTITY_TOKEN_INVALID);
        assert_eq!(
            err.service_result(),
            Some(StatusCode::BAD_IDENTITY_TOKEN_INVALID)
        );
        assert_eq!(Error::Transport("x".into()).service_result(), None);
    }
}
