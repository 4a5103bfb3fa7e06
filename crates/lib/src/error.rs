//! Send failures, tagged by cause so callers can tell a missing thread from a bad credential.

/// Why an outbound message was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The conversation or thread does not exist (or is unknown to the channel).
    #[error("conversation not found: {0}")]
    NotFound(String),
    /// Token acquisition failed, the service rejected our credentials, or the service URL is not trusted.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Connect, timeout, or other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Anything else (unexpected status, malformed response).
    #[error("send failed: {0}")]
    Unknown(String),
}

impl SendError {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SendError::NotFound(_) => "not_found",
            SendError::Unauthorized(_) => "unauthorized",
            SendError::Transport(_) => "transport",
            SendError::Unknown(_) => "unknown",
        }
    }
}

impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            SendError::Transport(e.to_string())
        } else {
            SendError::Unknown(e.to_string())
        }
    }
}
