use thiserror::Error;

/// Errors surfaced by the client runtime
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Failed to obtain identity token: {0}")]
    Token(String),

    /// The sync task has stopped; a fresh client and a manual refetch are needed
    #[error("Sync channel is disconnected")]
    Disconnected,
}

pub type ClientResult<T> = Result<T, ClientError>;
