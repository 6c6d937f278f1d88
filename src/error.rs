use std::path::PathBuf;

/// Failures reading or writing the cached OAuth token.
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    /// The file is missing or does not hold a token. Callers treat this as
    /// "not yet authorized".
    #[error("no usable token at {path}: {reason}")]
    NotFound { path: PathBuf, reason: String },

    #[error("failed to write token to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the Gmail API.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unauthorized ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Failures turning one envelope into a parsed message.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("message {0} has no payload")]
    MissingPayload(String),

    #[error("failed to decode {mime_type} body: {reason}")]
    Decode { mime_type: String, reason: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// A per-message failure, tagged with the id that produced it.
#[derive(Debug, thiserror::Error)]
#[error("message {id}: {source}")]
pub struct MessageError {
    pub id: String,
    #[source]
    pub source: ParseError,
}

/// Fatal errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid client credentials: {0}")]
    Config(String),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
