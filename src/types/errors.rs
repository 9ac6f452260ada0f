//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. The text of an error ends up verbatim in
//! the `Tool execution failed: …` envelope, so variants keep their wording
//! short and readable by a language model.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC: invalid JSON received.
pub const RPC_PARSE_ERROR: i32 = -32700;
/// JSON-RPC: request object is not valid.
pub const RPC_INVALID_REQUEST: i32 = -32600;
/// JSON-RPC: method does not exist.
pub const RPC_METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC: invalid method parameters.
pub const RPC_INVALID_PARAMS: i32 = -32602;
/// JSON-RPC: internal error.
pub const RPC_INTERNAL_ERROR: i32 = -32603;

/// Main error enum for the tool server.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied input is malformed or out of range.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found locally (unknown method, unknown code).
    #[error("not found: {0}")]
    NotFound(String),

    /// No usable session with the backend.
    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    /// The backend answered, but with an error status or `success: false`.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The backend could not be reached or the exchange broke mid-way.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend did not answer within the configured timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal errors (handler panics, invariant violations).
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status reported by the backend, if this error came from it.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Unauthenticated(_) => Some(401),
            _ => None,
        }
    }

    /// True when the backend rejected the session token.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// True when the backend reported a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_)) || self.status() == Some(404)
    }

    /// Convert to a JSON-RPC error code.
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Error::Validation(_) => RPC_INVALID_PARAMS,
            Error::NotFound(_) => RPC_METHOD_NOT_FOUND,
            Error::Serialization(_) => RPC_PARSE_ERROR,
            Error::Unauthenticated(_)
            | Error::Api { .. }
            | Error::Transport(_)
            | Error::Timeout(_)
            | Error::Config(_)
            | Error::Internal(_)
            | Error::Io(_) => RPC_INTERNAL_ERROR,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: msg.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::timeout(err.to_string())
        } else if err.is_decode() {
            Error::transport(format!("unreadable response body: {}", err))
        } else if let Some(status) = err.status() {
            Error::api(status.as_u16(), err.to_string())
        } else {
            Error::transport(err.to_string())
        }
    }
}
