//! Request rejection and transport failure types.

use std::fmt;

use http::StatusCode;

/// Class of a locally generated rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyErrorKind {
    /// Malformed method, path, header, query argument, or request shape.
    BadRequest,
    /// No route matches the request path.
    NotFound,
    /// Local decode/encode failure, or a backend call that never produced
    /// a response.
    Internal,
}

impl ProxyErrorKind {
    /// HTTP status for this kind.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Name used in the `Error` field of the JSON error document.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::NotFound => "NotFound",
            Self::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ProxyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request rejected by the proxy before or after talking to the backend.
///
/// Every rejection produces exactly one error response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProxyError {
    /// Rejection class.
    pub kind: ProxyErrorKind,
    /// Human-readable reason.
    pub message: String,
}

impl ProxyError {
    /// Create a rejection of the given kind.
    #[must_use]
    pub fn new(kind: ProxyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 400 rejection.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::BadRequest, message)
    }

    /// 404 rejection.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::NotFound, message)
    }

    /// 500 rejection.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::Internal, message)
    }

    /// Rejection for a method the endpoint does not serve.
    #[must_use]
    pub fn method_not_supported(method: &http::Method, allowed: &str) -> Self {
        Self::bad_request(format!("method {method} not supported, expected {allowed}"))
    }
}

/// Failure that ends the connection without a response.
///
/// Returned as the hyper service error, which makes hyper drop the
/// connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request body was not fully read within the read deadline.
    #[error("request body not received within {0:?}")]
    ReadTimeout(std::time::Duration),

    /// The response was not ready within the write deadline.
    #[error("response not produced within {0:?}")]
    WriteTimeout(std::time::Duration),
}

/// Internal outcome of a handler that did not produce a response.
#[derive(Debug)]
pub(crate) enum HandlerError {
    Reject(ProxyError),
    Transport(TransportError),
}

impl From<ProxyError> for HandlerError {
    fn from(err: ProxyError) -> Self {
        Self::Reject(err)
    }
}

impl From<TransportError> for HandlerError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}
