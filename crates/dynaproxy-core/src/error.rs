//! Error types for the dynaproxy core.

/// Core error type for dynaproxy infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// None of the candidate ports could be used.
    #[error("no listen port: all candidate ports {0:?} are in use")]
    NoListenPort(Vec<u16>),

    /// The listen port was already recorded for this process.
    #[error("listen port already set to {existing}, refusing to overwrite with {requested}")]
    ListenPortAlreadySet {
        /// The port recorded first.
        existing: u16,
        /// The port that was rejected.
        requested: u16,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
