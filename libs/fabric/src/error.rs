use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Remote call failed with status {code}: {message}")]
    Remote { code: u16, message: String },

    #[error("Retry budget exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: usize, last: Box<Error> },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// The error that ended the final attempt, or `self` for errors that were
    /// not produced by a retry loop
    pub fn last_attempt(&self) -> &Error {
        match self {
            Error::RetryExhausted { last, .. } => last.last_attempt(),
            other => other,
        }
    }
}

/// Failures resolving or invoking a registered method
///
/// Every variant is reported to the caller as a 500 response whose message is
/// the variant's display text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("service: [{0}] not found")]
    ServiceNotFound(String),

    #[error("service: [{service}] method: [{method}] not found")]
    MethodNotFound { service: String, method: String },

    #[error("service: [{service}] method: [{method}] expects {expected} arguments, got {actual}")]
    ArityMismatch {
        service: String,
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("argument {index}: {source}")]
    BadArgument {
        index: usize,
        #[source]
        source: courier_core::Error,
    },

    /// Error returned by the handler itself, carried verbatim
    #[error("{0}")]
    Handler(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, Error>;
