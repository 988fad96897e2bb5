//! Error taxonomy shared by the dialogue engine and its collaborators.
//!
//! Every fallible operation in the core returns [`Result`]. Errors are
//! never swallowed below the request boundary: the app crate's handler
//! decides what each variant means for the caller (client error, generic
//! internal error) and what gets logged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the dialogue engine, registry, and collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input at the request boundary. Reported to
    /// the caller as a client error, never retried.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The classifier or a stored conversation referenced an intent that
    /// is not in the registry. Fatal to the current turn.
    #[error("unknown intent: {0}")]
    UnknownIntent(String),

    /// A collaborator call (classifier, generator, store) failed —
    /// network, auth, quota, or serialization. Caught and logged at the
    /// request boundary; the core never retries.
    #[error("{service} unavailable: {message}")]
    Collaborator { service: String, message: String },
}

impl Error {
    /// Wrap a collaborator failure with the name of the failing service.
    pub fn collaborator(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Returns `true` for errors the caller could have avoided (4xx-like).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }
}
