//! Typed outcome of every call the session controller makes.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally; no request was sent.
    Validation,
    /// The server refused the token (401). Forces a logout.
    AuthRejected,
    /// Any other non-2xx answer.
    RequestFailed,
    /// Network failure or an unreadable response body.
    Transport,
    /// The credential store could not be read or written.
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct RequestError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn is_auth_rejected(&self) -> bool {
        self.kind == ErrorKind::AuthRejected
    }

    /// Message to show the user: the server's text when it sent one,
    /// otherwise the operation's fixed fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        match self.kind {
            ErrorKind::Transport => fallback.to_string(),
            _ if self.message.trim().is_empty() => fallback.to_string(),
            _ => self.message.clone(),
        }
    }
}

pub type RequestResult<T> = Result<T, RequestError>;
