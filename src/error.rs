//! Error taxonomy for querykit.
//!
//! Backend failures are classified into a [`ServerError`] carrying a stable
//! SQLSTATE-like code and a severity tag. Codes are opaque to the client and
//! compared for equality only; callers branch on the code, never on message
//! text.

use thiserror::Error;

use crate::paramstyle::ParamStyle;
use crate::transport::{BackendError, TransportError};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the cursor/connection API.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing parameters for the active parameter style.
    /// Raised synchronously before anything touches the transport.
    #[error("parameter translation failed: {0}")]
    Translation(#[from] TranslationError),

    /// Classified backend failure.
    #[error(transparent)]
    Server(ServerError),

    /// Operation attempted on a closed connection.
    #[error("connection is closed")]
    ConnectionClosed,

    /// Operation attempted on a closed cursor.
    #[error("cursor is closed")]
    CursorClosed,

    /// Caller misuse: invalid calendar fields, zero arraysize, or a
    /// non-positive fetch count under the strict policy.
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O failure on the transport. The connection is unusable afterwards.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The backend error code, if this is a classified server error.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Server(e) => Some(&e.code),
            _ => None,
        }
    }
}

/// Parameter translation failures. These never consume transport state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// The statement references more positional placeholders than values
    /// were supplied.
    #[error("statement references more parameters than the {supplied} supplied")]
    TooFewParameters { supplied: usize },

    /// Positional styles require every supplied value to be consumed.
    #[error("statement uses {used} of {supplied} positional parameters")]
    UnusedParameters { used: usize, supplied: usize },

    /// A named placeholder has no entry in the parameter mapping.
    #[error("missing parameter `{0}`")]
    MissingParameter(String),

    /// A numeric placeholder index is zero or past the end of the sequence.
    #[error("placeholder :{index} out of range (have {supplied} parameters)")]
    IndexOutOfRange { index: usize, supplied: usize },

    /// The style takes an ordered sequence but a mapping was supplied.
    #[error("{0} placeholders take a parameter sequence, not a mapping")]
    ExpectedSequence(ParamStyle),

    /// The style takes a mapping but an ordered sequence was supplied.
    #[error("{0} placeholders take a parameter mapping, not a sequence")]
    ExpectedMapping(ParamStyle),

    /// Placeholder syntax the active style cannot parse.
    #[error("malformed placeholder: {0}")]
    Malformed(String),
}

// ============================================================================
// Backend Error Classification
// ============================================================================

/// Severity of a classified backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The statement failed; the open transaction (if any) is aborted and
    /// must be rolled back, after which the connection is usable again.
    Recoverable,
    /// The session is gone; the connection cannot be reused.
    Fatal,
}

/// A backend failure with a stable machine-readable code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct ServerError {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

impl ServerError {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Map a raw backend error payload into a typed [`ServerError`].
///
/// Severity strings follow the backend convention: `FATAL` and `PANIC` end
/// the session, everything else aborts the statement (and transaction) but
/// leaves the session alive. Connectivity-class codes (`08***`) are fatal
/// regardless of the reported severity string.
pub fn classify(raw: &BackendError) -> ServerError {
    let severity = match raw.severity.as_str() {
        "FATAL" | "PANIC" => Severity::Fatal,
        _ if raw.code.starts_with("08") => Severity::Fatal,
        _ => Severity::Recoverable,
    };

    ServerError {
        severity,
        code: raw.code.clone(),
        message: raw.message.clone(),
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Backend(raw) => Error::Server(classify(&raw)),
            TransportError::Io(e) => Error::Io(e),
        }
    }
}

/// Stable backend error codes, compared for equality only.
pub mod sqlstate {
    pub const CONNECTION_DOES_NOT_EXIST: &str = "08003";
    pub const CONNECTION_FAILURE: &str = "08006";
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const ACTIVE_SQL_TRANSACTION: &str = "25001";
    pub const IN_FAILED_SQL_TRANSACTION: &str = "25P02";
    pub const SYNTAX_ERROR: &str = "42601";
    pub const UNDEFINED_TABLE: &str = "42P01";
    pub const ADMIN_SHUTDOWN: &str = "57P01";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(severity: &str, code: &str) -> BackendError {
        BackendError {
            severity: severity.to_string(),
            code: code.to_string(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn error_severity_is_recoverable() {
        let err = classify(&raw("ERROR", sqlstate::UNDEFINED_TABLE));
        assert_eq!(err.severity, Severity::Recoverable);
        assert_eq!(err.code, "42P01");
        assert!(!err.is_fatal());
    }

    #[test]
    fn fatal_severity_string() {
        assert!(classify(&raw("FATAL", sqlstate::ADMIN_SHUTDOWN)).is_fatal());
        assert!(classify(&raw("PANIC", "XX000")).is_fatal());
    }

    #[test]
    fn connectivity_class_is_fatal() {
        // Severity string says ERROR, but an 08-class code means the session
        // is not coming back.
        assert!(classify(&raw("ERROR", sqlstate::CONNECTION_FAILURE)).is_fatal());
    }

    #[test]
    fn codes_distinguish_failure_kinds() {
        let missing_table = classify(&raw("ERROR", sqlstate::UNDEFINED_TABLE));
        let constraint = classify(&raw("ERROR", sqlstate::UNIQUE_VIOLATION));
        let connectivity = classify(&raw("ERROR", sqlstate::CONNECTION_FAILURE));

        assert_ne!(missing_table.code, constraint.code);
        assert_ne!(missing_table.code, connectivity.code);
    }
}
