//! Transport collaborator boundary.
//!
//! The driver core never touches wire bytes. It hands the transport one
//! canonical statement plus its ordered values and receives back a fully
//! drained response: either a row set with column metadata, or an
//! affected-row count, or an error payload. Connection setup, wire framing
//! and the value codec all live behind this trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::value::{Column, Row, SqlValue};

/// Fully drained backend response for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The statement returned rows.
    Rows { columns: Vec<Column>, rows: Vec<Row> },
    /// The statement returned no rows; the backend reported an
    /// affected-row count.
    Affected(u64),
}

/// Raw error payload reported by the backend, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{severity}: {message} ({code})")]
pub struct BackendError {
    pub severity: String,
    pub code: String,
    pub message: String,
}

/// Failures at the transport boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The backend processed the statement and reported an error.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The session broke mid-exchange.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single request/response session with the backend.
///
/// `send_statement` must not return until the response is fully drained;
/// the connection relies on that to guarantee only one statement is ever
/// outstanding on the session.
#[async_trait]
pub trait Transport: Send {
    /// Send one canonical statement and drain its complete response.
    async fn send_statement(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Response, TransportError>;

    /// Tear down the underlying session.
    async fn close(&mut self) -> Result<(), TransportError>;
}
