//! querykit — async database client core.
//!
//! This crate implements the statement execution and result-buffering core
//! of a database client:
//! - Rewrites parameterized SQL from five placeholder dialects into one
//!   canonical positional form ([`translate`], [`ParamStyle`]).
//! - Drives a single request/response transport from any number of cursors
//!   without interleaving their result sets ([`Connection`], [`Cursor`]).
//! - Buffers each execution's rows eagerly, so fetches never block and the
//!   row count is known the moment `execute` returns ([`ResultBuffer`]).
//! - Classifies backend failures into a typed taxonomy with stable codes
//!   ([`Error`], [`ServerError`]).
//!
//! Wire framing, authentication and the value codec live behind the
//! [`Transport`] trait; this crate never touches bytes.
//!
//! ```no_run
//! # use querykit::*;
//! # async fn demo(transport: impl Transport + 'static) -> Result<()> {
//! let conn = connect(transport);
//! let mut cur = conn.cursor();
//! cur.execute("SELECT f1, f2 FROM t1 WHERE f1 > %s", Params::positional([3]))
//!     .await?;
//! for row in &mut cur {
//!     println!("{row:?}");
//! }
//! conn.commit().await?;
//! # Ok(())
//! # }
//! ```

mod buffer;
mod connection;
mod cursor;
mod error;
mod paramstyle;
mod transport;
mod value;


pub use buffer::ResultBuffer;
pub use connection::{Config, Connection, NonPositiveFetch, TransactionStatus};
pub use cursor::{Cursor, Rows};
pub use error::{classify, sqlstate, Error, Result, ServerError, Severity, TranslationError};
pub use paramstyle::{
    default_paramstyle, set_default_paramstyle, translate, ParamStyle, Params,
};
pub use transport::{BackendError, Response, Transport, TransportError};
pub use value::{
    date, date_from_ticks, time, time_from_ticks, timestamp, timestamp_from_ticks, Binary,
    Column, JsonValue, Row, SqlValue,
};

/// Wrap an established transport session in a connection with default
/// configuration.
pub fn connect(transport: impl Transport + 'static) -> Connection {
    Connection::new(transport, Config::default())
}

/// Wrap an established transport session with explicit configuration.
pub fn connect_with(transport: impl Transport + 'static, config: Config) -> Connection {
    Connection::new(transport, config)
}
