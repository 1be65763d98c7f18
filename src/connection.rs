//! Connection state and statement serialization.
//!
//! A `Connection` owns exactly one transport. Any number of cursors may be
//! open against it, from any number of tasks, but every `execute` funnels
//! through one async mutex around the transport: a second statement cannot
//! be sent until the previous response has been fully drained into its
//! cursor's buffer. Fetches never take this lock.
//!
//! Transaction state (`autocommit`, status) is connection-wide and mutated
//! only by execute, commit, rollback and the autocommit setter — never by a
//! cursor directly. Status transitions happen while the transport lock is
//! held, so the wire and the recorded state cannot disagree.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::buffer::ResultBuffer;
use crate::cursor::Cursor;
use crate::error::{classify, Error, Result};
use crate::paramstyle::{default_paramstyle, translate, ParamStyle, Params};
use crate::transport::{Response, Transport, TransportError};
use crate::value::SqlValue;

// ============================================================================
// Configuration
// ============================================================================

/// Policy for `fetch_many` called with a non-positive count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonPositiveFetch {
    /// Return an empty row set.
    #[default]
    Empty,
    /// Raise a usage error.
    Error,
}

/// Connection configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parameter style for this connection. `None` falls back to the
    /// process-wide default, read at execute time.
    pub paramstyle: Option<ParamStyle>,
    /// Start in autocommit mode.
    pub autocommit: bool,
    /// What `fetch_many(Some(n))` does for `n <= 0`.
    pub nonpositive_fetch: NonPositiveFetch,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the parameter style instead of reading the process default.
    pub fn paramstyle(mut self, style: ParamStyle) -> Self {
        self.paramstyle = Some(style);
        self
    }

    /// Start in autocommit mode.
    pub fn autocommit(mut self, on: bool) -> Self {
        self.autocommit = on;
        self
    }

    /// Set the non-positive fetch policy.
    pub fn nonpositive_fetch(mut self, policy: NonPositiveFetch) -> Self {
        self.nonpositive_fetch = policy;
        self
    }
}

// ============================================================================
// Transaction state
// ============================================================================

/// Transaction status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No transaction block open.
    Idle,
    /// Inside a transaction block.
    InTransaction,
    /// The backend aborted the transaction; it must be rolled back before
    /// further statements succeed.
    Failed,
}

#[derive(Debug)]
struct ConnState {
    autocommit: bool,
    status: TransactionStatus,
    closed: bool,
}

// ============================================================================
// Connection
// ============================================================================

/// Shared per-connection state. Cursors hold an `Arc` to this; none of them
/// caches any transport-level state of their own.
pub(crate) struct Shared {
    /// The serialization point: one statement in flight at a time.
    transport: AsyncMutex<Box<dyn Transport>>,
    state: Mutex<ConnState>,
    config: Config,
}

/// A connection to the backend. Cheap to clone; all clones share the same
/// transport and transaction state.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Wrap an established transport session.
    pub fn new(transport: impl Transport + 'static, config: Config) -> Self {
        let shared = Shared {
            transport: AsyncMutex::new(Box::new(transport)),
            state: Mutex::new(ConnState {
                autocommit: config.autocommit,
                status: TransactionStatus::Idle,
                closed: false,
            }),
            config,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Open a new cursor against this connection.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(Arc::clone(&self.shared))
    }

    pub fn autocommit(&self) -> bool {
        self.shared.state.lock().autocommit
    }

    /// Switch autocommit mode.
    ///
    /// Enabling autocommit while a transaction is open commits the pending
    /// transaction first, so no work is silently lost.
    pub async fn set_autocommit(&self, on: bool) -> Result<()> {
        if !on {
            self.shared.ensure_open()?;
            self.shared.state.lock().autocommit = false;
            return Ok(());
        }

        let mut transport = self.shared.transport.lock().await;
        self.shared.ensure_open()?;
        if self.shared.status() != TransactionStatus::Idle {
            debug!("committing pending transaction before enabling autocommit");
            self.shared
                .finish_transaction(transport.as_mut(), "COMMIT")
                .await?;
        }
        self.shared.state.lock().autocommit = true;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_status() != TransactionStatus::Idle
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.shared.status()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Commit the open transaction. No-op when no transaction is open.
    pub async fn commit(&self) -> Result<()> {
        self.finish("COMMIT").await
    }

    /// Roll back the open transaction. No-op when no transaction is open.
    ///
    /// After a backend error inside a transaction this is the only way to
    /// make the connection accept further statements.
    pub async fn rollback(&self) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&self, sql: &'static str) -> Result<()> {
        let mut transport = self.shared.transport.lock().await;
        self.shared.ensure_open()?;
        if self.shared.status() == TransactionStatus::Idle {
            return Ok(());
        }
        self.shared.finish_transaction(transport.as_mut(), sql).await
    }

    /// One-shot execute without a cursor, returning the affected-row count
    /// (or the number of rows a row-returning statement produced).
    pub async fn run(&self, sql: &str, params: impl Into<Params>) -> Result<u64> {
        let buffer = self.shared.execute_statement(sql, &params.into()).await?;
        Ok(buffer.rowcount().max(0) as u64)
    }

    /// Close the connection and tear down the transport.
    ///
    /// Every cursor created from this connection becomes invalid; idempotent.
    pub async fn close(&self) -> Result<()> {
        let mut transport = self.shared.transport.lock().await;
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.status = TransactionStatus::Idle;
        }
        debug!("closing connection");
        transport.close().await.map_err(Error::from)
    }
}

impl Shared {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.state.lock().closed {
            Err(Error::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn nonpositive_fetch(&self) -> NonPositiveFetch {
        self.config.nonpositive_fetch
    }

    fn status(&self) -> TransactionStatus {
        self.state.lock().status
    }

    /// Style resolution happens here, at execute time, so switching the
    /// process default affects only statements executed afterwards.
    fn style(&self) -> ParamStyle {
        self.config.paramstyle.unwrap_or_else(default_paramstyle)
    }

    /// Execute one statement and drain its response into a fresh buffer.
    pub(crate) async fn execute_statement(
        &self,
        sql: &str,
        params: &Params,
    ) -> Result<ResultBuffer> {
        self.ensure_open()?;
        // Translation happens before the lock; a translation error leaves
        // connection and transaction state untouched.
        let (canonical, values) = translate(sql, params, self.style())?;

        let mut transport = self.transport.lock().await;
        self.ensure_open()?;
        self.begin_if_needed(transport.as_mut()).await?;
        self.send(transport.as_mut(), &canonical, &values).await
    }

    /// Execute one statement once per parameter set, holding the transport
    /// for the whole batch. The returned buffer carries the summed count.
    pub(crate) async fn execute_batch(
        &self,
        sql: &str,
        param_sets: &[Params],
    ) -> Result<ResultBuffer> {
        self.ensure_open()?;
        let style = self.style();
        let translated: Vec<(String, Vec<SqlValue>)> = param_sets
            .iter()
            .map(|params| translate(sql, params, style))
            .collect::<std::result::Result<_, _>>()?;

        let mut transport = self.transport.lock().await;
        self.ensure_open()?;
        self.begin_if_needed(transport.as_mut()).await?;

        let mut total = 0u64;
        for (canonical, values) in &translated {
            let buffer = self.send(transport.as_mut(), canonical, values).await?;
            total += buffer.rowcount().max(0) as u64;
        }
        Ok(ResultBuffer::from_affected(total))
    }

    /// Implicitly open a transaction before the first statement when not in
    /// autocommit mode. Called with the transport lock held.
    async fn begin_if_needed(&self, transport: &mut dyn Transport) -> Result<()> {
        let needs_begin = {
            let state = self.state.lock();
            !state.autocommit && state.status == TransactionStatus::Idle
        };
        if !needs_begin {
            return Ok(());
        }
        debug!("implicit BEGIN");
        match transport.send_statement("BEGIN", &[]).await {
            Ok(_) => {
                self.state.lock().status = TransactionStatus::InTransaction;
                Ok(())
            }
            Err(e) => Err(self.statement_failed(transport, e).await),
        }
    }

    async fn send(
        &self,
        transport: &mut dyn Transport,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<ResultBuffer> {
        debug!(n_params = values.len(), "execute");
        match transport.send_statement(sql, values).await {
            Ok(Response::Rows { columns, rows }) => Ok(ResultBuffer::from_rows(columns, rows)),
            Ok(Response::Affected(count)) => Ok(ResultBuffer::from_affected(count)),
            Err(e) => Err(self.statement_failed(transport, e).await),
        }
    }

    /// Record the effect of a failed statement. The backend aborts an open
    /// transaction on error; the client never rolls back on its own. When
    /// the failure ends the session, the transport is torn down here, not
    /// left to drop.
    async fn statement_failed(&self, transport: &mut dyn Transport, e: TransportError) -> Error {
        let err = match e {
            TransportError::Backend(raw) => {
                let err = classify(&raw);
                let mut state = self.state.lock();
                if state.status == TransactionStatus::InTransaction {
                    state.status = TransactionStatus::Failed;
                }
                if err.is_fatal() {
                    state.closed = true;
                }
                warn!(code = %err.code, "statement failed");
                Error::Server(err)
            }
            TransportError::Io(e) => {
                // A broken pipe mid-statement leaves the session in an
                // unknown state; the connection cannot be reused.
                self.state.lock().closed = true;
                warn!("transport I/O failure: {e}");
                Error::Io(e)
            }
        };
        if self.state.lock().closed {
            if let Err(e) = transport.close().await {
                warn!("transport teardown failed: {e}");
            }
        }
        err
    }

    /// Send COMMIT or ROLLBACK and return the connection to idle. Called
    /// with the transport lock held and a transaction open.
    async fn finish_transaction(
        &self,
        transport: &mut dyn Transport,
        sql: &'static str,
    ) -> Result<()> {
        debug!(statement = sql, "finishing transaction");
        match transport.send_statement(sql, &[]).await {
            Ok(_) => {
                self.state.lock().status = TransactionStatus::Idle;
                Ok(())
            }
            Err(e) => Err(self.statement_failed(transport, e).await),
        }
    }
}
