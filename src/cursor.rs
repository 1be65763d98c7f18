//! Cursors: execute → buffer → fetch.
//!
//! `execute` suspends on the connection's transport lock and returns only
//! after the whole response has been drained into a fresh, cursor-private
//! buffer. Every fetch after that reads purely from the buffer — it never
//! blocks and never touches the transport — which is why any number of
//! cursors on one connection can interleave execute/fetch loops freely.

use std::sync::Arc;

use crate::buffer::ResultBuffer;
use crate::connection::{NonPositiveFetch, Shared};
use crate::error::{Error, Result};
use crate::paramstyle::Params;
use crate::value::{Column, Row};

/// A cursor over one connection. Owns one result buffer at a time,
/// replaced (never merged) on each execute.
pub struct Cursor {
    shared: Arc<Shared>,
    buffer: ResultBuffer,
    arraysize: usize,
    closed: bool,
}

impl Cursor {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            buffer: ResultBuffer::unset(),
            arraysize: 1,
            closed: false,
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.closed {
            return Err(Error::CursorClosed);
        }
        self.shared.ensure_open()
    }

    /// Execute a statement, buffering its entire result.
    ///
    /// On failure the previous buffer is left untouched; on success it is
    /// replaced and `rowcount`/`description` reflect the new execution.
    pub async fn execute(&mut self, sql: &str, params: impl Into<Params>) -> Result<()> {
        self.ensure_usable()?;
        let params = params.into();
        let buffer = self.shared.execute_statement(sql, &params).await?;
        self.buffer = buffer;
        Ok(())
    }

    /// Execute the statement once per parameter set, under one continuous
    /// hold of the transport. `rowcount` afterwards is the summed count.
    pub async fn execute_many(&mut self, sql: &str, param_sets: &[Params]) -> Result<()> {
        self.ensure_usable()?;
        let buffer = self.shared.execute_batch(sql, param_sets).await?;
        self.buffer = buffer;
        Ok(())
    }

    /// Next unread row, or `None` once the buffer is exhausted. Never
    /// blocks: the buffer was fully populated by `execute`.
    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.ensure_usable()?;
        Ok(self.buffer.next_row())
    }

    /// Up to `size` rows (default: the arraysize in effect at call time).
    /// Returns fewer at the end of the buffer and an empty vec once
    /// exhausted. Non-positive sizes follow the connection policy.
    pub fn fetch_many(&mut self, size: Option<i64>) -> Result<Vec<Row>> {
        self.ensure_usable()?;
        let n = size.unwrap_or(self.arraysize as i64);
        if n <= 0 {
            return match self.shared.nonpositive_fetch() {
                NonPositiveFetch::Empty => Ok(Vec::new()),
                NonPositiveFetch::Error => {
                    Err(Error::Usage(format!("non-positive fetch count {n}")))
                }
            };
        }
        Ok(self.buffer.take_many(n as usize))
    }

    /// All remaining unread rows, possibly empty.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        self.ensure_usable()?;
        Ok(self.buffer.take_all())
    }

    /// Lazy, finite, non-restartable iteration over the remaining rows.
    /// Equivalent to repeated `fetch_one`; a second iteration over an
    /// exhausted cursor yields nothing.
    pub fn rows(&mut self) -> Rows<'_> {
        Rows { cursor: self }
    }

    /// Final row count of the last execution: rows returned for a
    /// row-returning statement, backend-reported affected rows otherwise,
    /// -1 before the first execute.
    pub fn rowcount(&self) -> i64 {
        self.buffer.rowcount()
    }

    /// Column metadata of the last execution; empty for statements that
    /// return no rows.
    pub fn description(&self) -> &[Column] {
        self.buffer.columns()
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    /// Change the default fetch size. Takes effect on the next
    /// `fetch_many(None)`; an in-flight fetch is never resized.
    pub fn set_arraysize(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(Error::Usage("arraysize must be positive".to_string()));
        }
        self.arraysize = n;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the buffer. The connection and its transport are untouched;
    /// idempotent, and safe mid-iteration.
    pub fn close(&mut self) {
        self.closed = true;
        self.buffer = ResultBuffer::unset();
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        // Buffer release must happen on every exit path.
        self.close();
    }
}

/// Iterator over a cursor's remaining buffered rows.
pub struct Rows<'a> {
    cursor: &'a mut Cursor,
}

impl Iterator for Rows<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        // Ends immediately when the cursor or its connection has been
        // closed, like every other cursor operation.
        if self.cursor.ensure_usable().is_err() {
            return None;
        }
        self.cursor.buffer.next_row()
    }
}

impl<'a> IntoIterator for &'a mut Cursor {
    type Item = Row;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Rows<'a> {
        self.rows()
    }
}
