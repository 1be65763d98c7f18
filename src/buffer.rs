//! Per-execution result buffering.
//!
//! A `ResultBuffer` is populated atomically at the end of `execute` — the
//! transport has fully drained the response before the buffer exists, so
//! fetch operations never block and never touch the transport. Rows are
//! immutable once buffered; only the read position advances.

use std::sync::Arc;

use crate::value::{Column, Row};

/// Fully materialized rows for one execution, plus a read cursor.
///
/// Invariant: `0 <= pos <= rows.len()`.
#[derive(Debug)]
pub struct ResultBuffer {
    columns: Arc<Vec<Column>>,
    rows: Vec<Row>,
    pos: usize,
    rowcount: i64,
}

impl ResultBuffer {
    /// Buffer for a cursor that has not executed anything yet.
    pub fn unset() -> Self {
        Self {
            columns: Arc::new(Vec::new()),
            rows: Vec::new(),
            pos: 0,
            rowcount: -1,
        }
    }

    /// Buffer a drained row set. The rowcount is known immediately.
    pub fn from_rows(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        let rowcount = rows.len() as i64;
        Self {
            columns: Arc::new(columns),
            rows,
            pos: 0,
            rowcount,
        }
    }

    /// Empty buffer for a statement that returned no rows, carrying the
    /// backend-reported affected-row count.
    pub fn from_affected(count: u64) -> Self {
        Self {
            columns: Arc::new(Vec::new()),
            rows: Vec::new(),
            pos: 0,
            rowcount: count as i64,
        }
    }

    /// Next unread row, advancing the read cursor by one.
    pub fn next_row(&mut self) -> Option<Row> {
        if self.pos < self.rows.len() {
            // Move the row out; it will never be read again.
            let row = std::mem::take(&mut self.rows[self.pos]);
            self.pos += 1;
            Some(row)
        } else {
            None
        }
    }

    /// Up to `n` unread rows; fewer at the end of the buffer, empty once
    /// exhausted.
    pub fn take_many(&mut self, n: usize) -> Vec<Row> {
        let end = self.pos.saturating_add(n).min(self.rows.len());
        let chunk: Vec<Row> = self.rows[self.pos..end].iter_mut().map(std::mem::take).collect();
        self.pos = end;
        chunk
    }

    /// All remaining unread rows.
    pub fn take_all(&mut self) -> Vec<Row> {
        self.take_many(self.rows.len() - self.pos)
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.pos
    }

    /// Final row count: rows returned for a row-returning statement,
    /// affected rows otherwise, -1 before the first execute.
    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SqlValue;
    use smallvec::smallvec;

    fn numbered(n: i64) -> ResultBuffer {
        let rows = (1..=n)
            .map(|i| smallvec![SqlValue::Int(i)] as Row)
            .collect();
        ResultBuffer::from_rows(vec![Column::new("f1", 23)], rows)
    }

    #[test]
    fn rowcount_known_immediately() {
        assert_eq!(numbered(5).rowcount(), 5);
        assert_eq!(ResultBuffer::from_affected(2).rowcount(), 2);
        assert_eq!(ResultBuffer::unset().rowcount(), -1);
    }

    #[test]
    fn next_row_advances_until_exhausted() {
        let mut buf = numbered(2);
        assert_eq!(buf.next_row().unwrap()[0], SqlValue::Int(1));
        assert_eq!(buf.next_row().unwrap()[0], SqlValue::Int(2));
        assert!(buf.next_row().is_none());
        assert!(buf.next_row().is_none());
    }

    #[test]
    fn take_many_partitions() {
        // 5 rows in chunks of 2: lengths 2, 2, 1, then 0.
        let mut buf = numbered(5);
        assert_eq!(buf.take_many(2).len(), 2);
        assert_eq!(buf.take_many(2).len(), 2);
        assert_eq!(buf.take_many(2).len(), 1);
        assert!(buf.take_many(2).is_empty());
    }

    #[test]
    fn take_all_drains_remaining() {
        let mut buf = numbered(5);
        buf.next_row();
        let rest = buf.take_all();
        assert_eq!(rest.len(), 4);
        assert_eq!(rest[0][0], SqlValue::Int(2));
        assert!(buf.take_all().is_empty());
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn affected_buffer_has_no_description() {
        let buf = ResultBuffer::from_affected(7);
        assert!(buf.columns().is_empty());
        assert_eq!(buf.remaining(), 0);
    }
}
