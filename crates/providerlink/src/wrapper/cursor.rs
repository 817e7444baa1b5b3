use super::{Bound, Payload};
use crate::error::{Error, Result};
use crate::lease::Lease;
use providerlink_transport::Cursor;
use serde_json::Value;
use std::fmt;
use std::io;

const KIND: &str = "cursor";

impl Payload for Box<dyn Cursor> {
    fn close_payload(&mut self) -> io::Result<()> {
        self.close();
        Ok(())
    }
}

/// Rows returned by a query, bound to the handle that produced them.
///
/// All accessors take `&self`; the cursor can be shared across threads and
/// closed from any of them. Accessors fail with [`Error::Closed`] after
/// [`close`](Self::close).
pub struct ResourceCursor {
    inner: Bound<Box<dyn Cursor>>,
}

impl ResourceCursor {
    pub(crate) fn new(cursor: Box<dyn Cursor>, lease: Lease, leak_warnings: bool) -> Self {
        Self {
            inner: Bound::new(KIND, cursor, Some(lease), leak_warnings),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Box<dyn Cursor>) -> R) -> Result<R> {
        self.inner.with(f).ok_or(Error::Closed(KIND))
    }

    /// Column names
    pub fn columns(&self) -> Result<Vec<String>> {
        self.with(|c| c.columns().to_vec())
    }

    /// Index of the column named `name`
    pub fn column_index(&self, name: &str) -> Result<Option<usize>> {
        self.with(|c| c.column_index(name))
    }

    /// Total number of rows
    pub fn count(&self) -> Result<usize> {
        Ok(self.with(|c| c.count())??)
    }

    /// Zero-based index of the current row
    pub fn position(&self) -> Result<Option<usize>> {
        self.with(|c| c.position())
    }

    /// Advance to the next row; `false` once past the last row
    pub fn move_to_next(&self) -> Result<bool> {
        Ok(self.with(|c| c.move_to_next())??)
    }

    /// Value of `column` in the current row
    pub fn get(&self, column: usize) -> Result<Option<Value>> {
        self.with(|c| c.get(column).cloned())
    }

    /// Value of the column named `name` in the current row
    pub fn get_by_name(&self, name: &str) -> Result<Option<Value>> {
        self.with(|c| c.column_index(name).and_then(|i| c.get(i).cloned()))
    }

    /// Read every remaining row.
    pub fn collect_rows(&self) -> Result<Vec<Vec<Value>>> {
        let columns = self.columns()?.len();
        let mut rows = Vec::new();
        while self.move_to_next()? {
            let row = self.with(|c| {
                (0..columns)
                    .map(|i| c.get(i).cloned().unwrap_or(Value::Null))
                    .collect()
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Whether `close()` has run
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Close the rows and release the handle. Later calls do nothing.
    pub fn close(&self) {
        // Cursor close is infallible.
        let _ = self.inner.close();
    }
}

impl fmt::Debug for ResourceCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCursor")
            .field("kind", &self.inner.kind())
            .field("closed", &self.is_closed())
            .finish()
    }
}
