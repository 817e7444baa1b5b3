//! Live results produced by endpoints: row cursors and stream descriptors.
//!
//! Both kinds hold remote state and must be closed. The resolver wraps them
//! so that closing also releases the endpoint handle that produced them.

use crate::error::{Result, TransportError};
use crate::types::Bundle;
use serde_json::Value;
use std::fmt;
use std::io::{self, Read, Write};

/// Declared length meaning "the whole resource".
pub const UNKNOWN_LENGTH: i64 = -1;

/// Forward-only access to rows returned by a query.
///
/// Remote implementations may fail any method with
/// [`TransportError::StaleEndpoint`] if the endpoint dies while rows are
/// being materialized.
pub trait Cursor: Send {
    /// Column names, in row order
    fn columns(&self) -> &[String];

    /// Total number of rows. May force the remote side to run the query.
    fn count(&mut self) -> Result<usize>;

    /// Zero-based index of the current row, or `None` before the first row
    /// and after the last one.
    fn position(&self) -> Option<usize>;

    /// Advance to the next row. Returns `false` once past the last row.
    fn move_to_next(&mut self) -> Result<bool>;

    /// Value of `column` in the current row.
    fn get(&self, column: usize) -> Option<&Value>;

    /// Release remote state held by this cursor.
    fn close(&mut self);

    /// Index of the column named `name`
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c == name)
    }
}

/// In-memory cursor built row by row.
#[derive(Debug, Clone, Default)]
pub struct RowCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    // -1 is before the first row
    cursor: isize,
    closed: bool,
}

impl RowCursor {
    /// Create an empty cursor with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            cursor: -1,
            closed: false,
        }
    }

    /// Append a row; missing trailing values are filled with `null`
    pub fn add_row(&mut self, mut row: Vec<Value>) -> &mut Self {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
        self
    }

    /// Builder-style variant of [`add_row`](Self::add_row)
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.add_row(row);
        self
    }

    /// Whether [`Cursor::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(TransportError::Rejected("cursor is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Cursor for RowCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn count(&mut self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.rows.len())
    }

    fn position(&self) -> Option<usize> {
        usize::try_from(self.cursor)
            .ok()
            .filter(|&index| index < self.rows.len())
    }

    fn move_to_next(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let len = self.rows.len() as isize;
        if self.cursor < len {
            self.cursor += 1;
        }
        Ok(self.cursor < len)
    }

    fn get(&self, column: usize) -> Option<&Value> {
        self.position()
            .and_then(|row| self.rows.get(row))
            .and_then(|row| row.get(column))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// A byte stream handed out by an endpoint.
pub trait RemoteStream: Read + Write + Send {
    /// Flush and release the underlying descriptor.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl RemoteStream for std::fs::File {
    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl RemoteStream for io::Cursor<Vec<u8>> {}

/// A stream plus the range of the underlying resource it covers.
///
/// A `declared_length` of [`UNKNOWN_LENGTH`] means the stream is the whole
/// resource and can be treated as an independent file. Any non-negative value
/// means the stream is a window of `declared_length` bytes starting at
/// `start_offset` inside a larger resource. A window stream must already be
/// positioned at `start_offset` when handed out; consumers stop after
/// `declared_length` bytes.
pub struct AssetDescriptor {
    stream: Box<dyn RemoteStream>,
    start_offset: u64,
    declared_length: i64,
    mime_type: Option<String>,
    extras: Option<Bundle>,
}

impl AssetDescriptor {
    /// Describe a stream covering a whole resource
    pub fn whole(stream: Box<dyn RemoteStream>) -> Self {
        Self {
            stream,
            start_offset: 0,
            declared_length: UNKNOWN_LENGTH,
            mime_type: None,
            extras: None,
        }
    }

    /// Describe a stream covering `length` bytes from `start_offset`
    pub fn range(stream: Box<dyn RemoteStream>, start_offset: u64, length: i64) -> Self {
        Self {
            stream,
            start_offset,
            declared_length: length,
            mime_type: None,
            extras: None,
        }
    }

    /// Attach the negotiated MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Attach side-channel extras (e.g. orientation metadata)
    pub fn with_extras(mut self, extras: Bundle) -> Self {
        self.extras = Some(extras);
        self
    }

    /// Offset of the first byte within the underlying resource
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Declared window length, or [`UNKNOWN_LENGTH`] for a whole resource
    pub fn declared_length(&self) -> i64 {
        self.declared_length
    }

    /// Whether the stream is a complete, independent resource
    pub fn is_whole_file(&self) -> bool {
        self.declared_length == UNKNOWN_LENGTH
    }

    /// Negotiated MIME type, if the endpoint reported one
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Side-channel extras
    pub fn extras(&self) -> Option<&Bundle> {
        self.extras.as_ref()
    }

    /// Mutable access to the byte stream
    pub fn stream_mut(&mut self) -> &mut dyn RemoteStream {
        self.stream.as_mut()
    }

    /// Close the underlying stream
    pub fn close(&mut self) -> io::Result<()> {
        self.stream.close()
    }
}

impl fmt::Debug for AssetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetDescriptor")
            .field("start_offset", &self.start_offset)
            .field("declared_length", &self.declared_length)
            .field("mime_type", &self.mime_type)
            .field("extras", &self.extras)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_cursor_iteration() {
        let mut cursor = RowCursor::new(["_id", "title"])
            .with_row(vec![json!(1), json!("first")])
            .with_row(vec![json!(2)]);

        assert_eq!(cursor.count().unwrap(), 2);
        assert_eq!(cursor.position(), None);
        assert_eq!(cursor.column_index("title"), Some(1));

        assert!(cursor.move_to_next().unwrap());
        assert_eq!(cursor.get(1), Some(&json!("first")));
        assert!(cursor.move_to_next().unwrap());
        assert_eq!(cursor.get(1), Some(&Value::Null));
        assert!(!cursor.move_to_next().unwrap());
        assert_eq!(cursor.position(), None);
        assert!(!cursor.move_to_next().unwrap());
    }

    #[test]
    fn test_row_cursor_rejects_use_after_close() {
        let mut cursor = RowCursor::new(["_id"]);
        cursor.close();
        assert!(cursor.is_closed());
        assert!(matches!(cursor.count(), Err(TransportError::Rejected(_))));
    }

    #[test]
    fn test_descriptor_ranges() {
        let whole = AssetDescriptor::whole(Box::new(io::Cursor::new(vec![1, 2, 3])));
        assert!(whole.is_whole_file());
        assert_eq!(whole.declared_length(), UNKNOWN_LENGTH);

        let window = AssetDescriptor::range(Box::new(io::Cursor::new(vec![0; 8])), 128, 8)
            .with_mime_type("image/jpeg");
        assert!(!window.is_whole_file());
        assert_eq!(window.start_offset(), 128);
        assert_eq!(window.mime_type(), Some("image/jpeg"));
    }

    #[test]
    fn test_descriptor_reads_through() {
        let mut desc = AssetDescriptor::whole(Box::new(io::Cursor::new(b"hello".to_vec())));
        let mut buf = String::new();
        desc.stream_mut().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
        desc.close().unwrap();
    }
}
