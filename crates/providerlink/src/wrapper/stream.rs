use super::{Bound, Payload};
use crate::error::{Error, Result};
use crate::lease::Lease;
use providerlink_transport::{AssetDescriptor, Bundle, UNKNOWN_LENGTH};
use std::fmt;
use std::io::{self, Read, Write};

const KIND: &str = "stream";

impl Payload for AssetDescriptor {
    fn close_payload(&mut self) -> io::Result<()> {
        self.close()
    }
}

/// A byte stream bound to the handle that produced it.
///
/// Carries the descriptor's range: a [`declared_length`](Self::declared_length)
/// of `-1` means the stream is the whole resource, anything else means it is a
/// window starting at [`start_offset`](Self::start_offset) inside a larger
/// resource. Streams opened from the local filesystem hold no handle.
///
/// Endpoints hand out window streams already positioned at `start_offset`.
/// Reads and writes through the wrapper stop after `declared_length` bytes.
pub struct ResourceStream {
    inner: Bound<AssetDescriptor>,
    /// Bytes left in the window; `None` for a whole resource
    remaining: Option<u64>,
    start_offset: u64,
    declared_length: i64,
    mime_type: Option<String>,
    extras: Option<Bundle>,
}

impl ResourceStream {
    /// Wrap `descriptor`, taking over `lease`.
    ///
    /// If the descriptor is unusable, it is closed and the lease released
    /// before the error is returned.
    pub(crate) fn bind(
        mut descriptor: AssetDescriptor,
        lease: Option<Lease>,
        leak_warnings: bool,
    ) -> Result<Self> {
        let declared_length = descriptor.declared_length();
        if declared_length < UNKNOWN_LENGTH {
            let _ = descriptor.close();
            if let Some(lease) = lease {
                lease.release();
            }
            return Err(Error::InvalidDescriptor(format!(
                "declared length {declared_length} is below {UNKNOWN_LENGTH}"
            )));
        }

        Ok(Self {
            remaining: u64::try_from(declared_length).ok(),
            start_offset: descriptor.start_offset(),
            declared_length,
            mime_type: descriptor.mime_type().map(str::to_string),
            extras: descriptor.extras().cloned(),
            inner: Bound::new(KIND, descriptor, lease, leak_warnings),
        })
    }

    /// Offset of the first byte within the underlying resource
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Declared window length, or `-1` for the whole resource
    pub fn declared_length(&self) -> i64 {
        self.declared_length
    }

    /// Whether the stream can be treated as an independent complete file
    pub fn is_whole_file(&self) -> bool {
        self.declared_length == UNKNOWN_LENGTH
    }

    /// MIME type the endpoint produced, if reported
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Side-channel extras delivered with the stream
    pub fn extras(&self) -> Option<&Bundle> {
        self.extras.as_ref()
    }

    /// Whether `close()` has run
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Read the rest of the stream, then close it.
    pub fn read_all_and_close(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let read = self.read_to_end(&mut buf);
        let closed = self.close();
        read?;
        closed?;
        Ok(buf)
    }

    /// Close the stream and release the handle. Later calls do nothing.
    pub fn close(&self) -> Result<()> {
        self.inner.close().map_err(Error::from)
    }

    /// Length of `len` clipped to what is left of the window.
    fn clip(&self, len: usize) -> usize {
        match self.remaining {
            Some(left) => len.min(usize::try_from(left).unwrap_or(usize::MAX)),
            None => len,
        }
    }

    fn consume(&mut self, n: usize) {
        if let Some(left) = self.remaining.as_mut() {
            *left = left.saturating_sub(n as u64);
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stream already closed")
}

impl Read for ResourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.clip(buf.len());
        let n = self
            .inner
            .with_mut(|d| {
                if len == 0 && !buf.is_empty() {
                    // Window exhausted.
                    return Ok(0);
                }
                d.stream_mut().read(&mut buf[..len])
            })
            .unwrap_or_else(|| Err(closed_error()))?;
        self.consume(n);
        Ok(n)
    }
}

impl Write for ResourceStream {
    /// Writes past the end of a window are refused with `Ok(0)`, which
    /// `write_all` reports as [`io::ErrorKind::WriteZero`].
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.clip(buf.len());
        let n = self
            .inner
            .with_mut(|d| {
                if len == 0 && !buf.is_empty() {
                    return Ok(0);
                }
                d.stream_mut().write(&buf[..len])
            })
            .unwrap_or_else(|| Err(closed_error()))?;
        self.consume(n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .with_mut(|d| d.stream_mut().flush())
            .unwrap_or_else(|| Err(closed_error()))
    }
}

impl fmt::Debug for ResourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStream")
            .field("start_offset", &self.start_offset)
            .field("declared_length", &self.declared_length)
            .field("remaining", &self.remaining)
            .field("mime_type", &self.mime_type)
            .field("closed", &self.is_closed())
            .finish()
    }
}
