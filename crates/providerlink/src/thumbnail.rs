//! Thumbnail loading.
//!
//! A thumbnail is requested from the provider as an image stream with a
//! `size` option, read fully, and decoded through an [`ImageDecoder`]. The
//! decoder is asked to subsample by an integer factor so that the decoded
//! image is no more than needed for the requested box, and the result is
//! rotated by the `orientation` extra the provider sent with the stream.

use crate::error::{Error, Result};
use crate::negotiate::StreamNegotiator;
use providerlink_core::cancel::CancellationSignal;
use providerlink_transport::{Bundle, EXTRA_ORIENTATION, EXTRA_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::Url;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Size {
    /// Create a size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Integer subsampling factor for decoding an image of size `decoded` into
/// the box `target`.
///
/// Only images larger than the box in some dimension are subsampled. The
/// factor is the smaller of the two axis ratios, rounded down, and never
/// below 1, so the decoded image still covers the box on both axes.
///
/// ```rust
/// use providerlink::thumbnail::{sample_size, Size};
///
/// assert_eq!(sample_size(Size::new(4000, 3000), Size::new(500, 500)), 6);
/// assert_eq!(sample_size(Size::new(250, 80), Size::new(100, 100)), 1);
/// ```
pub fn sample_size(decoded: Size, target: Size) -> u32 {
    if decoded.width <= target.width && decoded.height <= target.height {
        return 1;
    }
    // An empty box has no meaningful ratio on that axis.
    let by_width = decoded.width / target.width.max(1);
    let by_height = decoded.height / target.height.max(1);
    by_width.min(by_height).max(1)
}

/// Decoded pixels, row-major, one `u32` per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height` pixels, row by row
    pub pixels: Vec<u32>,
}

impl Bitmap {
    /// Create a bitmap; `pixels` must hold `width * height` values.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize {
            return Err(Error::Decode(anyhow::anyhow!(
                "{width}x{height} bitmap needs {} pixels, got {}",
                width as usize * height as usize,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Size of the bitmap
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Rotate clockwise by `degrees`.
    ///
    /// Angles are taken modulo 360; anything other than a multiple of 90
    /// leaves the bitmap unchanged.
    pub fn rotate(self, degrees: i64) -> Self {
        let (w, h) = (self.width as usize, self.height as usize);
        let turns = match degrees.rem_euclid(360) {
            90 => 1,
            180 => 2,
            270 => 3,
            0 => return self,
            other => {
                debug!(degrees = other, "ignoring orientation that is not a right angle");
                return self;
            }
        };

        let mut pixels = vec![0; self.pixels.len()];
        for y in 0..h {
            for x in 0..w {
                let dest = match turns {
                    1 => x * h + (h - 1 - y),
                    2 => (h - 1 - y) * w + (w - 1 - x),
                    _ => (w - 1 - x) * h + y,
                };
                pixels[dest] = self.pixels[y * w + x];
            }
        }

        let (width, height) = if turns == 2 {
            (self.width, self.height)
        } else {
            (self.height, self.width)
        };
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Turns encoded image bytes into pixels.
pub trait ImageDecoder: Send + Sync {
    /// Read the image dimensions without decoding pixels.
    fn probe(&self, bytes: &[u8]) -> anyhow::Result<Size>;

    /// Decode, keeping every `sample`th pixel on both axes.
    fn decode(&self, bytes: &[u8], sample: u32) -> anyhow::Result<Bitmap>;
}

/// Orientation in degrees carried in a stream's extras, 0 if absent.
pub fn orientation(extras: Option<&Bundle>) -> i64 {
    extras
        .and_then(|extras| extras.get(EXTRA_ORIENTATION))
        .and_then(|value| value.as_i64())
        .unwrap_or(0)
}

pub(crate) fn load(
    negotiator: &StreamNegotiator,
    mime_filter: &str,
    target: &Url,
    size: Size,
    decoder: &dyn ImageDecoder,
    cancel: Option<&CancellationSignal>,
) -> Result<Bitmap> {
    let mut options = Bundle::new();
    options.insert(
        EXTRA_SIZE.to_string(),
        serde_json::to_value(size).map_err(|e| Error::Serialization(e.to_string()))?,
    );

    let stream = negotiator
        .open_typed_stream(target, mime_filter, &options, cancel)?
        .ok_or_else(|| Error::NotFound(format!("no {mime_filter} thumbnail for {target}")))?;
    let degrees = orientation(stream.extras());
    let bytes = stream.read_all_and_close()?;

    if let Some(signal) = cancel {
        signal.check()?;
    }

    let full = decoder.probe(&bytes).map_err(Error::Decode)?;
    let sample = sample_size(full, size);
    debug!(target = %target, full = %full, requested = %size, sample, degrees, "decoding thumbnail");

    let bitmap = decoder.decode(&bytes, sample).map_err(Error::Decode)?;
    Ok(bitmap.rotate(degrees))
}
