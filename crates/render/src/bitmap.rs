//! Decoded page bitmap type and render error taxonomy.

use thiserror::Error;

/// Pixel layout of a decoded page bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba8,
    /// 16-bit packed RGB, 2 bytes per pixel
    Rgb565,
    /// 8-bit grayscale, 1 byte per pixel
    Gray8,
}

impl PixelFormat {
    /// Bytes occupied by a single pixel in this format.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Errors raised by a decode backend.
///
/// `Ok(None)` from [`PageRenderer::render`] covers the "no image available"
/// case (page out of range, backend declined); an error here is reserved for
/// the allocation-failure signal that must not be masked.
///
/// [`PageRenderer::render`]: crate::PageRenderer::render
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The backend could not allocate the decoded buffer.
    #[error("out of memory decoding page {page} at width class {width_class}")]
    OutOfMemory { page: u32, width_class: String },
}

/// A fully decoded page image, ready for display.
///
/// The pixel buffer length is validated against the dimensions and format at
/// construction so byte-size accounting downstream never drifts from reality.
#[derive(Debug, Clone)]
pub struct PageBitmap {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl PageBitmap {
    /// Create a bitmap from a decoded pixel buffer.
    ///
    /// Returns `None` if the buffer length does not match
    /// `width * height * bytes_per_pixel`.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Option<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            pixels,
            width,
            height,
            format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Byte count of the decoded buffer.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Consume the bitmap, returning its parts.
    pub fn into_parts(self) -> (Vec<u8>, u32, u32, PixelFormat) {
        (self.pixels, self.width, self.height, self.format)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
