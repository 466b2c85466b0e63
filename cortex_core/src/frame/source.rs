//! Read-only pixel buffer descriptor handed in by the renderer

use super::header::PixelFormat;

/// Borrowed description of one rendered frame
#[derive(Debug, Clone, Copy)]
pub struct PixelSource<'a> {
    width: u32,
    height: u32,
    row_bytes: u32,
    pixels: Option<&'a [u8]>,
}

impl<'a> PixelSource<'a> {
    /// Frame with an explicit stride. `pixels` is the whole buffer,
    /// row padding included.
    pub fn new(width: u32, height: u32, row_bytes: u32, pixels: &'a [u8]) -> Self {
        Self {
            width,
            height,
            row_bytes,
            pixels: Some(pixels),
        }
    }

    /// Tightly packed RGBA frame
    pub fn rgba(width: u32, height: u32, pixels: &'a [u8]) -> Self {
        let bpp = PixelFormat::Rgba.bytes_per_pixel().unwrap_or(4);
        Self::new(width, height, width.saturating_mul(bpp), pixels)
    }

    /// Frame whose backing memory is missing
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            row_bytes: 0,
            pixels: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_bytes(&self) -> u32 {
        self.row_bytes
    }

    /// Pixel bytes, if there is any backing memory at all
    pub fn pixels(&self) -> Option<&'a [u8]> {
        self.pixels
    }

    /// Total size of the pixel buffer in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.map_or(0, <[u8]>::len)
    }

    /// Bytes the frame occupies in the segment: `row_bytes * height`.
    /// `None` if that does not fit in `usize`.
    pub fn payload_len(&self) -> Option<usize> {
        (self.row_bytes as usize).checked_mul(self.height as usize)
    }

    /// Smallest stride that holds one row of RGBA pixels
    pub fn min_row_bytes(&self) -> u64 {
        let bpp = PixelFormat::Rgba.bytes_per_pixel().unwrap_or(4);
        u64::from(self.width) * u64::from(bpp)
    }

    /// No backing memory or nothing in it
    pub fn is_empty(&self) -> bool {
        self.byte_size() == 0
    }
}
