//! Frame header wire layout
//!
//! Layout (little-endian, fixed offsets, 160 bytes):
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  0  magic_number : u32   "NEUR", constant once written   │
//! │  4  version      : u32   header format version           │
//! │  8  width        : u32   pixels                          │
//! │ 12  height       : u32   pixels                          │
//! │ 16  format       : u32   1 = RGBA                        │
//! │ 20  padding      : u32                                   │
//! │ 24  frame_index  : u64   bumped once per publish         │
//! │ 32  timestamp_us : i64   µs since Unix epoch (UTC)       │
//! │ 40  row_bytes    : u32   payload stride                  │
//! │ 44  reserved     : [u8; 116]                             │
//! ├──────────────────────────────────────────────────────────┤
//! │ 160 payload      : row_bytes * height bytes              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every field is an atomic so that concurrent observers never race on plain
//! memory. Metadata fields are stored with `Relaxed` ordering; `frame_index` is
//! advanced with a `Release` read-modify-write and must be loaded with
//! `Acquire`. A reader that sees `frame_index` move therefore sees the
//! metadata of that publish. It gets no such promise for payload bytes read
//! concurrently: those may mix two frames (a torn read). Re-reading
//! `frame_index` after copying catches a publish that completed meanwhile,
//! not one still in flight; the channel never promises a tear-free frame.

use crate::error::{CortexError, CortexResult};
use std::fmt;
use std::mem::{align_of, offset_of, size_of};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};

#[cfg(not(target_endian = "little"))]
compile_error!("the frame header is a little-endian wire format");

/// Sentinel marking an initialized header ("NEUR")
pub const FRAME_MAGIC: u32 = 0x4E45_5552;

/// Current header format version
pub const FRAME_VERSION: u32 = 1;

/// Total header size; the payload starts at this offset
pub const HEADER_SIZE: usize = 160;

/// Offset of the pixel payload inside the segment
pub const PAYLOAD_OFFSET: usize = HEADER_SIZE;

pub const OFFSET_MAGIC: usize = 0;
pub const OFFSET_VERSION: usize = 4;
pub const OFFSET_WIDTH: usize = 8;
pub const OFFSET_HEIGHT: usize = 12;
pub const OFFSET_FORMAT: usize = 16;
pub const OFFSET_FRAME_INDEX: usize = 24;
pub const OFFSET_TIMESTAMP: usize = 32;
pub const OFFSET_ROW_BYTES: usize = 40;
pub const OFFSET_RESERVED: usize = 44;

const RESERVED_SIZE: usize = HEADER_SIZE - OFFSET_RESERVED;

/// Pixel format tag stored in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel, red-green-blue-alpha
    Rgba,
    /// A tag this build does not know
    Unknown(u32),
}

impl PixelFormat {
    pub const RGBA_TAG: u32 = 1;

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            Self::RGBA_TAG => PixelFormat::Rgba,
            other => PixelFormat::Unknown(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            PixelFormat::Rgba => Self::RGBA_TAG,
            PixelFormat::Unknown(raw) => raw,
        }
    }

    /// Bytes per pixel, if known
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            PixelFormat::Rgba => Some(4),
            PixelFormat::Unknown(_) => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Rgba => write!(f, "RGBA"),
            PixelFormat::Unknown(raw) => write!(f, "unknown({})", raw),
        }
    }
}

/// Header living at offset 0 of the shared segment
#[repr(C)]
pub struct FrameHeader {
    magic_number: AtomicU32,
    version: AtomicU32,
    width: AtomicU32,
    height: AtomicU32,
    format: AtomicU32,
    _padding: AtomicU32,
    frame_index: AtomicU64,
    timestamp_us: AtomicI64,
    row_bytes: AtomicU32,
    _reserved: [u8; RESERVED_SIZE],
}

const _: () = {
    assert!(size_of::<FrameHeader>() == HEADER_SIZE);
    assert!(offset_of!(FrameHeader, magic_number) == OFFSET_MAGIC);
    assert!(offset_of!(FrameHeader, version) == OFFSET_VERSION);
    assert!(offset_of!(FrameHeader, width) == OFFSET_WIDTH);
    assert!(offset_of!(FrameHeader, height) == OFFSET_HEIGHT);
    assert!(offset_of!(FrameHeader, format) == OFFSET_FORMAT);
    assert!(offset_of!(FrameHeader, frame_index) == OFFSET_FRAME_INDEX);
    assert!(offset_of!(FrameHeader, timestamp_us) == OFFSET_TIMESTAMP);
    assert!(offset_of!(FrameHeader, row_bytes) == OFFSET_ROW_BYTES);
    assert!(offset_of!(FrameHeader, _reserved) == OFFSET_RESERVED);
};

impl FrameHeader {
    /// Reinterpret the first `HEADER_SIZE` bytes of `bytes` as a header.
    ///
    /// Meant for observers, including read-only mappings; all public
    /// accessors are loads.
    pub fn from_bytes(bytes: &[u8]) -> CortexResult<&FrameHeader> {
        check_header_bytes(bytes.as_ptr(), bytes.len())?;

        // SAFETY: length and alignment checked; every field is an atomic or
        // plain bytes, so any bit pattern is a valid FrameHeader.
        Ok(unsafe { &*(bytes.as_ptr() as *const FrameHeader) })
    }

    /// Writer-side variant of [`FrameHeader::from_bytes`]. The pointer keeps
    /// write provenance, so the atomic stores below are sound.
    pub(crate) fn from_mut_bytes(bytes: &mut [u8]) -> CortexResult<&FrameHeader> {
        check_header_bytes(bytes.as_ptr(), bytes.len())?;

        // SAFETY: as above; the exclusive borrow covers the header bytes.
        Ok(unsafe { &*(bytes.as_mut_ptr() as *const FrameHeader) })
    }

    pub fn magic_number(&self) -> u32 {
        self.magic_number.load(Ordering::Acquire)
    }

    pub fn has_magic(&self) -> bool {
        self.magic_number() == FRAME_MAGIC
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Relaxed)
    }

    pub fn width(&self) -> u32 {
        self.width.load(Ordering::Relaxed)
    }

    pub fn height(&self) -> u32 {
        self.height.load(Ordering::Relaxed)
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::from_raw(self.format.load(Ordering::Relaxed))
    }

    /// Completed publish count. Acquire pairs with the producer's Release bump.
    pub fn frame_index(&self) -> u64 {
        self.frame_index.load(Ordering::Acquire)
    }

    /// Publish time in microseconds since 1970-01-01T00:00:00Z
    pub fn timestamp_us(&self) -> i64 {
        self.timestamp_us.load(Ordering::Relaxed)
    }

    pub fn row_bytes(&self) -> u32 {
        self.row_bytes.load(Ordering::Relaxed)
    }

    /// Consistent-as-possible copy of all fields
    pub fn snapshot(&self) -> HeaderSnapshot {
        let frame_index = self.frame_index();
        HeaderSnapshot {
            magic_number: self.magic_number(),
            version: self.version(),
            width: self.width(),
            height: self.height(),
            format: self.format(),
            frame_index,
            timestamp_us: self.timestamp_us(),
            row_bytes: self.row_bytes(),
        }
    }

    /// Stamp identity fields on a zeroed header. Magic goes last so that a
    /// reader seeing it also sees version and format.
    pub(crate) fn write_identity(&self) {
        self.version.store(FRAME_VERSION, Ordering::Relaxed);
        self.format.store(PixelFormat::Rgba.as_raw(), Ordering::Relaxed);
        self.magic_number.store(FRAME_MAGIC, Ordering::Release);
    }

    /// Store metadata of the frame about to be announced
    pub(crate) fn store_frame_meta(&self, width: u32, height: u32, row_bytes: u32, timestamp_us: i64) {
        self.width.store(width, Ordering::Relaxed);
        self.height.store(height, Ordering::Relaxed);
        self.row_bytes.store(row_bytes, Ordering::Relaxed);
        self.timestamp_us.store(timestamp_us, Ordering::Relaxed);
    }

    /// Announce a completed frame. Returns the new frame index.
    pub(crate) fn advance_frame_index(&self) -> u64 {
        self.frame_index
            .fetch_add(1, Ordering::Release)
            .wrapping_add(1)
    }
}

impl fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.snapshot(), f)
    }
}

fn check_header_bytes(ptr: *const u8, len: usize) -> CortexResult<()> {
    if len < HEADER_SIZE {
        return Err(CortexError::OutOfBounds {
            offset: 0,
            len: HEADER_SIZE,
            capacity: len,
        });
    }
    let align = align_of::<FrameHeader>();
    if !(ptr as usize).is_multiple_of(align) {
        return Err(CortexError::Misaligned(align));
    }
    Ok(())
}

/// Plain copy of a header, as a reader would parse it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSnapshot {
    pub magic_number: u32,
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub frame_index: u64,
    /// Microseconds since the Unix epoch, UTC
    pub timestamp_us: i64,
    pub row_bytes: u32,
}

impl HeaderSnapshot {
    /// Parse the little-endian header at the start of `bytes`
    pub fn decode(bytes: &[u8]) -> CortexResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CortexError::invalid_header(format!(
                "need {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let u32_at = |offset: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[offset..offset + 4]);
            u32::from_le_bytes(raw)
        };
        let u64_at = |offset: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[offset..offset + 8]);
            u64::from_le_bytes(raw)
        };

        Ok(Self {
            magic_number: u32_at(OFFSET_MAGIC),
            version: u32_at(OFFSET_VERSION),
            width: u32_at(OFFSET_WIDTH),
            height: u32_at(OFFSET_HEIGHT),
            format: PixelFormat::from_raw(u32_at(OFFSET_FORMAT)),
            frame_index: u64_at(OFFSET_FRAME_INDEX),
            timestamp_us: u64_at(OFFSET_TIMESTAMP) as i64,
            row_bytes: u32_at(OFFSET_ROW_BYTES),
        })
    }

    /// Magic present and version understood by this build
    pub fn is_valid(&self) -> bool {
        self.magic_number == FRAME_MAGIC && self.is_compatible()
    }

    pub fn is_compatible(&self) -> bool {
        self.version == FRAME_VERSION
    }

    /// Bytes of payload described by this header
    pub fn payload_len(&self) -> usize {
        self.row_bytes as usize * self.height as usize
    }
}
