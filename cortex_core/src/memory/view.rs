//! Bounds-checked access into a mapped segment.
//!
//! All offset arithmetic on the mapping goes through [`RegionView`]; callers
//! never touch raw pointers.

use std::ops::Range;

use crate::error::{CortexError, CortexResult};
use crate::frame::header::{FrameHeader, HEADER_SIZE, PAYLOAD_OFFSET};

/// Exclusive, bounds-checked view over a mapped region
pub struct RegionView<'a> {
    bytes: &'a mut [u8],
}

impl<'a> RegionView<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Total bytes in the region
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes available after the header
    pub fn payload_capacity(&self) -> usize {
        self.capacity().saturating_sub(HEADER_SIZE)
    }

    /// Validate `offset..offset + len` against the region
    pub fn check_range(&self, offset: usize, len: usize) -> CortexResult<Range<usize>> {
        let out_of_bounds = || CortexError::OutOfBounds {
            offset,
            len,
            capacity: self.capacity(),
        };
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.capacity() {
            return Err(out_of_bounds());
        }
        Ok(offset..end)
    }

    /// Header at offset 0
    pub fn header(&mut self) -> CortexResult<&FrameHeader> {
        let range = self.check_range(0, HEADER_SIZE)?;
        FrameHeader::from_mut_bytes(&mut self.bytes[range])
    }

    /// Zero every header byte, reserved block included
    pub fn zero_header(&mut self) -> CortexResult<()> {
        let range = self.check_range(0, HEADER_SIZE)?;
        self.bytes[range].fill(0);
        Ok(())
    }

    /// Split into the header and the payload area that follows it
    pub fn into_frame(self) -> CortexResult<FrameRegion<'a>> {
        self.check_range(0, HEADER_SIZE)?;
        let bytes = self.bytes;
        let (head, payload) = bytes.split_at_mut(PAYLOAD_OFFSET);
        let header = FrameHeader::from_mut_bytes(head)?;
        Ok(FrameRegion { header, payload })
    }
}

/// Header plus payload of one mapped segment
pub struct FrameRegion<'a> {
    header: &'a FrameHeader,
    payload: &'a mut [u8],
}

impl<'a> FrameRegion<'a> {
    pub fn header(&self) -> &'a FrameHeader {
        self.header
    }

    /// Bytes the payload area can hold
    pub fn payload_capacity(&self) -> usize {
        self.payload.len()
    }

    /// Overwrite the start of the payload area with `pixels`.
    ///
    /// Fails without writing anything when `pixels` does not fit.
    pub fn write_payload(&mut self, pixels: &[u8]) -> CortexResult<()> {
        let capacity = PAYLOAD_OFFSET + self.payload.len();
        let dst = self
            .payload
            .get_mut(..pixels.len())
            .ok_or(CortexError::OutOfBounds {
                offset: PAYLOAD_OFFSET,
                len: pixels.len(),
                capacity,
            })?;
        dst.copy_from_slice(pixels);
        Ok(())
    }

    /// Current payload bytes, `len` of them
    pub fn payload(&self, len: usize) -> CortexResult<&[u8]> {
        self.payload.get(..len).ok_or(CortexError::OutOfBounds {
            offset: PAYLOAD_OFFSET,
            len,
            capacity: PAYLOAD_OFFSET + self.payload.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// u64 backing keeps the header 8-byte aligned
    fn region(bytes: usize) -> Vec<u64> {
        vec![0u64; bytes / 8]
    }

    fn bytes_mut(buf: &mut [u64]) -> &mut [u8] {
        // SAFETY: u64 slice reinterpreted as bytes of the same length
        unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, buf.len() * 8) }
    }

    #[test]
    fn test_check_range() {
        let mut buf = region(1024);
        let view = RegionView::new(bytes_mut(&mut buf));
        assert_eq!(view.check_range(0, 1024).unwrap(), 0..1024);
        assert_eq!(view.check_range(1000, 24).unwrap(), 1000..1024);
        assert!(view.check_range(1000, 25).is_err());
        assert!(view.check_range(usize::MAX, 2).is_err());
        assert_eq!(view.payload_capacity(), 1024 - HEADER_SIZE);
    }

    #[test]
    fn test_region_smaller_than_header() {
        let mut buf = region(64);
        let mut view = RegionView::new(bytes_mut(&mut buf));
        assert!(view.header().is_err());
        assert!(view.zero_header().is_err());
        assert!(view.into_frame().is_err());
    }

    #[test]
    fn test_zero_header_keeps_payload() {
        let mut buf = region(512);
        bytes_mut(&mut buf).fill(0xAB);

        let mut view = RegionView::new(bytes_mut(&mut buf));
        view.zero_header().unwrap();
        assert!(!view.header().unwrap().has_magic());

        let bytes = bytes_mut(&mut buf);
        assert!(bytes[..HEADER_SIZE].iter().all(|&b| b == 0));
        assert!(bytes[HEADER_SIZE..].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_write_payload_bounds() {
        let mut buf = region(HEADER_SIZE + 64);
        let mut frame = RegionView::new(bytes_mut(&mut buf)).into_frame().unwrap();
        assert_eq!(frame.payload_capacity(), 64);

        frame.write_payload(&[7u8; 64]).unwrap();
        assert_eq!(frame.payload(64).unwrap(), &[7u8; 64][..]);

        // Too large: nothing written
        let err = frame.write_payload(&[9u8; 65]).unwrap_err();
        assert!(matches!(err, CortexError::OutOfBounds { len: 65, .. }));
        assert_eq!(frame.payload(64).unwrap(), &[7u8; 64][..]);
        assert!(frame.payload(65).is_err());
    }
}
