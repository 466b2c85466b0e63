//! # Frame channel
//!
//! - **FrameHeader**: fixed 160-byte header at offset 0 of the segment
//! - **PixelSource**: the renderer's read-only view of one frame
//! - **FramePublisher**: the single writer of header and payload

pub mod header;
pub mod publisher;
pub mod source;

pub use header::{
    FrameHeader, HeaderSnapshot, PixelFormat, FRAME_MAGIC, FRAME_VERSION, HEADER_SIZE,
    PAYLOAD_OFFSET,
};
pub use publisher::{FramePublisher, PublishOutcome, PublishStats, PublisherState, RejectReason};
pub use source::PixelSource;
