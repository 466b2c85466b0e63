//! # Visual Cortex Core
//!
//! Single-producer, many-observer frame channel over named shared memory.
//!
//! A renderer overwrites one fixed 16 MiB segment with its latest frame: a
//! 160-byte header followed by raw pixels. Observer processes map the same
//! segment and poll `frame_index`; there is no handshake and no lock. The
//! only synchronization point is the atomic bump of `frame_index` that ends
//! each publish, so observers may see torn payloads and must re-check the
//! index if they care.
//!
//! - **Frame**: header layout, pixel sources, the publisher
//! - **Memory**: segment acquisition, mapping, bounds-checked views
//! - **Config**: segment name, capacity, directory, access mode
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cortex_core::{FramePublisher, PixelSource, PublisherConfig};
//!
//! let mut publisher = FramePublisher::new(PublisherConfig::default());
//! let pixels = vec![0u8; 1920 * 1080 * 4];
//! let _ = publisher.publish(&PixelSource::rgba(1920, 1080, &pixels));
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod memory;

pub use config::PublisherConfig;
pub use error::{CortexError, CortexResult};
pub use frame::{
    FrameHeader, FramePublisher, HeaderSnapshot, PixelFormat, PixelSource, PublishOutcome,
    PublishStats, PublisherState, RejectReason,
};
pub use memory::{FileSegmentBackend, SegmentBackend, ShmRegion, UnsupportedBackend};
