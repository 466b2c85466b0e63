//! # Shared memory plumbing for the frame channel
//!
//! - **ShmRegion**: named, file-backed segment mapped read-write
//! - **RegionView**: bounds-checked header/payload access into a mapping
//! - **SegmentBackend**: how a segment is acquired on this platform
//!
//! Content of a segment outlives the process that mapped it, so a restarted
//! producer finds the previous header and frame still in place.

pub mod backend;
pub mod platform;
pub mod shm_region;
pub mod view;

pub use backend::{default_backend, FileSegmentBackend, SegmentBackend, UnsupportedBackend};
pub use platform::*;
pub use shm_region::ShmRegion;
pub use view::{FrameRegion, RegionView};
