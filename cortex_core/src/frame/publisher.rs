//! Frame publisher: the producer end of the frame channel.
//!
//! The renderer calls [`FramePublisher::publish`] once per frame from its own
//! thread. A publish copies the pixels into the segment, updates the header
//! metadata and then bumps `frame_index` with a single Release increment.
//! Nothing else is synchronized. Observers that read the payload while a
//! publish is in flight may see a torn frame; that is accepted in exchange
//! for never stalling the render path.
//!
//! Failures never reach the caller. A segment that cannot be acquired moves
//! the publisher to [`PublisherState::Disabled`] for good, and rejected frames
//! are dropped and logged.

use std::fmt;
use std::path::PathBuf;

use super::header::{FrameHeader, HeaderSnapshot, HEADER_SIZE};
use super::source::PixelSource;
use crate::config::PublisherConfig;
use crate::error::CortexResult;
use crate::memory::{default_backend, SegmentBackend, ShmRegion};

/// Lifecycle of a publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    /// No segment acquired yet
    Uninitialized,
    /// Acquiring the segment and checking its header
    Initializing,
    /// Segment mapped, header valid
    Ready,
    /// Acquisition failed; every publish is a no-op from now on
    Disabled,
}

impl fmt::Display for PublisherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublisherState::Uninitialized => write!(f, "uninitialized"),
            PublisherState::Initializing => write!(f, "initializing"),
            PublisherState::Ready => write!(f, "ready"),
            PublisherState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Why a frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Header plus pixels would not fit in the segment
    Oversized { required: usize, capacity: usize },
    /// Source had no backing memory or zero bytes
    EmptySource,
    /// Buffer shorter than `row_bytes * height`
    ShortBuffer { required: usize, available: usize },
    /// Stride cannot hold `width` RGBA pixels
    BadStride { row_bytes: u32, min_row_bytes: u64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Oversized { required, capacity } => {
                write!(f, "frame needs {} bytes, segment holds {}", required, capacity)
            }
            RejectReason::EmptySource => write!(f, "empty pixel source"),
            RejectReason::ShortBuffer {
                required,
                available,
            } => write!(
                f,
                "pixel buffer holds {} bytes, stride and height need {}",
                available, required
            ),
            RejectReason::BadStride {
                row_bytes,
                min_row_bytes,
            } => write!(f, "stride {} below row size {}", row_bytes, min_row_bytes),
        }
    }
}

/// What happened to one publish call. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Frame is in the segment and announced under this index
    Published { frame_index: u64 },
    /// Frame dropped; the previous frame stays visible
    Rejected(RejectReason),
    /// Publisher has no segment
    Disabled,
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }

    pub fn frame_index(&self) -> Option<u64> {
        match self {
            PublishOutcome::Published { frame_index } => Some(*frame_index),
            _ => None,
        }
    }
}

/// Running counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub rejected_oversized: u64,
    pub rejected_empty: u64,
    pub rejected_invalid: u64,
}

/// Sole writer of the shared frame segment
pub struct FramePublisher {
    config: PublisherConfig,
    backend: Box<dyn SegmentBackend>,
    region: Option<ShmRegion>,
    state: PublisherState,
    stats: PublishStats,
}

impl FramePublisher {
    /// Publisher on the platform backend described by `config`
    pub fn new(config: PublisherConfig) -> Self {
        let backend = default_backend(config.shm_dir.as_deref(), config.world_readable);
        Self::with_backend(config, backend)
    }

    /// Publisher acquiring its segment through `backend`
    pub fn with_backend(config: PublisherConfig, backend: Box<dyn SegmentBackend>) -> Self {
        Self {
            config,
            backend,
            region: None,
            state: PublisherState::Uninitialized,
            stats: PublishStats::default(),
        }
    }

    /// Acquire the segment and make sure it carries a valid header.
    ///
    /// Idempotent. On failure the publisher is disabled and stays that way.
    pub fn initialize(&mut self) {
        if matches!(self.state, PublisherState::Ready | PublisherState::Disabled) {
            return;
        }

        self.state = PublisherState::Initializing;
        match self.acquire() {
            Ok(region) => {
                self.region = Some(region);
                self.state = PublisherState::Ready;
            }
            Err(e) => {
                log::error!(
                    "Frame publisher disabled: cannot acquire segment '{}' via {} backend: {}",
                    self.config.segment_name,
                    self.backend.label(),
                    e
                );
                self.region = None;
                self.state = PublisherState::Disabled;
            }
        }
    }

    fn acquire(&self) -> CortexResult<ShmRegion> {
        self.config.validate()?;

        let mut region = self
            .backend
            .acquire(&self.config.segment_name, self.config.capacity)?;

        let mut view = region.view();
        let linked = {
            let header = view.header()?;
            header.has_magic().then(|| header.frame_index())
        };

        match linked {
            Some(frame_index) => {
                log::info!(
                    "Linked to existing frame header (frame_index={})",
                    frame_index
                );
            }
            None => {
                view.zero_header()?;
                view.header()?.write_identity();
                log::info!("Initialized new frame header");
            }
        }

        Ok(region)
    }

    /// Copy `source` into the segment and announce it.
    ///
    /// Never blocks beyond the pixel copy and never fails the caller.
    pub fn publish(&mut self, source: &PixelSource<'_>) -> PublishOutcome {
        if self.state != PublisherState::Ready {
            self.initialize();
        }
        let Some(region) = self.region.as_mut() else {
            return PublishOutcome::Disabled;
        };

        let capacity = region.size();
        let payload_len = source.payload_len();
        let required = payload_len
            .and_then(|len| HEADER_SIZE.checked_add(len))
            .unwrap_or(usize::MAX);
        if required > capacity {
            log::warn!(
                "Frame too big: {}x{} at stride {} needs {} bytes, {} available",
                source.width(),
                source.height(),
                source.row_bytes(),
                required.saturating_sub(HEADER_SIZE),
                capacity.saturating_sub(HEADER_SIZE)
            );
            self.stats.rejected_oversized += 1;
            return PublishOutcome::Rejected(RejectReason::Oversized { required, capacity });
        }
        let payload_len = required - HEADER_SIZE;

        let pixels = match source.pixels() {
            Some(pixels) if !pixels.is_empty() && payload_len > 0 => pixels,
            _ => {
                log::warn!("Empty pixel source, frame skipped");
                self.stats.rejected_empty += 1;
                return PublishOutcome::Rejected(RejectReason::EmptySource);
            }
        };

        if u64::from(source.row_bytes()) < source.min_row_bytes() {
            log::warn!(
                "Bad stride: {} bytes for {} RGBA pixels, frame skipped",
                source.row_bytes(),
                source.width()
            );
            self.stats.rejected_invalid += 1;
            return PublishOutcome::Rejected(RejectReason::BadStride {
                row_bytes: source.row_bytes(),
                min_row_bytes: source.min_row_bytes(),
            });
        }

        let Some(frame_bytes) = pixels.get(..payload_len) else {
            log::warn!(
                "Short pixel buffer: {} bytes, {}x{} at stride {} needs {}",
                pixels.len(),
                source.width(),
                source.height(),
                source.row_bytes(),
                payload_len
            );
            self.stats.rejected_invalid += 1;
            return PublishOutcome::Rejected(RejectReason::ShortBuffer {
                required: payload_len,
                available: pixels.len(),
            });
        };

        let timestamp_us = chrono::Utc::now().timestamp_micros();
        match write_frame(region, source, frame_bytes, timestamp_us) {
            Ok(frame_index) => {
                self.stats.published += 1;
                let every = self.config.log_every_n_frames;
                if every > 0 && frame_index % every == 0 {
                    log::debug!(
                        "Wrote frame {} ({}x{})",
                        frame_index,
                        source.width(),
                        source.height()
                    );
                }
                PublishOutcome::Published { frame_index }
            }
            Err(e) => {
                log::error!("Frame publisher disabled: segment unusable: {}", e);
                self.region = None;
                self.state = PublisherState::Disabled;
                PublishOutcome::Disabled
            }
        }
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == PublisherState::Ready
    }

    pub fn is_disabled(&self) -> bool {
        self.state == PublisherState::Disabled
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Live header as readers see it, once the segment is mapped
    pub fn header_snapshot(&self) -> Option<HeaderSnapshot> {
        let region = self.region.as_ref()?;
        FrameHeader::from_bytes(region.as_slice())
            .ok()
            .map(FrameHeader::snapshot)
    }

    /// Current `frame_index`, once the segment is mapped
    pub fn frame_index(&self) -> Option<u64> {
        self.header_snapshot().map(|h| h.frame_index)
    }

    /// Location of the segment, mapped or not
    pub fn segment_path(&self) -> Option<PathBuf> {
        match &self.region {
            Some(region) => Some(region.path().to_path_buf()),
            None => self.backend.locate(&self.config.segment_name),
        }
    }
}

impl fmt::Debug for FramePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePublisher")
            .field("segment", &self.config.segment_name)
            .field("backend", &self.backend.label())
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Drop for FramePublisher {
    fn drop(&mut self) {
        if self.region.is_some() {
            log::info!(
                "Frame publisher shutting down after {} frames ({} oversized, {} empty, {} invalid)",
                self.stats.published,
                self.stats.rejected_oversized,
                self.stats.rejected_empty,
                self.stats.rejected_invalid
            );
        }
    }
}

/// Payload first, then metadata, then the Release bump that announces both.
/// `pixels` is exactly `row_bytes * height` bytes.
fn write_frame(
    region: &mut ShmRegion,
    source: &PixelSource<'_>,
    pixels: &[u8],
    timestamp_us: i64,
) -> CortexResult<u64> {
    let mut frame = region.view().into_frame()?;
    frame.write_payload(pixels)?;

    let header = frame.header();
    header.store_frame_meta(
        source.width(),
        source.height(),
        source.row_bytes(),
        timestamp_us,
    );
    Ok(header.advance_frame_index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FileSegmentBackend, UnsupportedBackend};

    fn small_config() -> PublisherConfig {
        PublisherConfig {
            segment_name: "unit".to_string(),
            capacity: HEADER_SIZE + 1024,
            ..Default::default()
        }
    }

    #[test]
    fn test_state_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut publisher = FramePublisher::with_backend(
            small_config(),
            Box::new(FileSegmentBackend::in_dir(dir.path())),
        );
        assert_eq!(publisher.state(), PublisherState::Uninitialized);
        assert_eq!(publisher.frame_index(), None);

        publisher.initialize();
        assert!(publisher.is_ready());
        assert_eq!(publisher.frame_index(), Some(0));

        // Second call is a no-op
        publisher.initialize();
        assert!(publisher.is_ready());
    }

    #[test]
    fn test_lazy_initialize_on_publish() {
        let dir = tempfile::tempdir().unwrap();
        let mut publisher = FramePublisher::with_backend(
            small_config(),
            Box::new(FileSegmentBackend::in_dir(dir.path())),
        );

        let pixels = [1u8; 64];
        let outcome = publisher.publish(&PixelSource::rgba(4, 4, &pixels));
        assert_eq!(outcome, PublishOutcome::Published { frame_index: 1 });
        assert!(publisher.is_ready());
        assert_eq!(publisher.stats().published, 1);
    }

    #[test]
    fn test_unsupported_backend_disables() {
        let mut publisher = FramePublisher::with_backend(small_config(), Box::new(UnsupportedBackend));
        publisher.initialize();
        assert!(publisher.is_disabled());
        assert_eq!(publisher.segment_path(), None);

        let pixels = [1u8; 64];
        assert_eq!(
            publisher.publish(&PixelSource::rgba(4, 4, &pixels)),
            PublishOutcome::Disabled
        );
        assert_eq!(publisher.state(), PublisherState::Disabled);
        assert_eq!(publisher.stats(), PublishStats::default());
    }

    #[test]
    fn test_invalid_config_disables() {
        let dir = tempfile::tempdir().unwrap();
        let config = PublisherConfig {
            capacity: 16,
            ..small_config()
        };
        let mut publisher =
            FramePublisher::with_backend(config, Box::new(FileSegmentBackend::in_dir(dir.path())));
        publisher.initialize();
        assert!(publisher.is_disabled());
    }

    #[test]
    fn test_outcome_helpers() {
        let ok = PublishOutcome::Published { frame_index: 3 };
        assert!(ok.is_published());
        assert_eq!(ok.frame_index(), Some(3));

        let rejected = PublishOutcome::Rejected(RejectReason::EmptySource);
        assert!(!rejected.is_published());
        assert_eq!(rejected.frame_index(), None);
        assert_eq!(RejectReason::EmptySource.to_string(), "empty pixel source");
        assert_eq!(PublisherState::Disabled.to_string(), "disabled");
    }
}
