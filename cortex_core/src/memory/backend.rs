//! Segment acquisition capability.
//!
//! The publisher never maps memory itself; it asks a [`SegmentBackend`].
//! Platforms without file-backed mapping get [`UnsupportedBackend`], which
//! always refuses, and the publisher goes quietly disabled.

use std::path::{Path, PathBuf};

use super::platform;
use super::shm_region::ShmRegion;
use crate::error::{CortexError, CortexResult};

/// Something that can hand out a named, fixed-capacity shared segment
pub trait SegmentBackend: Send {
    /// Create the segment `name` or attach to an existing one
    fn acquire(&self, name: &str, capacity: usize) -> CortexResult<ShmRegion>;

    /// Where `name` would live, if this backend has a notion of paths
    fn locate(&self, name: &str) -> Option<PathBuf>;

    /// Short label for diagnostics
    fn label(&self) -> &'static str;
}

/// Segments as memory-mapped files in a shared directory
#[derive(Debug, Clone)]
pub struct FileSegmentBackend {
    dir: PathBuf,
    world_readable: bool,
}

impl FileSegmentBackend {
    /// Backend rooted at the platform shared memory directory
    pub fn new() -> Self {
        Self::in_dir(platform::shm_base_dir())
    }

    /// Backend rooted at `dir`
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            world_readable: true,
        }
    }

    pub fn world_readable(mut self, world_readable: bool) -> Self {
        self.world_readable = world_readable;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for FileSegmentBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentBackend for FileSegmentBackend {
    fn acquire(&self, name: &str, capacity: usize) -> CortexResult<ShmRegion> {
        let path = platform::segment_path_in(&self.dir, name);
        ShmRegion::create_or_open(&path, capacity, self.world_readable).map_err(|e| match e {
            CortexError::Io(io) => CortexError::unavailable(&path, io.to_string()),
            other => other,
        })
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        Some(platform::segment_path_in(&self.dir, name))
    }

    fn label(&self) -> &'static str {
        "file"
    }
}

/// Backend for platforms without a shared mapping primitive
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedBackend;

impl SegmentBackend for UnsupportedBackend {
    fn acquire(&self, _name: &str, _capacity: usize) -> CortexResult<ShmRegion> {
        Err(CortexError::Unsupported(platform::platform_name()))
    }

    fn locate(&self, _name: &str) -> Option<PathBuf> {
        None
    }

    fn label(&self) -> &'static str {
        "unsupported"
    }
}

/// Best backend for this platform, honouring an optional directory override
pub fn default_backend(dir: Option<&Path>, world_readable: bool) -> Box<dyn SegmentBackend> {
    if !platform::supports_file_mapping() {
        return Box::new(UnsupportedBackend);
    }

    let backend = match dir {
        Some(dir) => FileSegmentBackend::in_dir(dir),
        None => FileSegmentBackend::new(),
    };
    Box::new(backend.world_readable(world_readable))
}
