// Named shared memory segment backed by a memory-mapped file
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::view::RegionView;
use crate::error::{CortexError, CortexResult};

/// A mapped segment. Dropping it unmaps the view and closes the handle; the
/// backing file stays so readers keep the last frame across producer restarts.
#[derive(Debug)]
pub struct ShmRegion {
    mmap: MmapMut,
    size: usize,
    path: PathBuf,
    _file: File,
    owner: bool,
}

impl ShmRegion {
    /// Create the segment at `path`, or attach to it if another process got
    /// there first.
    ///
    /// A segment we create starts zeroed. An attached segment keeps its
    /// contents and is grown to `size` if shorter, never shrunk.
    pub fn create_or_open(path: &Path, size: usize, world_readable: bool) -> CortexResult<Self> {
        if size == 0 {
            return Err(CortexError::unavailable(path, "zero-sized segment"));
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let created = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path);

        let (file, is_owner) = match created {
            Ok(file) => {
                // Extends with zeros; no fill after mapping, since an
                // attacher may already be stamping the header
                file.set_len(size as u64)?;
                (file, true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let file = OpenOptions::new().read(true).write(true).open(path)?;
                if file.metadata()?.len() < size as u64 {
                    file.set_len(size as u64)?;
                }
                (file, false)
            }
            Err(e) => return Err(e.into()),
        };

        if is_owner {
            set_reader_access(path, world_readable)?;
        }

        // SAFETY: the file is sized to at least `size` above. Other processes
        // may write the same file; all shared fields are accessed atomically
        // and payload tearing is part of the protocol.
        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };

        log::info!(
            "{} shared segment {} ({} bytes)",
            if is_owner { "Created" } else { "Attached to" },
            path.display(),
            size
        );

        Ok(Self {
            mmap,
            size,
            path: path.to_path_buf(),
            _file: file,
            owner: is_owner,
        })
    }

    /// Bounds-checked view over the whole mapping
    pub fn view(&mut self) -> RegionView<'_> {
        RegionView::new(&mut self.mmap[..])
    }

    /// Read-only bytes of the mapping
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this process created the segment
    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        // The file is left in place on purpose; only the mapping goes away
        log::debug!("Released shared segment {}", self.path.display());
    }
}

/// Producer keeps read-write, everyone else may attach read-only.
#[cfg(unix)]
fn set_reader_access(path: &Path, world_readable: bool) -> CortexResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if world_readable { 0o644 } else { 0o600 };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Attach a NULL DACL so lower-integrity readers can open the segment.
#[cfg(windows)]
fn set_reader_access(path: &Path, world_readable: bool) -> CortexResult<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Security::{
        InitializeSecurityDescriptor, SetFileSecurityW, SetSecurityDescriptorDacl,
        DACL_SECURITY_INFORMATION, SECURITY_DESCRIPTOR,
    };

    const SECURITY_DESCRIPTOR_REVISION: u32 = 1;

    if !world_readable {
        return Ok(());
    }

    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
    // SAFETY: all-zero is a valid starting state for InitializeSecurityDescriptor
    let mut descriptor: SECURITY_DESCRIPTOR = unsafe { std::mem::zeroed() };
    let descriptor_ptr = &mut descriptor as *mut SECURITY_DESCRIPTOR as *mut core::ffi::c_void;

    // SAFETY: `descriptor` outlives every call and `wide` is NUL-terminated
    let ok = unsafe {
        InitializeSecurityDescriptor(descriptor_ptr, SECURITY_DESCRIPTOR_REVISION) != 0
            && SetSecurityDescriptorDacl(descriptor_ptr, 1, std::ptr::null(), 0) != 0
            && SetFileSecurityW(wide.as_ptr(), DACL_SECURITY_INFORMATION, descriptor_ptr) != 0
    };
    if !ok {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn set_reader_access(_path: &Path, _world_readable: bool) -> CortexResult<()> {
    // Never reached: the unsupported backend refuses before any file exists
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_attach() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cortex_region");

        let mut first = ShmRegion::create_or_open(&path, 4096, true).unwrap();
        assert!(first.is_owner());
        assert_eq!(first.size(), 4096);
        assert!(first.as_slice().iter().all(|&b| b == 0));

        first.view().zero_header().unwrap();
        first.view().into_frame().unwrap().write_payload(b"pixels").unwrap();

        let second = ShmRegion::create_or_open(&path, 4096, true).unwrap();
        assert!(!second.is_owner());
        assert_eq!(second.path(), path.as_path());
        // Attaching never clears what is already there
        assert_eq!(&second.as_slice()[160..166], b"pixels");
    }

    #[test]
    fn test_attach_grows_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cortex_short");
        std::fs::write(&path, [1u8; 100]).unwrap();

        let region = ShmRegion::create_or_open(&path, 8192, true).unwrap();
        assert!(!region.is_owner());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);
        assert_eq!(&region.as_slice()[..100], &[1u8; 100][..]);
    }

    #[test]
    fn test_file_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cortex_persist");

        drop(ShmRegion::create_or_open(&path, 4096, true).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_zero_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cortex_empty");
        assert!(matches!(
            ShmRegion::create_or_open(&path, 0, true),
            Err(CortexError::SegmentUnavailable { .. })
        ));
    }

    #[cfg(windows)]
    #[test]
    fn test_reader_access_null_dacl() {
        use windows_sys::Win32::Security::{
            GetFileSecurityW, GetSecurityDescriptorDacl, ACL, DACL_SECURITY_INFORMATION,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cortex_open");
        drop(ShmRegion::create_or_open(&path, 4096, true).unwrap());

        use std::os::windows::ffi::OsStrExt;
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
        let mut buf = vec![0u64; 512];
        let mut needed = 0u32;
        let mut present = 0i32;
        let mut defaulted = 0i32;
        let mut dacl: *mut ACL = std::ptr::null_mut();
        // SAFETY: buffer is 4096 bytes and 8-byte aligned; out-pointers are valid
        unsafe {
            assert_ne!(
                GetFileSecurityW(
                    wide.as_ptr(),
                    DACL_SECURITY_INFORMATION,
                    buf.as_mut_ptr() as *mut core::ffi::c_void,
                    (buf.len() * 8) as u32,
                    &mut needed,
                ),
                0
            );
            assert_ne!(
                GetSecurityDescriptorDacl(
                    buf.as_mut_ptr() as *mut core::ffi::c_void,
                    &mut present,
                    &mut dacl,
                    &mut defaulted,
                ),
                0
            );
        }
        // Present but NULL: everyone may open the file
        assert_ne!(present, 0);
        assert!(dacl.is_null());
    }

    #[cfg(unix)]
    #[test]
    fn test_reader_access_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();

        let open_path = dir.path().join("cortex_open");
        drop(ShmRegion::create_or_open(&open_path, 4096, true).unwrap());
        let mode = std::fs::metadata(&open_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);

        let private_path = dir.path().join("cortex_private");
        drop(ShmRegion::create_or_open(&private_path, 4096, false).unwrap());
        let mode = std::fs::metadata(&private_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
