// Cross-platform shared memory path rules
//
// Linux: /dev/shm/visual_cortex (tmpfs - RAM-backed)
// macOS: /tmp/visual_cortex
// Windows: %TEMP%\visual_cortex

use std::path::{Path, PathBuf};

/// Prefix of every segment file name
const SEGMENT_FILE_PREFIX: &str = "cortex_";

/// Get the base directory for visual cortex segments
///
/// - Linux: `/dev/shm/visual_cortex` (tmpfs)
/// - macOS: `/tmp/visual_cortex` (no /dev/shm)
/// - Windows: `%TEMP%\visual_cortex`
pub fn shm_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/dev/shm/visual_cortex")
    }

    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/tmp/visual_cortex")
    }

    #[cfg(target_os = "windows")]
    {
        std::env::temp_dir().join("visual_cortex")
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        PathBuf::from("/tmp/visual_cortex")
    }
}

/// Turn a segment name into a file name safe on every platform
pub fn segment_file_name(name: &str) -> String {
    let safe_name: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    format!("{}{}", SEGMENT_FILE_PREFIX, safe_name)
}

/// Full path of the segment `name` inside `dir`
pub fn segment_path_in(dir: &Path, name: &str) -> PathBuf {
    dir.join(segment_file_name(name))
}

/// Full path of the segment `name` in the platform directory
pub fn segment_path(name: &str) -> PathBuf {
    segment_path_in(&shm_base_dir(), name)
}

/// Check if this platform can map a named segment at all
pub fn supports_file_mapping() -> bool {
    cfg!(any(unix, windows))
}

/// Get platform name for logging/diagnostics
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "linux")]
    { "Linux" }

    #[cfg(target_os = "macos")]
    { "macOS" }

    #[cfg(target_os = "windows")]
    { "Windows" }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    { "Unix" }
}
