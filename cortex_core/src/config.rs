//! Configuration for the frame publisher
//!
//! Defaults match the well-known segment every reader expects. A deployment can
//! still point the publisher elsewhere through a TOML/YAML file or environment
//! variables.

use crate::error::{CortexError, CortexResult};
use crate::frame::header::HEADER_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Well-known name of the frame segment
pub const DEFAULT_SEGMENT_NAME: &str = "VisualCortex_V3";

/// Fixed segment capacity (16 MiB, enough for a 4K RGBA frame minus header)
pub const DEFAULT_CAPACITY: usize = 16 * 1024 * 1024;

/// Publishes between two "wrote frame" debug lines
pub const DEFAULT_LOG_EVERY_N_FRAMES: u64 = 60;

/// Environment variable overriding the segment name
pub const ENV_SEGMENT_NAME: &str = "CORTEX_SEGMENT_NAME";
/// Environment variable overriding the shared memory directory
pub const ENV_SHM_DIR: &str = "CORTEX_SHM_DIR";
/// Environment variable overriding the segment capacity in bytes
pub const ENV_CAPACITY: &str = "CORTEX_CAPACITY";

/// Frame publisher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Segment name shared with every reader
    pub segment_name: String,

    /// Total segment size in bytes, header included
    pub capacity: usize,

    /// Directory holding the segment (platform default when unset)
    pub shm_dir: Option<PathBuf>,

    /// Let lower-privilege readers attach read-only
    pub world_readable: bool,

    /// Emit a debug line every N publishes (0 disables)
    pub log_every_n_frames: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            segment_name: DEFAULT_SEGMENT_NAME.to_string(),
            capacity: DEFAULT_CAPACITY,
            shm_dir: None,
            world_readable: true,
            log_every_n_frames: DEFAULT_LOG_EVERY_N_FRAMES,
        }
    }
}

impl PublisherConfig {
    /// Load config from a file (auto-detect format)
    pub fn from_file<P: AsRef<Path>>(path: P) -> CortexResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CortexError::config(format!("Failed to read config file: {}", e)))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml(&contents)?,
            Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
            _ => Self::from_toml(&contents).or_else(|_| Self::from_yaml(&contents))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse config from TOML string
    pub fn from_toml(contents: &str) -> CortexResult<Self> {
        toml::from_str(contents)
            .map_err(|e| CortexError::config(format!("Failed to parse TOML: {}", e)))
    }

    /// Parse config from YAML string
    pub fn from_yaml(contents: &str) -> CortexResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| CortexError::config(format!("Failed to parse YAML: {}", e)))
    }

    /// Check that the values describe a usable segment
    pub fn validate(&self) -> CortexResult<()> {
        if self.segment_name.trim().is_empty() {
            return Err(CortexError::config("segment_name must not be empty"));
        }
        if self.capacity <= HEADER_SIZE {
            return Err(CortexError::config(format!(
                "capacity {} leaves no room for pixels after the {}-byte header",
                self.capacity, HEADER_SIZE
            )));
        }
        Ok(())
    }

    /// Apply `CORTEX_*` environment variables on top of this config
    pub fn with_env_overrides(self) -> CortexResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> CortexResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_SEGMENT_NAME) {
            self.segment_name = name;
        }
        if let Some(dir) = lookup(ENV_SHM_DIR) {
            self.shm_dir = Some(PathBuf::from(dir));
        }
        if let Some(capacity) = lookup(ENV_CAPACITY) {
            self.capacity = capacity.trim().parse().map_err(|_| {
                CortexError::config(format!("{} is not a byte count: {}", ENV_CAPACITY, capacity))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Bytes available for pixel data
    pub fn payload_capacity(&self) -> usize {
        self.capacity.saturating_sub(HEADER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PublisherConfig::default();
        assert_eq!(config.segment_name, "VisualCortex_V3");
        assert_eq!(config.capacity, 16 * 1024 * 1024);
        assert_eq!(config.payload_capacity(), 16 * 1024 * 1024 - 160);
        assert!(config.world_readable);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            segment_name = "cortex_test"
            capacity = 4194304
            shm_dir = "/tmp/cortex"
            log_every_n_frames = 0
        "#;

        let config = PublisherConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.segment_name, "cortex_test");
        assert_eq!(config.capacity, 4 * 1024 * 1024);
        assert_eq!(config.shm_dir, Some(PathBuf::from("/tmp/cortex")));
        assert_eq!(config.log_every_n_frames, 0);
        // Unset fields keep their defaults
        assert!(config.world_readable);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml_str = r#"
            segment_name: cortex_yaml
            world_readable: false
        "#;

        let config = PublisherConfig::from_yaml(yaml_str).unwrap();
        assert_eq!(config.segment_name, "cortex_yaml");
        assert!(!config.world_readable);
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_from_file_autodetect() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("cortex.toml");
        std::fs::write(&toml_path, "segment_name = \"from_toml\"\n").unwrap();
        assert_eq!(
            PublisherConfig::from_file(&toml_path).unwrap().segment_name,
            "from_toml"
        );

        let other_path = dir.path().join("cortex.conf");
        std::fs::write(&other_path, "segment_name: from_yaml\n").unwrap();
        assert_eq!(
            PublisherConfig::from_file(&other_path).unwrap().segment_name,
            "from_yaml"
        );
    }

    #[test]
    fn test_validate_rejects_tiny_capacity() {
        let config = PublisherConfig {
            capacity: HEADER_SIZE,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CortexError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SEGMENT_NAME, "override"),
            (ENV_SHM_DIR, "/run/cortex"),
            (ENV_CAPACITY, "1048576"),
        ]
        .into_iter()
        .collect();

        let config = PublisherConfig::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.segment_name, "override");
        assert_eq!(config.shm_dir, Some(PathBuf::from("/run/cortex")));
        assert_eq!(config.capacity, 1024 * 1024);
    }

    #[test]
    fn test_override_bad_capacity() {
        let result = PublisherConfig::default().with_overrides_from(|key| {
            (key == ENV_CAPACITY).then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }
}
