//! Tuning and platform-limit configuration.
//!
//! Parsed from a TOML file of the form:
//!
//! ```toml
//! [tuning]
//! parallel-threshold = 1024
//! tile-x = 4
//! tile-y = 4
//! max-channel-groups-per-workgroup = 32
//!
//! [limits]
//! max-shared-memory-bytes = 32768
//! max-invocations = 1024
//! max-workgroup-size = [1024, 1024, 64]
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Element count (height * width) at which the parallel tree reduction
/// starts to beat one invocation walking the whole plane.
///
/// Below this, the barrier and the shared-memory round trip cost more than
/// the serial loop saves. The value tracks GPU occupancy and should be
/// re-measured per target; 1024 (a 32x32 plane) is where mid-range mobile
/// GPUs were observed to cross over.
pub const DEFAULT_PARALLEL_THRESHOLD: u64 = 1024;

/// Threads along x in one parallel workgroup.
pub const DEFAULT_TILE_X: u32 = 4;

/// Threads along y in one parallel workgroup.
pub const DEFAULT_TILE_Y: u32 = 4;

/// Upper bound on channel groups handled by one workgroup.
pub const DEFAULT_MAX_CHANNEL_GROUPS: u32 = 32;

/// Strategy and tile-shape tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TuningConfig {
    /// Element counts at or above this select the parallel tree reduction.
    pub parallel_threshold: u64,
    pub tile_x: u32,
    pub tile_y: u32,
    pub max_channel_groups_per_workgroup: u32,
}

impl Default for TuningConfig {
    fn default() -> Self {
        TuningConfig {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            tile_x: DEFAULT_TILE_X,
            tile_y: DEFAULT_TILE_Y,
            max_channel_groups_per_workgroup: DEFAULT_MAX_CHANNEL_GROUPS,
        }
    }
}

impl TuningConfig {
    /// Reject knob values that cannot produce a usable workgroup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_x == 0 || self.tile_y == 0 {
            return Err(ConfigError::Invalid(format!(
                "tile shape must be non-zero, got {}x{}",
                self.tile_x, self.tile_y
            )));
        }
        if self.max_channel_groups_per_workgroup == 0 {
            return Err(ConfigError::Invalid(
                "max-channel-groups-per-workgroup must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Threads cooperating on one channel group's plane.
    pub fn threads_per_plane(&self) -> u64 {
        u64::from(self.tile_x) * u64::from(self.tile_y)
    }
}

/// Compute limits of the target device.
///
/// Defaults describe a typical desktop OpenGL 4.3 / ES 3.1+ device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DeviceLimits {
    pub max_shared_memory_bytes: u64,
    pub max_invocations: u32,
    pub max_workgroup_size: [u32; 3],
}

impl Default for DeviceLimits {
    fn default() -> Self {
        DeviceLimits {
            max_shared_memory_bytes: 32768,
            max_invocations: 1024,
            max_workgroup_size: [1024, 1024, 64],
        }
    }
}

impl DeviceLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_invocations == 0 || self.max_workgroup_size.contains(&0) {
            return Err(ConfigError::Invalid(
                "device limits must allow at least one invocation per dimension".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanforgeConfig {
    pub tuning: TuningConfig,
    pub limits: DeviceLimits,
}

impl MeanforgeConfig {
    /// Parse and validate a TOML configuration string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MeanforgeConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.tuning.validate()?;
        config.limits.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        log::debug!("loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File could not be read
    Io(String),

    /// Not valid TOML, or keys have the wrong type
    Parse(String),

    /// Well-formed but unusable values
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
            ConfigError::Invalid(e) => write!(f, "invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let toml = r#"
[tuning]
parallel-threshold = 4096
tile-x = 8
tile-y = 8
max-channel-groups-per-workgroup = 16

[limits]
max-shared-memory-bytes = 16384
max-invocations = 256
max-workgroup-size = [256, 256, 32]
"#;
        let config = MeanforgeConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.tuning.parallel_threshold, 4096);
        assert_eq!(config.tuning.threads_per_plane(), 64);
        assert_eq!(config.tuning.max_channel_groups_per_workgroup, 16);
        assert_eq!(config.limits.max_shared_memory_bytes, 16384);
        assert_eq!(config.limits.max_workgroup_size, [256, 256, 32]);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = MeanforgeConfig::from_toml_str("[tuning]\ntile-x = 2\n").unwrap();
        assert_eq!(config.tuning.tile_x, 2);
        assert_eq!(config.tuning.tile_y, DEFAULT_TILE_Y);
        assert_eq!(config.tuning.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
        assert_eq!(config.limits, DeviceLimits::default());

        let empty = MeanforgeConfig::from_toml_str("").unwrap();
        assert_eq!(empty, MeanforgeConfig::default());
    }

    #[test]
    fn test_zero_tile_rejected() {
        let err = MeanforgeConfig::from_toml_str("[tuning]\ntile-y = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err =
            MeanforgeConfig::from_toml_str("[limits]\nmax-workgroup-size = [64, 64, 0]\n")
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_type_is_parse_error() {
        let err =
            MeanforgeConfig::from_toml_str("[tuning]\ntile-x = \"four\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_oversized_tile_threads_do_not_wrap() {
        let config = MeanforgeConfig::from_toml_str(
            "[tuning]\ntile-x = 70000\ntile-y = 70000\n",
        )
        .unwrap();
        assert_eq!(config.tuning.threads_per_plane(), 4_900_000_000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MeanforgeConfig::load(Path::new("/nonexistent/meanforge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
