//! Configuration file support for bufferorch.
//!
//! Loads and validates the hardware profile and logging settings from TOML.
//! Default location: /etc/sonic/bufferorch.toml

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::ReductionKind;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Buffer memory layout of the switch ASIC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Total shared buffer memory in bytes
    #[serde(default = "default_total_buffer_bytes")]
    pub total_buffer_bytes: u64,

    /// Maximum number of pools per direction
    #[serde(default = "default_max_pools_per_direction")]
    pub max_pools_per_direction: u32,

    /// Number of buffer tiles (1 = non-tiled)
    #[serde(default = "default_tile_count")]
    pub tile_count: u32,

    /// Number of front panel ports brought up at start
    #[serde(default = "default_port_count")]
    pub port_count: u32,

    /// Ingress priority groups per port
    #[serde(default = "default_pgs_per_port")]
    pub pgs_per_port: u32,

    /// Egress queues per port
    #[serde(default = "default_queues_per_port")]
    pub queues_per_port: u32,

    /// Contiguous ports per tile, used when `port_tiles` has no entry
    #[serde(default)]
    pub ports_per_tile: Option<u32>,

    /// Explicit tile of each hardware port, indexed by port number
    #[serde(default)]
    pub port_tiles: Vec<u32>,

    /// How per-tile reservations fold into a pool's shared size
    #[serde(default)]
    pub reduction: ReductionKind,

    /// Buffer slices each reservation is replicated into
    #[serde(default = "default_replication")]
    pub replication: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

/// Complete bufferorch configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferOrchConfig {
    #[serde(default)]
    pub hardware: HardwareProfile,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_total_buffer_bytes() -> u64 {
    32 * 1024 * 1024
}

fn default_max_pools_per_direction() -> u32 {
    4
}

fn default_tile_count() -> u32 {
    1
}

fn default_port_count() -> u32 {
    32
}

fn default_pgs_per_port() -> u32 {
    8
}

fn default_queues_per_port() -> u32 {
    8
}

fn default_replication() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            total_buffer_bytes: default_total_buffer_bytes(),
            max_pools_per_direction: default_max_pools_per_direction(),
            tile_count: default_tile_count(),
            port_count: default_port_count(),
            pgs_per_port: default_pgs_per_port(),
            queues_per_port: default_queues_per_port(),
            ports_per_tile: None,
            port_tiles: Vec::new(),
            reduction: ReductionKind::default(),
            replication: default_replication(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl BufferOrchConfig {
    /// Parses a TOML document.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Loads and validates configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&content, &path.display().to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let hw = &self.hardware;

        if hw.total_buffer_bytes == 0 {
            return Err(ConfigError::Invalid(
                "total_buffer_bytes must be > 0".to_string(),
            ));
        }

        if hw.max_pools_per_direction == 0 {
            return Err(ConfigError::Invalid(
                "max_pools_per_direction must be > 0".to_string(),
            ));
        }

        if hw.tile_count == 0 {
            return Err(ConfigError::Invalid("tile_count must be > 0".to_string()));
        }

        if hw.replication == 0 {
            return Err(ConfigError::Invalid("replication must be > 0".to_string()));
        }

        if hw.ports_per_tile == Some(0) {
            return Err(ConfigError::Invalid(
                "ports_per_tile must be > 0".to_string(),
            ));
        }

        if let Some(tile) = hw.port_tiles.iter().find(|t| **t >= hw.tile_count) {
            return Err(ConfigError::Invalid(format!(
                "port_tiles entry {} exceeds tile_count {}",
                tile, hw.tile_count
            )));
        }

        if hw.tile_count > 1 && hw.ports_per_tile.is_none() && hw.port_tiles.is_empty() {
            return Err(ConfigError::Invalid(
                "tiled hardware needs ports_per_tile or port_tiles".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BufferOrchConfig::default();
        assert_eq!(config.hardware.total_buffer_bytes, 33_554_432);
        assert_eq!(config.hardware.tile_count, 1);
        assert_eq!(config.hardware.reduction, ReductionKind::BroadcastMax);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BufferOrchConfig::from_toml(
            r#"
            [hardware]
            tile_count = 4
            ports_per_tile = 8
            replication = 2
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.hardware.tile_count, 4);
        assert_eq!(config.hardware.ports_per_tile, Some(8));
        assert_eq!(config.hardware.max_pools_per_direction, 4);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [hardware]
            total_buffer_bytes = 10485760
            tile_count = 2
            port_tiles = [0, 0, 1, 1]
            reduction = "per_tile_sum"

            [logging]
            level = "debug"
            json = true
            "#
        )
        .unwrap();

        let config = BufferOrchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.hardware.total_buffer_bytes, 10_485_760);
        assert_eq!(config.hardware.port_tiles, vec![0, 0, 1, 1]);
        assert_eq!(config.hardware.reduction, ReductionKind::PerTileSum);
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BufferOrchConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = BufferOrchConfig::from_toml("[hardware]\ntile_count = \"four\"", "inline")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_tiles() {
        let mut config = BufferOrchConfig::default();
        config.hardware.tile_count = 2;
        assert!(config.validate().is_err());

        config.hardware.port_tiles = vec![0, 2];
        assert!(config.validate().is_err());

        config.hardware.port_tiles = vec![0, 1];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = BufferOrchConfig::default();
        config.hardware.total_buffer_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = BufferOrchConfig::default();
        config.hardware.replication = 0;
        assert!(config.validate().is_err());
    }
}
