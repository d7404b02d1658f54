//! Configuration system for the Lantern signaling hub.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/lantern-hub/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

use crate::rooms::DEFAULT_MAX_ROOMS;

/// Default maximum accepted frame size in bytes (64 KB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Errors that can occur when loading hub configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the hub.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HubConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the hub config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_message_size: Option<usize>,
    max_rooms: Option<usize>,
    static_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the signaling hub.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Lantern signaling hub")]
pub struct HubCliArgs {
    /// Address to bind the hub to.
    #[arg(short, long, env = "LANTERN_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/lantern-hub/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum accepted message size in bytes.
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// Maximum number of simultaneous rooms.
    #[arg(long)]
    pub max_rooms: Option<usize>,

    /// Directory holding the browser client to serve over HTTP.
    #[arg(long, env = "LANTERN_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "LANTERN_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Frames larger than this many bytes are dropped.
    pub max_message_size: usize,
    /// Joins that would create a room beyond this count are denied.
    pub max_rooms: usize,
    /// Optional directory served for all non-API paths.
    pub static_dir: Option<PathBuf>,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_rooms: DEFAULT_MAX_ROOMS,
            static_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl HubConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &HubCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &HubCliArgs, file: &HubConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_message_size: cli
                .max_message_size
                .or(file.server.max_message_size)
                .unwrap_or(defaults.max_message_size),
            max_rooms: cli
                .max_rooms
                .or(file.server.max_rooms)
                .unwrap_or(defaults.max_rooms),
            static_dir: cli
                .static_dir
                .clone()
                .or_else(|| file.server.static_dir.clone()),
            log_level: cli.log_level.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the hub.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<HubConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(HubConfigFile::default());
    };
    let path = config_dir.join("lantern-hub").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HubConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
