//! Configuration file support
//!
//! Loads server configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{AudioConfig, LimitsConfig, ServerConfig, StorageConfig, TimeoutConfig};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Storage settings
    pub storage: Option<StorageSettings>,
    /// Audio output settings
    pub audio: Option<AudioSettings>,
    /// Time limits
    pub timeouts: Option<TimeoutSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Limits settings
    pub limits: Option<LimitsSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub upload_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Sample rate for AAC output
    pub sample_rate: u32,
    /// AAC bitrate in bps
    pub aac_bitrate: u64,
    /// Output channel count
    pub channels: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    pub probe_secs: Option<u64>,
    pub render_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Maximum background files per request
    pub max_background_tracks: Option<usize>,
    /// Maximum request body size in MB
    pub max_request_size_mb: Option<usize>,
    /// Renders allowed to run at once
    pub max_concurrent_renders: Option<usize>,
    /// Seconds a request may wait for a render slot
    pub render_queue_secs: Option<u64>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
                cors_enabled: Some(defaults.cors_enabled),
            },
            storage: Some(StorageSettings {
                upload_dir: Some(defaults.storage.upload_dir),
                output_dir: Some(defaults.storage.output_dir),
            }),
            audio: Some(AudioSettings {
                sample_rate: defaults.audio.sample_rate,
                aac_bitrate: defaults.audio.aac_bitrate,
                channels: Some(defaults.audio.channels),
            }),
            timeouts: Some(TimeoutSettings {
                probe_secs: Some(defaults.timeouts.probe_secs),
                render_secs: Some(defaults.timeouts.render_secs),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
            limits: Some(LimitsSettings {
                max_background_tracks: Some(defaults.limits.max_background_tracks),
                max_request_size_mb: Some(defaults.limits.max_request_size_mb),
                max_concurrent_renders: Some(defaults.limits.max_concurrent_renders),
                render_queue_secs: Some(defaults.limits.render_queue_secs),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let storage_defaults = StorageConfig::default();
        let audio_defaults = AudioConfig::default();
        let timeout_defaults = TimeoutConfig::default();
        let limit_defaults = LimitsConfig::default();

        let storage = self.storage.map_or(storage_defaults.clone(), |s| StorageConfig {
            upload_dir: s.upload_dir.unwrap_or(storage_defaults.upload_dir),
            output_dir: s.output_dir.unwrap_or(storage_defaults.output_dir),
        });

        let audio = self.audio.map_or(audio_defaults.clone(), |a| AudioConfig {
            sample_rate: a.sample_rate,
            channels: a.channels.unwrap_or(audio_defaults.channels),
            aac_bitrate: a.aac_bitrate,
        });

        let timeouts = self.timeouts.map_or(timeout_defaults.clone(), |t| TimeoutConfig {
            probe_secs: t.probe_secs.unwrap_or(timeout_defaults.probe_secs),
            render_secs: t.render_secs.unwrap_or(timeout_defaults.render_secs),
        });

        let limits = self.limits.map_or(limit_defaults.clone(), |l| LimitsConfig {
            max_background_tracks: l
                .max_background_tracks
                .unwrap_or(limit_defaults.max_background_tracks),
            max_request_size_mb: l
                .max_request_size_mb
                .unwrap_or(limit_defaults.max_request_size_mb),
            max_concurrent_renders: l
                .max_concurrent_renders
                .unwrap_or(limit_defaults.max_concurrent_renders),
            render_queue_secs: l.render_queue_secs.unwrap_or(limit_defaults.render_queue_secs),
        });

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or_else(|| "pretty".to_string())),
            None => ("info".to_string(), "pretty".to_string()),
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            storage,
            audio,
            timeouts,
            limits,
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            log_level,
            log_format,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}

/// Load the server configuration from `path`, falling back to defaults when
/// the file is missing or invalid.
pub fn load_or_default(path: &str) -> ServerConfig {
    if !Path::new(path).exists() {
        tracing::info!("No config file at {}. Using defaults.", path);
        return ServerConfig::default();
    }
    match ConfigFile::from_file(path) {
        Ok(cf) => cf.into_server_config(),
        Err(e) => {
            tracing::warn!("Failed to load config file {}: {}. Using defaults.", path, e);
            ServerConfig::default()
        }
    }
}
