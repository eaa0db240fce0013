//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use mixdown_lib::{CompositorOptions, RenderSettings};

/// Upload and artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Scratch space for uploaded inputs
    pub upload_dir: PathBuf,

    /// Where rendered mixes are written and served from
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("public"),
        }
    }
}

/// Output encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of the rendered AAC
    pub sample_rate: u32,

    /// Output channel count (1 or 2)
    pub channels: u16,

    /// AAC bitrate in bps
    pub aac_bitrate: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            aac_bitrate: 128_000,
        }
    }
}

impl AudioConfig {
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bitrate: self.aac_bitrate,
        }
    }
}

/// Time limits for probing and rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub probe_secs: u64,
    pub render_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: 30,
            render_secs: 600,
        }
    }
}

/// Request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of background files per request
    pub max_background_tracks: usize,

    /// Maximum request body size in megabytes
    pub max_request_size_mb: usize,

    /// Renders allowed to run at the same time
    pub max_concurrent_renders: usize,

    /// How long a request waits for a render slot before giving up
    pub render_queue_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_background_tracks: 10,
            max_request_size_mb: 200,
            max_concurrent_renders: 4,
            render_queue_secs: 30,
        }
    }
}

impl LimitsConfig {
    /// Get maximum request size in bytes
    pub fn max_request_bytes(&self) -> usize {
        self.max_request_size_mb * 1024 * 1024
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    pub storage: StorageConfig,

    pub audio: AudioConfig,

    pub timeouts: TimeoutConfig,

    pub limits: LimitsConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            storage: StorageConfig::default(),
            audio: AudioConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply the `PORT` environment variable, if set and valid.
    pub fn apply_env(mut self) -> Self {
        self.apply_port(std::env::var("PORT").ok().as_deref());
        self
    }

    fn apply_port(&mut self, value: Option<&str>) {
        match value.map(|v| v.trim().parse::<u16>()) {
            Some(Ok(port)) => self.port = port,
            Some(Err(_)) => tracing::warn!(value, "ignoring invalid PORT"),
            None => {}
        }
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is unset, built from
    /// `log_level`. An unknown level falls back to `info`.
    pub fn log_filter(&self) -> String {
        let level = match self.log_level.trim().to_ascii_lowercase().as_str() {
            l @ ("trace" | "debug" | "info" | "warn" | "error") => l.to_string(),
            _ => "info".to_string(),
        };
        format!(
            "mixdown_server={0},mixdown_lib={0},tower_http={0}",
            level
        )
    }

    pub fn compositor_options(&self) -> CompositorOptions {
        CompositorOptions {
            probe_timeout: Duration::from_secs(self.timeouts.probe_secs),
            render_timeout: Duration::from_secs(self.timeouts.render_secs),
        }
    }
}
