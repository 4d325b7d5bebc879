//! App configuration read from an optional RON file.
//!
//! ```ron
//! (
//!     base_url: "http://localhost:8000",
//!     frame_interval_ms: 16,
//!     width: 960.0,
//!     height: 720.0,
//!     log_destination: file,
//! )
//! ```
//!
//! Missing fields keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lance_engine::ClientSettings;
use serde::Deserialize;

use super::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "lance.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub keepalive_secs: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Layout tick cadence.
    pub frame_interval_ms: u64,
    /// Minimum gap between two screen refreshes.
    pub render_interval_ms: u64,
    /// Viewport of the mesh canvas, in screen units.
    pub width: f64,
    pub height: f64,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            base_url: client.base_url,
            keepalive_secs: client.keepalive_interval.as_secs(),
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            frame_interval_ms: 16,
            render_interval_ms: 100,
            width: 960.0,
            height: 720.0,
            log_destination: LogDestination::File,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "viewport must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.keepalive_secs == 0 {
            return Err(ConfigError::Invalid(
                "keepalive_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            keepalive_interval: Duration::from_secs(self.keepalive_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }
}

/// Loads `path`, or `./lance.ron` when no path is given. Only an explicit
/// path has to exist.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => read(path),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                read(fallback)
            } else {
                Ok(AppConfig::default())
            }
        }
    }
}

fn read(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
