use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which GATT profile the peripheral exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileKind {
    /// plain, encrypted and secure test characteristics
    Test,
    /// power and volume backed by the device-control API
    #[default]
    Vivaldi,
}

/// Peripheral configuration, stored as `config.json` in the vivaldi home
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralConfig {
    /// Base URL of the device-control API
    pub backend_url: String,
    #[serde(default = "default_timeout_ms")]
    pub backend_timeout_ms: u64,
    /// Advertised local name
    #[serde(default = "default_local_name")]
    pub local_name: String,
    /// Adapter object path; the first adapter offering GATT is used when unset
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default = "default_exit_on_release")]
    pub exit_on_release: bool,
    #[serde(default)]
    pub profile: ProfileKind,
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_local_name() -> String {
    "Vivaldi".to_string()
}

fn default_exit_on_release() -> bool {
    true
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080".to_string(),
            backend_timeout_ms: default_timeout_ms(),
            local_name: default_local_name(),
            adapter: None,
            exit_on_release: default_exit_on_release(),
            profile: ProfileKind::default(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// `$VIVALDI_HOME`, or `~/.vivaldi`
pub fn vivaldi_home() -> Result<PathBuf, ConfigError> {
    if let Ok(home) = std::env::var("VIVALDI_HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|h| h.join(".vivaldi"))
        .ok_or(ConfigError::NoHome)
}

impl PeripheralConfig {
    pub fn path(home: &Path) -> PathBuf {
        home.join("config.json")
    }

    /// Read `config.json` from `home`, writing the defaults there first if it is missing
    pub fn load_or_create(home: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(home);
        if !path.exists() {
            let config = Self::default();
            config.save(home)?;
            tracing::info!("wrote default config to {}", path.display());
            return Ok(config);
        }

        let data = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn save(&self, home: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(home).map_err(|source| ConfigError::Io {
            path: home.to_path_buf(),
            source,
        })?;
        let path = Self::path(home);
        let data = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, data).map_err(|source| ConfigError::Io { path, source })
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}
