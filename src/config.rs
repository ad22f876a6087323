use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::device::DisplayInfo;
use crate::orientation::SurfaceRotation;
use crate::router::contacts::CallWindowPlacement;
use crate::session::DemoAccounts;

const CONFIG_DIR: &str = ".config/callhelper";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub orientation: OrientationConfig,
    pub call_window: CallWindowConfig,
    pub device: DeviceConfig,
    pub layout: LayoutConfig,
    pub presence: PresenceConfig,
    /// Extra demo accounts, user id → display name
    pub accounts: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OrientationConfig {
    pub animation_ms: u64,
    /// Pace of the scripted sensor in the demo binary
    pub sample_interval_ms: u64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            animation_ms: 300,
            sample_interval_ms: 200,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CallWindowConfig {
    /// Side of the local preview while remote video is shown, in dp
    pub preview_overlay_dp: u32,
    pub can_come_back: bool,
}

impl Default for CallWindowConfig {
    fn default() -> Self {
        Self {
            preview_overlay_dp: 32 * 4,
            can_come_back: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Window system rotation code (0..=3)
    pub surface_rotation: i32,
    pub density: f32,
    pub camera_count: u32,
    pub orientation_sensor: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            surface_rotation: 0,
            density: 2.0,
            camera_count: 2,
            orientation_sensor: true,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct LayoutConfig {
    /// Contact list and call window side by side
    pub split: bool,
    pub big_tablet: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PresenceConfig {
    pub app_name: String,
    pub ring_asset: Option<PathBuf>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            app_name: "Call Helper".to_string(),
            ring_asset: None,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn default_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads the config at `path`, falling back to defaults on any error
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path).await {
            Ok(config) => config,
            Err(e) => {
                warn!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    pub fn animation(&self) -> Duration {
        Duration::from_millis(self.orientation.animation_ms)
    }

    pub fn placement(&self) -> CallWindowPlacement {
        CallWindowPlacement::from_layout(self.layout.split, self.layout.big_tablet)
    }

    pub fn display(&self) -> DisplayInfo {
        DisplayInfo {
            surface_rotation: SurfaceRotation::from_code(self.device.surface_rotation),
            density: self.device.density,
            camera_count: self.device.camera_count,
        }
    }

    pub fn demo_accounts(&self) -> DemoAccounts {
        DemoAccounts::default().merged_with(&self.accounts)
    }
}

/// Writes the default config to `path` unless a file already exists
pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if exists {
        return Ok(());
    }

    info!("Creating default configuration at {}", path.display());
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    let content = AppConfig::default().to_toml_string()?;
    tokio::fs::write(path, content)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
