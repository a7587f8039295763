use crate::error::{KeywaveError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub animation: AnimationSettings,
    #[serde(default)]
    pub app: AppSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaemonSettings {
    pub address: Option<String>,       // host:port, bypasses coreProps.json
    pub core_props: Option<PathBuf>,   // Non-standard SteelSeries Engine install
    pub timeout_ms: Option<u64>,
    pub heartbeat_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnimationSettings {
    pub rows: Option<usize>,
    pub cols: Option<usize>,
    pub mirror_offset: Option<usize>,
    pub steps: Option<u32>,
    pub hue_step: Option<u8>,
    pub delay_ms: Option<u64>,
    pub palette: Option<Vec<[u8; 3]>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppSettings {
    pub game: Option<String>,
    pub display_name: Option<String>,
    pub developer: Option<String>,
    pub event: Option<String>,
}

impl Settings {
    /// Load the user's settings file. A missing file means defaults; a
    /// malformed one is an error.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| KeywaveError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keywave")
            .join("config.toml")
    }
}
