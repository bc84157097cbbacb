use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub emulation: EmulationConfig,
    #[serde(default)]
    pub devices: DeviceFilter,
}

/// How the per-device default is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefaultMode {
    /// Enabled only on devices without a physical middle button.
    #[default]
    Auto,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulationConfig {
    #[serde(default)]
    pub default: DefaultMode,
    #[serde(default = "EmulationConfig::default_timeout")]
    pub timeout_ms: u64,
}

impl EmulationConfig {
    fn default_timeout() -> u64 { 50 }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve the default enable state for a device.
    pub fn default_enabled(&self, has_middle: bool) -> bool {
        match self.default {
            DefaultMode::Auto => !has_middle,
            DefaultMode::Enabled => true,
            DefaultMode::Disabled => false,
        }
    }
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            default: DefaultMode::Auto,
            timeout_ms: 50,
        }
    }
}

/// Name-based device selection. Matching is a case-insensitive substring test.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl DeviceFilter {
    pub fn accepts(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let hit = |pat: &String| name.contains(&pat.to_lowercase());
        if self.exclude.iter().any(hit) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(hit)
    }
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("midclick")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "parsing config TOML")
    }
}

pub fn socket_path() -> PathBuf {
    // MIDCLICK_SOCK overrides for testing.
    if let Ok(path) = std::env::var("MIDCLICK_SOCK") {
        return PathBuf::from(path);
    }
    PathBuf::from("/run/midclick/midclick.sock")
}
