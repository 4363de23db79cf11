use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_ENV: &str = "CAMFEED_DEVICE_CONFIG";
const CONFIG_DIR_SYSTEM: &str = "/etc/camfeed-device";
const CONFIG_DIR_FALLBACK: &str = ".config/camfeed-device";
const CONFIG_FILE: &str = "config.toml";
const STATE_DIR_FALLBACK: &str = ".local/state/camfeed-device";
const STATE_FILE: &str = "device.toml";

/// Process settings. Device settings live in the store, not here.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub state_path: PathBuf,
    pub frames_dir: PathBuf,
    pub frame_buffers: usize,
    pub stream_fps_limit: u32,
    pub stream_boundary: String,
    pub heartbeat_timeout_secs: u64,
    pub tick_interval_ms: u64,
    pub reboot_delay_ms: u64,
    pub has_external_ram: bool,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_dir: PathBuf::from("/usr/share/camfeed-device/www"),
            state_path: PathBuf::from("/var/lib/camfeed-device/device.toml"),
            frames_dir: PathBuf::from("/var/lib/camfeed-device/frames"),
            frame_buffers: 2,
            stream_fps_limit: 20,
            stream_boundary: "frame".to_string(),
            heartbeat_timeout_secs: 8,
            tick_interval_ms: 1000,
            reboot_delay_ms: 200,
            has_external_ram: false,
            log_filter: "camfeed_device=info,tower_http=info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn reboot_delay(&self) -> Duration {
        Duration::from_millis(self.reboot_delay_ms)
    }
}

pub fn preferred_config_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR_SYSTEM).join(CONFIG_FILE)
}

pub fn fallback_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home)
        .join(CONFIG_DIR_FALLBACK)
        .join(CONFIG_FILE))
}

/// Where device state goes when `state_path` is not writable.
pub fn fallback_state_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(STATE_DIR_FALLBACK).join(STATE_FILE))
}

pub fn write_config(config: &AppConfig) -> Result<PathBuf> {
    let contents = toml::to_string_pretty(config).context("serialize config")?;
    let preferred = preferred_config_path();
    if try_write(&preferred, &contents).is_ok() {
        return Ok(preferred);
    }

    let fallback = fallback_config_path()?;
    try_write(&fallback, &contents).context("write fallback config")?;
    Ok(fallback)
}

/// Returns the settings and the file they came from, if any.
pub fn load_config() -> Result<(AppConfig, Option<PathBuf>)> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        let config = read_config(&path)?;
        return Ok((config, Some(path)));
    }

    let preferred = preferred_config_path();
    if preferred.exists() {
        return Ok((read_config(&preferred)?, Some(preferred)));
    }

    if let Ok(fallback) = fallback_config_path() {
        if fallback.exists() {
            return Ok((read_config(&fallback)?, Some(fallback)));
        }
    }

    Ok((AppConfig::default(), None))
}

pub fn read_config(path: &Path) -> Result<AppConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))
}

pub(crate) fn try_write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
