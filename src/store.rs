use crate::config::try_write;
use crate::models::{DeviceConfig, WifiCredentials};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Durable storage for [`DeviceConfig`].
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<DeviceConfig>;
    /// Returns the path that was actually written.
    fn save(&self, config: &DeviceConfig) -> Result<PathBuf>;
    fn clear_network_credentials(&self) -> Result<()>;
}

pub struct FileStore {
    path: PathBuf,
    fallback: Option<PathBuf>,
}

impl FileStore {
    pub fn new(path: PathBuf, fallback: Option<PathBuf>) -> Self {
        Self { path, fallback }
    }

    /// The most recently written of the preferred and fallback files.
    /// Ties go to the preferred path.
    fn newest(&self) -> Option<&Path> {
        [self.fallback.as_deref(), Some(self.path.as_path())]
            .into_iter()
            .flatten()
            .filter_map(|path| {
                let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
                Some((modified, path))
            })
            .max_by_key(|(modified, _)| *modified)
            .map(|(_, path)| path)
    }

    fn read(path: &Path) -> Result<DeviceConfig> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("read device config {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("parse device config {}", path.display()))
    }
}

impl ConfigStore for FileStore {
    fn load(&self) -> Result<DeviceConfig> {
        match self.newest() {
            Some(path) => Self::read(path),
            None => Ok(DeviceConfig::default()),
        }
    }

    fn save(&self, config: &DeviceConfig) -> Result<PathBuf> {
        let contents = toml::to_string_pretty(config).context("serialize device config")?;
        let preferred_err = match try_write(&self.path, &contents) {
            Ok(()) => return Ok(self.path.clone()),
            Err(err) => err,
        };

        let fallback = self
            .fallback
            .as_ref()
            .ok_or(preferred_err)
            .context("no fallback state path")?;
        try_write(fallback, &contents).context("write fallback device config")?;
        Ok(fallback.clone())
    }

    fn clear_network_credentials(&self) -> Result<()> {
        let mut config = self.load()?;
        config.wifi = WifiCredentials::default();
        self.save(&config)?;
        Ok(())
    }
}

/// Owned, serialized access to the live [`DeviceConfig`].
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<Mutex<DeviceConfig>>,
}

impl ConfigHandle {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    pub async fn snapshot(&self) -> DeviceConfig {
        self.inner.lock().await.clone()
    }

    /// Exclusive access until the guard drops; hold it across the save.
    pub async fn lock(&self) -> MutexGuard<'_, DeviceConfig> {
        self.inner.lock().await
    }
}

/// Runs a store operation on the blocking pool.
pub async fn blocking<T, F>(store: Arc<dyn ConfigStore>, f: F) -> Result<T>
where
    F: FnOnce(&dyn ConfigStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .context("store task")?
}
