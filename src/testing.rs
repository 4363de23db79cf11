use crate::host::{Network, Platform, StaticFiles};
use crate::models::{CameraSettings, DeviceConfig, NetworkMode};
use crate::sensor::{FrameBuffer, Sensor};
use crate::store::ConfigStore;
use anyhow::Result;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct FakeNetwork {
    associated: bool,
}

impl FakeNetwork {
    pub fn associated() -> Self {
        Self { associated: true }
    }

    pub fn disconnected() -> Self {
        Self { associated: false }
    }
}

impl Network for FakeNetwork {
    fn current_ip(&self) -> String {
        if self.associated {
            "192.168.1.20".to_string()
        } else {
            "0.0.0.0".to_string()
        }
    }

    fn current_mac(&self) -> String {
        "AA:BB:CC:DD:EE:FF".to_string()
    }

    fn signal_strength(&self) -> i32 {
        if self.associated {
            -61
        } else {
            0
        }
    }

    fn mode(&self) -> NetworkMode {
        if self.associated {
            NetworkMode::Sta
        } else {
            NetworkMode::Ap
        }
    }

    fn is_associated(&self) -> bool {
        self.associated
    }
}

pub struct FakePlatform {
    now_ms: AtomicU64,
    restarts: AtomicUsize,
}

impl FakePlatform {
    pub fn at(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
            restarts: AtomicUsize::new(0),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl Platform for FakePlatform {
    fn uptime_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn free_memory(&self) -> u64 {
        123_456
    }

    fn has_external_ram(&self) -> bool {
        true
    }

    fn restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sensor with a fixed frame and acquisition/release counters.
pub struct FakeSensor {
    ready: bool,
    frame: Bytes,
    /// Every Nth acquisition yields nothing; 0 disables.
    empty_every: usize,
    pub attempts: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub applied: Mutex<Vec<CameraSettings>>,
}

impl FakeSensor {
    pub fn ready() -> Self {
        Self::with_frame(true, Bytes::from_static(b"\xff\xd8jpeg\xff\xd9"), 0)
    }

    pub fn not_ready() -> Self {
        Self::with_frame(false, Bytes::new(), 0)
    }

    pub fn with_frame(ready: bool, frame: Bytes, empty_every: usize) -> Self {
        Self {
            ready,
            frame,
            empty_every,
            attempts: AtomicUsize::new(0),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.acquired.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

impl Sensor for FakeSensor {
    fn acquire_frame(&self) -> Option<FrameBuffer> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.ready || (self.empty_every > 0 && attempt % self.empty_every == 0) {
            return None;
        }
        let slot = self.acquired.fetch_add(1, Ordering::SeqCst);
        Some(FrameBuffer::new(slot, self.frame.clone()))
    }

    fn release_frame(&self, _frame: FrameBuffer) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn apply_settings(&self, settings: &CameraSettings) -> bool {
        self.applied.lock().unwrap().push(settings.clone());
        self.ready
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn sensor_name(&self) -> String {
        "OV2640".to_string()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<DeviceConfig>>,
    pub credentials_cleared: AtomicBool,
    pub fail_saves: bool,
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<DeviceConfig> {
        Ok(self.saved.lock().unwrap().last().cloned().unwrap_or_default())
    }

    fn save(&self, config: &DeviceConfig) -> Result<PathBuf> {
        if self.fail_saves {
            anyhow::bail!("flash write failed");
        }
        self.saved.lock().unwrap().push(config.clone());
        Ok(PathBuf::from("memory"))
    }

    fn clear_network_credentials(&self) -> Result<()> {
        self.credentials_cleared.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFiles {
    pub files: HashMap<String, Vec<u8>>,
}

impl MemoryFiles {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            files: entries
                .iter()
                .map(|(path, body)| (path.to_string(), body.as_bytes().to_vec()))
                .collect(),
        }
    }
}

impl StaticFiles for MemoryFiles {
    fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(path).cloned()
    }
}
