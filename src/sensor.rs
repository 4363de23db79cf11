use crate::models::CameraSettings;
use anyhow::{Context, Result};
use bytes::Bytes;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// One captured JPEG image, owned by the sensor's buffer pool.
#[derive(Debug)]
pub struct FrameBuffer {
    slot: usize,
    data: Bytes,
}

impl FrameBuffer {
    pub fn new(slot: usize, data: Bytes) -> Self {
        Self { slot, data }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

pub trait Sensor: Send + Sync {
    /// Returns `None` when no buffer is free or no frame is ready.
    fn acquire_frame(&self) -> Option<FrameBuffer>;
    fn release_frame(&self, frame: FrameBuffer);
    /// Applies all settings at once.
    fn apply_settings(&self, settings: &CameraSettings) -> bool;
    fn is_ready(&self) -> bool;
    fn sensor_name(&self) -> String;
}

/// Holds one acquired frame and hands it back to the sensor on drop.
pub struct FrameGuard<'a> {
    sensor: &'a dyn Sensor,
    frame: Option<FrameBuffer>,
}

impl<'a> FrameGuard<'a> {
    pub fn acquire(sensor: &'a dyn Sensor) -> Option<Self> {
        let frame = sensor.acquire_frame()?;
        Some(Self {
            sensor,
            frame: Some(frame),
        })
    }

    pub fn data(&self) -> Bytes {
        self.frame
            .as_ref()
            .map(|frame| frame.data().clone())
            .unwrap_or_default()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.sensor.release_frame(frame);
        }
    }
}

/// Host sensor that replays the JPEG files of a directory in name order.
pub struct DirectorySensor {
    frames: Vec<Bytes>,
    pool_size: usize,
    outstanding: AtomicUsize,
    next: AtomicUsize,
}

impl DirectorySensor {
    pub fn open(dir: &Path, pool_size: usize) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
            let path = entry.context("read frame entry")?.path();
            let is_jpeg = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
                .unwrap_or(false);
            if is_jpeg {
                paths.push(path);
            }
        }
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let data = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            frames.push(Bytes::from(data));
        }
        Ok(Self::from_frames(frames, pool_size))
    }

    pub fn from_frames(frames: Vec<Bytes>, pool_size: usize) -> Self {
        Self {
            frames,
            pool_size: pool_size.max(1),
            outstanding: AtomicUsize::new(0),
            next: AtomicUsize::new(0),
        }
    }
}

impl Sensor for DirectorySensor {
    fn acquire_frame(&self) -> Option<FrameBuffer> {
        if self.frames.is_empty() {
            return None;
        }
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                (held < self.pool_size).then_some(held + 1)
            })
            .ok()?;
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        Some(FrameBuffer::new(slot, self.frames[slot].clone()))
    }

    fn release_frame(&self, frame: FrameBuffer) {
        trace!(slot = frame.slot(), "frame released");
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| held.checked_sub(1));
    }

    /// Recorded frames cannot be re-tuned; settings are accepted as-is.
    fn apply_settings(&self, settings: &CameraSettings) -> bool {
        if !self.is_ready() {
            return false;
        }
        debug!(?settings, "camera settings applied");
        true
    }

    fn is_ready(&self) -> bool {
        !self.frames.is_empty()
    }

    fn sensor_name(&self) -> String {
        "FILE".to_string()
    }
}
