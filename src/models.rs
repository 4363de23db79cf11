use serde::{Deserialize, Serialize};

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u32 = 30;
pub const JPEG_QUALITY_RANGE: std::ops::RangeInclusive<i64> = 10..=63;
pub const TUNING_RANGE: std::ops::RangeInclusive<i64> = -2..=2;

/// Sensor output resolution, carried on the wire as the driver's numeric index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FrameSize {
    R96x96 = 0,
    Qqvga = 1,
    Qcif = 2,
    Hqvga = 3,
    R240x240 = 4,
    Qvga = 5,
    Cif = 6,
    Hvga = 7,
    Vga = 8,
    Svga = 9,
    Xga = 10,
    Hd = 11,
    Sxga = 12,
    Uxga = 13,
    Fhd = 14,
}

impl FrameSize {
    const ALL: [FrameSize; 15] = [
        FrameSize::R96x96,
        FrameSize::Qqvga,
        FrameSize::Qcif,
        FrameSize::Hqvga,
        FrameSize::R240x240,
        FrameSize::Qvga,
        FrameSize::Cif,
        FrameSize::Hvga,
        FrameSize::Vga,
        FrameSize::Svga,
        FrameSize::Xga,
        FrameSize::Hd,
        FrameSize::Sxga,
        FrameSize::Uxga,
        FrameSize::Fhd,
    ];

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }
}

impl From<FrameSize> for u8 {
    fn from(size: FrameSize) -> u8 {
        size as u8
    }
}

impl TryFrom<u8> for FrameSize {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(value as i64).ok_or_else(|| format!("unknown frame size index {}", value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub frame_size: FrameSize,
    /// 10..=63, lower is better.
    pub jpeg_quality: u8,
    pub brightness: i8,
    pub contrast: i8,
    pub saturation: i8,
    pub vflip: bool,
    pub hmirror: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            frame_size: FrameSize::Vga,
            jpeg_quality: 12,
            brightness: 0,
            contrast: 0,
            saturation: 0,
            vflip: false,
            hmirror: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingSettings {
    pub enabled: bool,
    pub provisioned: bool,
    pub api_url: String,
    pub device_key: String,
    pub heartbeat_interval: u32,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provisioned: false,
            api_url: String::new(),
            device_key: String::new(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

impl MeetingSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.device_key.is_empty()
    }
}

/// Persisted device settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub wifi: WifiCredentials,
    pub camera: CameraSettings,
    pub meeting: MeetingSettings,
}

/// Live coordination-service state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingState {
    pub configured: bool,
    pub enabled: bool,
    pub connected: bool,
    pub last_http_code: u16,
    /// Uptime of the last successful heartbeat.
    pub last_heartbeat_ms: Option<u64>,
    pub last_error: String,
}

impl MeetingState {
    pub fn heartbeat_ago_ms(&self, now_ms: u64) -> u64 {
        match self.last_heartbeat_ms {
            Some(last) => now_ms.saturating_sub(last),
            None => 0,
        }
    }

    pub fn status(&self, now_ms: u64) -> MeetingStatus {
        MeetingStatus {
            configured: self.configured,
            enabled: self.enabled,
            connected: self.connected,
            last_http_code: self.last_http_code,
            last_error: self.last_error.clone(),
            last_heartbeat_ms: self.last_heartbeat_ms.unwrap_or(0),
            last_heartbeat_ago_ms: self.heartbeat_ago_ms(now_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingStatus {
    pub configured: bool,
    pub enabled: bool,
    pub connected: bool,
    pub last_http_code: u16,
    pub last_error: String,
    pub last_heartbeat_ms: u64,
    pub last_heartbeat_ago_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Ap,
    Sta,
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnlineRequest {
    pub ip_address: String,
    pub mac: String,
    pub device_type: String,
    pub services: ServiceFlags,
    pub uptime_sec: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceFlags {
    pub http: bool,
    pub mjpeg: bool,
}
